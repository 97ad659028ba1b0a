use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::service::{
    AnnouncementService, CalendarService, DashboardService, DeliveryService, DeliveryStore,
    DlcService, InvoiceLedger, InvoiceUploader, OrderService, ReconciliationService,
    StoreService, SupplierService, TaskService, VerificationCache,
};

/// Shared state: pool plus one instance of every service
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<dyn VerificationCache>,
    pub reconciliation: Arc<ReconciliationService>,
    pub uploader: Arc<InvoiceUploader>,
    pub deliveries: Arc<DeliveryService>,
    pub orders: Arc<OrderService>,
    pub suppliers: Arc<SupplierService>,
    pub stores: Arc<StoreService>,
    pub dashboard: Arc<DashboardService>,
    pub calendar: Arc<CalendarService>,
    pub dlc: Arc<DlcService>,
    pub tasks: Arc<TaskService>,
    pub announcements: Arc<AnnouncementService>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: &AppConfig,
        delivery_store: Arc<dyn DeliveryStore>,
        cache: Arc<dyn VerificationCache>,
        ledger: Arc<dyn InvoiceLedger>,
    ) -> Self {
        let reconciliation = Arc::new(ReconciliationService::new(
            delivery_store,
            cache.clone(),
            ledger,
            config.reconciliation.clone(),
        ));

        Self {
            cache,
            uploader: Arc::new(InvoiceUploader::new(reconciliation.clone())),
            reconciliation,
            deliveries: Arc::new(DeliveryService::new(pool.clone())),
            orders: Arc::new(OrderService::new(pool.clone())),
            suppliers: Arc::new(SupplierService::new(pool.clone())),
            stores: Arc::new(StoreService::new(pool.clone())),
            dashboard: Arc::new(DashboardService::new(pool.clone())),
            calendar: Arc::new(CalendarService::new(
                pool.clone(),
                config.calendar.max_visible_per_day,
            )),
            dlc: Arc::new(DlcService::new(
                pool.clone(),
                config.dlc.default_alert_threshold_days,
            )),
            tasks: Arc::new(TaskService::new(pool.clone())),
            announcements: Arc::new(AnnouncementService::new(pool.clone())),
            pool,
        }
    }
}
