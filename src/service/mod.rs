pub mod announcements;
pub mod cache;
pub mod calendar;
pub mod dashboard;
pub mod deliveries;
pub mod dlc;
pub mod export;
pub mod ledger;
pub mod orders;
pub mod permissions;
pub mod reconciliation;
pub mod store;
pub mod stores;
pub mod suppliers;
pub mod tasks;
pub mod webhook;

pub use announcements::AnnouncementService;
pub use cache::{MemoryVerificationCache, VerificationCache};
pub use calendar::CalendarService;
pub use dashboard::DashboardService;
pub use deliveries::DeliveryService;
pub use dlc::DlcService;
pub use ledger::{InvoiceLedger, NocoDbLedger};
pub use orders::OrderService;
pub use reconciliation::ReconciliationService;
pub use store::DeliveryStore;
pub use stores::StoreService;
pub use suppliers::SupplierService;
pub use tasks::TaskService;
pub use webhook::InvoiceUploader;

#[cfg(test)]
pub(crate) mod test_server {
    use axum::Router;

    /// Serves `router` on an ephemeral local port and returns its base URL
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
