pub mod admin;
pub mod announcements;
pub mod auth;
pub mod deliveries;
pub mod dlc;
pub mod handlers;
pub mod planning;
pub mod reconciliation;
pub mod tasks;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use handlers::{health_check, Ack};

/// Invoice PDFs are forwarded as-is, allow up to 20 MB
const INVOICE_UPLOAD_LIMIT: usize = 20 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let delivery_routes = Router::new()
        .route(
            "/",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route(
            "/:id",
            get(deliveries::get_delivery)
                .put(deliveries::update_delivery)
                .delete(deliveries::delete_delivery),
        )
        .route("/:id/verify-invoice", post(deliveries::verify_invoice))
        .route("/:id/validate", post(deliveries::validate_delivery))
        .route("/:id/devalidate", post(deliveries::devalidate_delivery))
        .route(
            "/:id/invoice-pdf",
            post(deliveries::upload_invoice_pdf).layer(DefaultBodyLimit::max(INVOICE_UPLOAD_LIMIT)),
        );

    let reconciliation_routes = Router::new()
        .route("/", get(reconciliation::list_reconciliation))
        .route("/verify-all", post(reconciliation::verify_all))
        .route("/export", get(reconciliation::export_reconciliation));

    let dlc_routes = Router::new()
        .route("/", get(dlc::list_products).post(dlc::create_product))
        .route("/stats", get(dlc::product_stats))
        .route("/:id", put(dlc::update_product).delete(dlc::delete_product))
        .route("/:id/validate", post(dlc::validate_product))
        .route("/:id/stock-epuise", post(dlc::mark_stock_epuise));

    let api = Router::new()
        .route("/me", get(handlers::me))
        .route("/groups", get(admin::list_groups).post(admin::create_group))
        .route("/groups/:id", put(admin::update_group))
        .route(
            "/nocodb-config",
            get(admin::list_nocodb_configs).post(admin::create_nocodb_config),
        )
        .route(
            "/nocodb-config/:id",
            put(admin::update_nocodb_config).delete(admin::delete_nocodb_config),
        )
        .route("/suppliers", get(admin::list_suppliers).post(admin::create_supplier))
        .route(
            "/suppliers/:id",
            put(admin::update_supplier).delete(admin::delete_supplier),
        )
        .route("/orders", get(planning::list_orders).post(planning::create_order))
        .route(
            "/orders/:id",
            get(planning::get_order)
                .put(planning::update_order)
                .delete(planning::delete_order),
        )
        .route("/dashboard/stats", get(planning::dashboard_stats))
        .route("/calendar", get(planning::calendar_month))
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/:id", put(tasks::update_task).delete(tasks::delete_task))
        .route("/tasks/:id/complete", post(tasks::complete_task))
        .route(
            "/publicities",
            get(announcements::list_publicities).post(announcements::create_publicity),
        )
        .route(
            "/customer-orders",
            get(announcements::list_customer_orders).post(announcements::create_customer_order),
        )
        .nest("/deliveries", delivery_routes)
        .nest("/reconciliation", reconciliation_routes)
        .nest("/dlc-products", dlc_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
