pub mod customer_order;
pub mod delivery;
pub mod dlc;
pub mod group;
pub mod nocodb;
pub mod order;
pub mod publicity;
pub mod supplier;
pub mod task;
pub mod user;
pub mod verification;

pub use customer_order::{CustomerOrder, CustomerOrderInput, CustomerOrderStatus};
pub use delivery::{
    clean, Delivery, DeliveryFilter, DeliveryInput, DeliveryStatus, DeliveryUpdate,
    DeliveryWithRelations,
};
pub use dlc::{DateType, DlcFilter, DlcProduct, DlcProductInput, DlcProductUpdate, DlcStats, DlcStatus};
pub use group::{Group, GroupCapabilities, GroupInput, GroupView, LedgerMapping, LedgerTable};
pub use nocodb::{NocodbConfig, NocodbConfigInput, NocodbConfigView};
pub use order::{Order, OrderFilter, OrderInput, OrderStatus, OrderUpdate};
pub use publicity::{Publicity, PublicityInput};
pub use supplier::{Supplier, SupplierInput};
pub use task::{Task, TaskInput, TaskPriority, TaskStatus, TaskUpdate};
pub use user::{CurrentUser, Role, User};
pub use verification::{
    InvoiceBackfill, MatchType, ReconciliationState, References, VerificationCacheEntry,
    VerificationOutcome, VerificationStatus, VerifyInvoiceRequest,
};
