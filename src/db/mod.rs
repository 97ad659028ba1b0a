pub mod customer_orders;
pub mod deliveries;
pub mod dlc;
pub mod groups;
pub mod nocodb;
pub mod orders;
pub mod pool;
pub mod publicities;
pub mod store;
pub mod suppliers;
pub mod tasks;
pub mod users;
pub mod verification_cache;

pub use groups::groups_by_ids;
pub use nocodb::configs_by_ids;
pub use pool::{create_pool, run_migrations};
pub use store::PgStore;
pub use suppliers::suppliers_by_ids;
