use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Suppliers table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
    /// Takes part in expiry-date tracking
    pub has_dlc: bool,
    /// Deliveries are reconciled as soon as they are delivered with a BL number
    pub automatic_reconciliation: bool,
    pub requires_control: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    pub name: String,
    pub contact: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub has_dlc: bool,
    #[serde(default)]
    pub automatic_reconciliation: bool,
    #[serde(default)]
    pub requires_control: bool,
}
