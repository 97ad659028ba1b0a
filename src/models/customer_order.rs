use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "customer_order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CustomerOrderStatus {
    Waiting,
    Arrived,
    Retrieved,
    Cancelled,
}

/// Orders placed by store customers
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOrder {
    pub id: i64,
    pub group_id: i64,
    pub supplier_id: i64,
    pub customer_name: String,
    pub product_designation: String,
    pub quantity: i32,
    pub status: CustomerOrderStatus,
    pub deposit: Option<BigDecimal>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOrderInput {
    pub group_id: i64,
    pub supplier_id: i64,
    pub customer_name: String,
    pub product_designation: String,
    pub quantity: Option<i32>,
    pub deposit: Option<BigDecimal>,
}
