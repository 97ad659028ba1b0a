use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::clean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Planned,
    Delivered,
}

/// Supplier orders table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub supplier_id: i64,
    pub group_id: i64,
    pub planned_date: NaiveDate,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInput {
    pub supplier_id: i64,
    pub group_id: i64,
    pub planned_date: NaiveDate,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub supplier_id: Option<i64>,
    pub planned_date: Option<NaiveDate>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub store_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Order {
    /// Absent fields keep their value, blank text clears it
    pub fn merged_with(&self, update: &OrderUpdate) -> Order {
        Order {
            supplier_id: update.supplier_id.unwrap_or(self.supplier_id),
            planned_date: update.planned_date.unwrap_or(self.planned_date),
            quantity: update.quantity.or(self.quantity),
            unit: match &update.unit {
                Some(v) => clean(Some(v)),
                None => self.unit.clone(),
            },
            status: update.status.unwrap_or(self.status),
            notes: match &update.notes {
                Some(v) => clean(Some(v)),
                None => self.notes.clone(),
            },
            ..self.clone()
        }
    }
}
