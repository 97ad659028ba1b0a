use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Group, NocodbConfig, ReconciliationState, Supplier, VerificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Planned,
    Delivered,
}

/// Deliveries table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: i64,
    pub order_id: Option<i64>,
    pub supplier_id: i64,
    pub group_id: i64,
    pub scheduled_date: NaiveDate,
    pub delivered_date: Option<NaiveDate>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub status: DeliveryStatus,
    pub notes: Option<String>,
    pub bl_number: Option<String>,
    pub bl_amount: Option<BigDecimal>,
    pub invoice_reference: Option<String>,
    pub invoice_amount: Option<BigDecimal>,
    pub due_date: Option<NaiveDate>,
    pub reconciled: bool,
    pub validated_at: Option<DateTime<Utc>>,
    pub verification_status: VerificationStatus,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trims and drops empty strings
pub fn clean(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl Delivery {
    pub fn has_bl_number(&self) -> bool {
        clean(self.bl_number.as_deref()).is_some()
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }

    pub fn reconciliation_state(&self) -> ReconciliationState {
        ReconciliationState::of(self)
    }

    /// Date the delivery shows up on in calendars and reports
    pub fn effective_date(&self) -> NaiveDate {
        self.delivered_date.unwrap_or(self.scheduled_date)
    }

    /// Merge a partial update. Empty strings clear text fields.
    pub fn merged_with(&self, update: &DeliveryUpdate) -> Delivery {
        let text = |new: &Option<String>, old: &Option<String>| match new {
            Some(v) => clean(Some(v)),
            None => old.clone(),
        };

        Delivery {
            order_id: update.order_id.or(self.order_id),
            supplier_id: update.supplier_id.unwrap_or(self.supplier_id),
            scheduled_date: update.scheduled_date.unwrap_or(self.scheduled_date),
            delivered_date: update.delivered_date.or(self.delivered_date),
            quantity: update.quantity.or(self.quantity),
            unit: text(&update.unit, &self.unit),
            status: update.status.unwrap_or(self.status),
            notes: text(&update.notes, &self.notes),
            bl_number: text(&update.bl_number, &self.bl_number),
            bl_amount: update.bl_amount.clone().or_else(|| self.bl_amount.clone()),
            invoice_reference: text(&update.invoice_reference, &self.invoice_reference),
            invoice_amount: update
                .invoice_amount
                .clone()
                .or_else(|| self.invoice_amount.clone()),
            due_date: update.due_date.or(self.due_date),
            ..self.clone()
        }
    }

    /// True when the fields that drive reconciliation differ
    pub fn reconciliation_fields_differ(&self, other: &Delivery) -> bool {
        self.bl_number != other.bl_number
            || self.bl_amount != other.bl_amount
            || self.invoice_reference != other.invoice_reference
            || self.invoice_amount != other.invoice_amount
            || self.due_date != other.due_date
    }

    /// True when a reference used for ledger matching changed
    pub fn references_differ(&self, other: &Delivery) -> bool {
        self.bl_number != other.bl_number || self.invoice_reference != other.invoice_reference
    }
}

/// Delivery with the supplier and store it belongs to
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryWithRelations {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub supplier: Supplier,
    #[serde(serialize_with = "serialize_group")]
    pub group: Group,
    #[serde(skip)]
    pub nocodb_config: Option<NocodbConfig>,
    pub reconciliation_state: ReconciliationState,
}

fn serialize_group<S: serde::Serializer>(group: &Group, s: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct GroupRef<'a> {
        id: i64,
        name: &'a str,
        color: &'a str,
    }
    GroupRef {
        id: group.id,
        name: &group.name,
        color: &group.color,
    }
    .serialize(s)
}

impl DeliveryWithRelations {
    pub fn new(
        delivery: Delivery,
        supplier: Supplier,
        group: Group,
        nocodb_config: Option<NocodbConfig>,
    ) -> Self {
        let reconciliation_state = delivery.reconciliation_state();
        Self {
            delivery,
            supplier,
            group,
            nocodb_config,
            reconciliation_state,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInput {
    pub order_id: Option<i64>,
    pub supplier_id: i64,
    pub group_id: i64,
    pub scheduled_date: NaiveDate,
    pub delivered_date: Option<NaiveDate>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub notes: Option<String>,
    pub bl_number: Option<String>,
    pub bl_amount: Option<BigDecimal>,
    pub invoice_reference: Option<String>,
    pub invoice_amount: Option<BigDecimal>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryUpdate {
    pub order_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub scheduled_date: Option<NaiveDate>,
    pub delivered_date: Option<NaiveDate>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub notes: Option<String>,
    pub bl_number: Option<String>,
    pub bl_amount: Option<BigDecimal>,
    pub invoice_reference: Option<String>,
    pub invoice_amount: Option<BigDecimal>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFilter {
    pub store_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<DeliveryStatus>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn delivery(id: i64, supplier_id: i64, group_id: i64) -> Delivery {
        let now = Utc::now();
        Delivery {
            id,
            order_id: None,
            supplier_id,
            group_id,
            scheduled_date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            delivered_date: None,
            quantity: Some(4),
            unit: Some("palettes".to_string()),
            status: DeliveryStatus::Planned,
            notes: None,
            bl_number: None,
            bl_amount: None,
            invoice_reference: None,
            invoice_amount: None,
            due_date: None,
            reconciled: false,
            validated_at: None,
            verification_status: VerificationStatus::Unverified,
            last_verified_at: None,
            created_by: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn delivered(id: i64, supplier_id: i64, group_id: i64, bl: &str) -> Delivery {
        Delivery {
            status: DeliveryStatus::Delivered,
            delivered_date: NaiveDate::from_ymd_opt(2024, 3, 12),
            bl_number: Some(bl.to_string()),
            ..delivery(id, supplier_id, group_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::str::FromStr;

    #[test]
    fn merge_keeps_absent_fields_and_clears_empty_strings() {
        let original = Delivery {
            notes: Some("quai 2".into()),
            invoice_amount: Some(BigDecimal::from_str("100.00").unwrap()),
            ..delivered(1, 1, 1, "BL-1")
        };
        let update = DeliveryUpdate {
            notes: Some("   ".into()),
            bl_number: Some(" BL-2 ".into()),
            ..Default::default()
        };

        let merged = original.merged_with(&update);
        assert_eq!(merged.notes, None);
        assert_eq!(merged.bl_number.as_deref(), Some("BL-2"));
        assert_eq!(merged.invoice_amount, original.invoice_amount);
        assert!(merged.references_differ(&original));
        assert!(!original.references_differ(&original.merged_with(&DeliveryUpdate::default())));
    }

    #[test]
    fn effective_date_prefers_delivered_date() {
        let planned = delivery(1, 1, 1);
        assert_eq!(planned.effective_date(), planned.scheduled_date);

        let done = Delivery {
            delivered_date: NaiveDate::from_ymd_opt(2024, 3, 14),
            ..planned
        };
        assert_eq!(done.effective_date(), NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
    }
}
