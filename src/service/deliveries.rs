use chrono::{DateTime, Local, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::db::{deliveries, orders, suppliers};
use crate::error::{AppError, AppResult};
use crate::models::{
    clean, CurrentUser, Delivery, DeliveryFilter, DeliveryInput, DeliveryStatus, DeliveryUpdate,
    DeliveryWithRelations, OrderStatus, Supplier, VerificationStatus,
};
use crate::service::permissions::{self, Action, Module, StoreScope};

/// Reconciles deliveries of automatic suppliers once delivered with a BL number.
/// Returns whether the delivery was changed.
pub fn apply_automatic_reconciliation(
    delivery: &mut Delivery,
    supplier: &Supplier,
    now: DateTime<Utc>,
) -> bool {
    if supplier.automatic_reconciliation
        && delivery.is_delivered()
        && delivery.has_bl_number()
        && !delivery.reconciled
    {
        delivery.reconciled = true;
        delivery.validated_at = Some(now);
        true
    } else {
        false
    }
}

/// Side effects shared by create and update
fn finalize(delivery: &mut Delivery, supplier: &Supplier, today: NaiveDate, now: DateTime<Utc>) {
    if delivery.is_delivered() && delivery.delivered_date.is_none() {
        delivery.delivered_date = Some(today);
    }
    apply_automatic_reconciliation(delivery, supplier, now);
}

/// Merges an update into a stored delivery.
///
/// A reconciled delivery must be devalidated before its reconciliation fields
/// change. Changing a reference of an unreconciled one drops its last verification.
pub fn plan_update(existing: &Delivery, update: &DeliveryUpdate) -> AppResult<Delivery> {
    let mut merged = existing.merged_with(update);

    if existing.reconciled
        && (existing.reconciliation_fields_differ(&merged) || !merged.is_delivered())
    {
        return Err(AppError::Conflict(
            "delivery is reconciled; devalidate it before editing".to_string(),
        ));
    }
    if !existing.reconciled && existing.references_differ(&merged) {
        merged.verification_status = VerificationStatus::Unverified;
    }
    Ok(merged)
}

fn new_delivery(input: DeliveryInput, created_by: i64, now: DateTime<Utc>) -> Delivery {
    Delivery {
        id: 0,
        order_id: input.order_id,
        supplier_id: input.supplier_id,
        group_id: input.group_id,
        scheduled_date: input.scheduled_date,
        delivered_date: input.delivered_date,
        quantity: input.quantity,
        unit: clean(input.unit.as_deref()),
        status: input.status.unwrap_or(DeliveryStatus::Planned),
        notes: clean(input.notes.as_deref()),
        bl_number: clean(input.bl_number.as_deref()),
        bl_amount: input.bl_amount,
        invoice_reference: clean(input.invoice_reference.as_deref()),
        invoice_amount: input.invoice_amount,
        due_date: input.due_date,
        reconciled: false,
        validated_at: None,
        verification_status: VerificationStatus::Unverified,
        last_verified_at: None,
        created_by,
        created_at: now,
        updated_at: now,
    }
}

/// Delivery CRUD with the order and reconciliation side effects
pub struct DeliveryService {
    pool: PgPool,
}

impl DeliveryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        user: &CurrentUser,
        filter: &DeliveryFilter,
    ) -> AppResult<Vec<DeliveryWithRelations>> {
        permissions::require(user, Module::Deliveries, Action::View)?;
        let scope = StoreScope::resolve(user, filter.store_id)?;
        let ids = scope.as_filter();
        let rows = deliveries::list_deliveries(&self.pool, ids.as_deref(), filter).await?;
        Ok(deliveries::with_relations(&self.pool, rows).await?)
    }

    pub async fn get(&self, user: &CurrentUser, id: i64) -> AppResult<DeliveryWithRelations> {
        permissions::require(user, Module::Deliveries, Action::View)?;
        let delivery = deliveries::find_with_relations(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("delivery", id))?;
        permissions::require_group(user, delivery.delivery.group_id)?;
        Ok(delivery)
    }

    pub async fn create(
        &self,
        user: &CurrentUser,
        input: DeliveryInput,
    ) -> AppResult<DeliveryWithRelations> {
        permissions::require(user, Module::Deliveries, Action::Create)?;
        permissions::require_group(user, input.group_id)?;
        let supplier = self.supplier(input.supplier_id).await?;
        if let Some(order_id) = input.order_id {
            self.check_order(order_id, input.group_id).await?;
        }

        let now = Utc::now();
        let mut delivery = new_delivery(input, user.id(), now);
        finalize(&mut delivery, &supplier, Local::now().date_naive(), now);

        let saved = deliveries::insert_delivery(&self.pool, &delivery).await?;
        self.propagate_to_order(&saved).await?;
        info!(
            delivery_id = saved.id,
            group_id = saved.group_id,
            reconciled = saved.reconciled,
            "delivery created"
        );
        self.get(user, saved.id).await
    }

    pub async fn update(
        &self,
        user: &CurrentUser,
        id: i64,
        update: DeliveryUpdate,
    ) -> AppResult<DeliveryWithRelations> {
        permissions::require(user, Module::Deliveries, Action::Edit)?;
        let existing = self.get(user, id).await?;

        let mut delivery = plan_update(&existing.delivery, &update)?;
        let supplier = if delivery.supplier_id == existing.supplier.id {
            existing.supplier
        } else {
            self.supplier(delivery.supplier_id).await?
        };
        if let Some(order_id) = delivery.order_id.filter(|o| Some(*o) != existing.delivery.order_id) {
            self.check_order(order_id, delivery.group_id).await?;
        }
        finalize(&mut delivery, &supplier, Local::now().date_naive(), Utc::now());

        let saved = deliveries::update_delivery(&self.pool, &delivery)
            .await?
            .ok_or_else(|| AppError::not_found("delivery", id))?;
        self.propagate_to_order(&saved).await?;
        info!(delivery_id = id, status = ?saved.status, "delivery updated");
        self.get(user, id).await
    }

    pub async fn delete(&self, user: &CurrentUser, id: i64) -> AppResult<()> {
        permissions::require(user, Module::Deliveries, Action::Delete)?;
        self.get(user, id).await?;
        deliveries::delete_delivery(&self.pool, id).await?;
        info!(delivery_id = id, user_id = user.id(), "delivery deleted");
        Ok(())
    }

    async fn supplier(&self, id: i64) -> AppResult<Supplier> {
        suppliers::get_supplier(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("unknown supplier {}", id)))
    }

    async fn check_order(&self, order_id: i64, group_id: i64) -> AppResult<()> {
        match orders::get_order(&self.pool, order_id).await? {
            Some(order) if order.group_id == group_id => Ok(()),
            Some(_) => Err(AppError::Validation(format!(
                "order {} belongs to another store",
                order_id
            ))),
            None => Err(AppError::Validation(format!("unknown order {}", order_id))),
        }
    }

    async fn propagate_to_order(&self, delivery: &Delivery) -> AppResult<()> {
        if let (Some(order_id), true) = (delivery.order_id, delivery.is_delivered()) {
            orders::set_order_status(&self.pool, order_id, OrderStatus::Delivered).await?;
            tracing::debug!(order_id, delivery_id = delivery.id, "order marked delivered");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::delivery::fixtures::{delivered, delivery};
    use bigdecimal::BigDecimal;

    fn supplier(automatic: bool) -> Supplier {
        Supplier {
            id: 1,
            name: "Bonduelle".to_string(),
            contact: None,
            phone: None,
            has_dlc: false,
            automatic_reconciliation: automatic,
            requires_control: false,
            created_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn automatic_supplier_reconciles_on_delivery_with_bl() {
        let now = Utc::now();
        let mut d = delivered(1, 1, 1, "BL-77");
        finalize(&mut d, &supplier(true), today(), now);

        assert!(d.reconciled);
        assert_eq!(d.validated_at, Some(now));
        assert_eq!(d.verification_status, VerificationStatus::Unverified);
    }

    #[test]
    fn automatic_rule_needs_delivery_and_bl_number() {
        let mut planned = delivery(1, 1, 1);
        planned.bl_number = Some("BL-1".into());
        assert!(!apply_automatic_reconciliation(&mut planned, &supplier(true), Utc::now()));

        let mut blank_bl = delivered(2, 1, 1, "   ");
        assert!(!apply_automatic_reconciliation(&mut blank_bl, &supplier(true), Utc::now()));

        let mut manual = delivered(3, 1, 1, "BL-3");
        assert!(!apply_automatic_reconciliation(&mut manual, &supplier(false), Utc::now()));
        assert!(!manual.reconciled);
    }

    #[test]
    fn delivered_without_date_is_stamped_today() {
        let mut d = delivery(1, 1, 1);
        d.status = DeliveryStatus::Delivered;
        finalize(&mut d, &supplier(false), today(), Utc::now());
        assert_eq!(d.delivered_date, Some(today()));
    }

    #[test]
    fn editing_a_reference_resets_verification() {
        let mut existing = delivered(1, 1, 1, "BL-1");
        existing.verification_status = VerificationStatus::NotFound;

        let merged = plan_update(
            &existing,
            &DeliveryUpdate {
                bl_number: Some("BL-1-bis".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(merged.verification_status, VerificationStatus::Unverified);

        let notes_only = plan_update(
            &existing,
            &DeliveryUpdate {
                notes: Some("quai 3".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(notes_only.verification_status, VerificationStatus::NotFound);
    }

    #[test]
    fn reconciled_delivery_rejects_reconciliation_edits() {
        let mut existing = delivered(1, 1, 1, "BL-1");
        existing.reconciled = true;
        existing.validated_at = Some(Utc::now());

        let err = plan_update(
            &existing,
            &DeliveryUpdate {
                invoice_amount: Some(BigDecimal::from(12)),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let back_to_planned = plan_update(
            &existing,
            &DeliveryUpdate {
                status: Some(DeliveryStatus::Planned),
                ..Default::default()
            },
        );
        assert!(back_to_planned.is_err());

        let notes = plan_update(
            &existing,
            &DeliveryUpdate {
                notes: Some("ok".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(notes.reconciled);
    }

    #[test]
    fn new_delivery_trims_references() {
        let input = DeliveryInput {
            order_id: None,
            supplier_id: 1,
            group_id: 2,
            scheduled_date: today(),
            delivered_date: None,
            quantity: None,
            unit: None,
            status: None,
            notes: Some("".into()),
            bl_number: Some("  BL-9 ".into()),
            bl_amount: None,
            invoice_reference: Some(" ".into()),
            invoice_amount: None,
            due_date: None,
        };
        let d = new_delivery(input, 7, Utc::now());
        assert_eq!(d.bl_number.as_deref(), Some("BL-9"));
        assert_eq!(d.invoice_reference, None);
        assert_eq!(d.notes, None);
        assert_eq!(d.status, DeliveryStatus::Planned);
        assert_eq!(d.created_by, 7);
    }
}
