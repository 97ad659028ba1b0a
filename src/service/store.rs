use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{DeliveryWithRelations, InvoiceBackfill, References, VerificationStatus};
use crate::service::permissions::StoreScope;

/// Delivery persistence used by the reconciliation workflow
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    async fn find_with_relations(
        &self,
        delivery_id: i64,
    ) -> Result<Option<DeliveryWithRelations>, sqlx::Error>;

    /// Fill empty invoice fields only; populated fields are left alone
    async fn backfill_invoice(
        &self,
        delivery_id: i64,
        backfill: &InvoiceBackfill,
    ) -> Result<(), sqlx::Error>;

    /// Store checked references into empty BL / invoice reference fields
    async fn adopt_references(
        &self,
        delivery_id: i64,
        refs: &References,
    ) -> Result<(), sqlx::Error>;

    async fn record_verification(
        &self,
        delivery_id: i64,
        status: VerificationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// `validated_at = None` devalidates and resets the verification status
    async fn set_reconciled(
        &self,
        delivery_id: i64,
        validated_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error>;

    /// Delivered deliveries of manual-reconciliation suppliers
    async fn list_for_reconciliation(
        &self,
        scope: &StoreScope,
    ) -> Result<Vec<DeliveryWithRelations>, sqlx::Error>;
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use crate::models::{clean, Delivery, Group, NocodbConfig, Supplier};
    use dashmap::DashMap;

    /// In-memory deliveries with their relations
    #[derive(Default)]
    pub struct MemoryDeliveryStore {
        pub deliveries: DashMap<i64, Delivery>,
        pub suppliers: DashMap<i64, Supplier>,
        pub groups: DashMap<i64, Group>,
        pub configs: DashMap<i64, NocodbConfig>,
    }

    impl MemoryDeliveryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_supplier(self, supplier: Supplier) -> Self {
            self.suppliers.insert(supplier.id, supplier);
            self
        }

        pub fn with_group(self, group: Group) -> Self {
            self.groups.insert(group.id, group);
            self
        }

        pub fn with_config(self, config: NocodbConfig) -> Self {
            self.configs.insert(config.id, config);
            self
        }

        pub fn with_delivery(self, delivery: Delivery) -> Self {
            self.deliveries.insert(delivery.id, delivery);
            self
        }

        pub fn delivery(&self, id: i64) -> Delivery {
            self.deliveries.get(&id).map(|d| d.clone()).expect("delivery")
        }

        fn relations(&self, delivery: Delivery) -> Option<DeliveryWithRelations> {
            let supplier = self.suppliers.get(&delivery.supplier_id)?.clone();
            let group = self.groups.get(&delivery.group_id)?.clone();
            let config = group
                .nocodb_config_id
                .and_then(|id| self.configs.get(&id).map(|c| c.clone()));
            Some(DeliveryWithRelations::new(delivery, supplier, group, config))
        }
    }

    #[async_trait]
    impl DeliveryStore for MemoryDeliveryStore {
        async fn find_with_relations(
            &self,
            delivery_id: i64,
        ) -> Result<Option<DeliveryWithRelations>, sqlx::Error> {
            let delivery = self.deliveries.get(&delivery_id).map(|d| d.clone());
            Ok(delivery.and_then(|d| self.relations(d)))
        }

        async fn backfill_invoice(
            &self,
            delivery_id: i64,
            backfill: &InvoiceBackfill,
        ) -> Result<(), sqlx::Error> {
            if let Some(mut d) = self.deliveries.get_mut(&delivery_id) {
                backfill.apply_to(&mut d);
            }
            Ok(())
        }

        async fn adopt_references(
            &self,
            delivery_id: i64,
            refs: &References,
        ) -> Result<(), sqlx::Error> {
            if let Some(mut d) = self.deliveries.get_mut(&delivery_id) {
                if refs.bl_number.is_some() && clean(d.bl_number.as_deref()).is_none() {
                    d.bl_number = refs.bl_number.clone();
                }
                if refs.invoice_reference.is_some()
                    && clean(d.invoice_reference.as_deref()).is_none()
                {
                    d.invoice_reference = refs.invoice_reference.clone();
                }
            }
            Ok(())
        }

        async fn record_verification(
            &self,
            delivery_id: i64,
            status: VerificationStatus,
            at: DateTime<Utc>,
        ) -> Result<(), sqlx::Error> {
            if let Some(mut d) = self.deliveries.get_mut(&delivery_id) {
                d.verification_status = status;
                d.last_verified_at = Some(at);
            }
            Ok(())
        }

        async fn set_reconciled(
            &self,
            delivery_id: i64,
            validated_at: Option<DateTime<Utc>>,
        ) -> Result<(), sqlx::Error> {
            if let Some(mut d) = self.deliveries.get_mut(&delivery_id) {
                d.reconciled = validated_at.is_some();
                d.validated_at = validated_at;
                if validated_at.is_none() {
                    d.verification_status = VerificationStatus::Unverified;
                }
            }
            Ok(())
        }

        async fn list_for_reconciliation(
            &self,
            scope: &StoreScope,
        ) -> Result<Vec<DeliveryWithRelations>, sqlx::Error> {
            let mut rows: Vec<DeliveryWithRelations> = self
                .deliveries
                .iter()
                .filter(|d| d.is_delivered() && scope.contains(d.group_id))
                .filter_map(|d| self.relations(d.clone()))
                .filter(|d| !d.supplier.automatic_reconciliation)
                .collect();
            rows.sort_by_key(|d| d.delivery.id);
            Ok(rows)
        }
    }
}
