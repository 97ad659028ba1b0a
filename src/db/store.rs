use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{
    DeliveryWithRelations, InvoiceBackfill, References, VerificationCacheEntry, VerificationStatus,
};
use crate::service::cache::VerificationCache;
use crate::service::permissions::StoreScope;
use crate::service::store::DeliveryStore;

use super::{deliveries, verification_cache};

/// Postgres-backed delivery store and verification cache
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryStore for PgStore {
    async fn find_with_relations(
        &self,
        delivery_id: i64,
    ) -> Result<Option<DeliveryWithRelations>, sqlx::Error> {
        deliveries::find_with_relations(&self.pool, delivery_id).await
    }

    async fn backfill_invoice(
        &self,
        delivery_id: i64,
        backfill: &InvoiceBackfill,
    ) -> Result<(), sqlx::Error> {
        deliveries::backfill_invoice(&self.pool, delivery_id, backfill).await
    }

    async fn adopt_references(
        &self,
        delivery_id: i64,
        refs: &References,
    ) -> Result<(), sqlx::Error> {
        deliveries::adopt_references(&self.pool, delivery_id, refs).await
    }

    async fn record_verification(
        &self,
        delivery_id: i64,
        status: VerificationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        deliveries::record_verification(&self.pool, delivery_id, status, at).await
    }

    async fn set_reconciled(
        &self,
        delivery_id: i64,
        validated_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        deliveries::set_reconciled(&self.pool, delivery_id, validated_at).await
    }

    async fn list_for_reconciliation(
        &self,
        scope: &StoreScope,
    ) -> Result<Vec<DeliveryWithRelations>, sqlx::Error> {
        let filter = scope.as_filter();
        let rows = deliveries::list_reconciliation_deliveries(&self.pool, filter.as_deref()).await?;
        deliveries::with_relations(&self.pool, rows).await
    }
}

#[async_trait]
impl VerificationCache for PgStore {
    async fn get(
        &self,
        group_id: i64,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCacheEntry>, sqlx::Error> {
        verification_cache::get_cache_entry(&self.pool, group_id, cache_key, now).await
    }

    async fn put(&self, entry: &VerificationCacheEntry) -> Result<(), sqlx::Error> {
        verification_cache::upsert_cache_entry(&self.pool, entry).await
    }

    async fn invalidate(&self, group_id: i64, cache_key: &str) -> Result<(), sqlx::Error> {
        verification_cache::delete_cache_entry(&self.pool, group_id, cache_key).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        verification_cache::purge_expired_cache(&self.pool, now).await
    }
}
