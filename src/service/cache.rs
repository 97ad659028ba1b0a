use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::models::VerificationCacheEntry;

/// Time-boxed store of ledger lookups, keyed by (store, references)
#[async_trait]
pub trait VerificationCache: Send + Sync {
    /// Non-expired entry for the key, if any
    async fn get(
        &self,
        group_id: i64,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCacheEntry>, sqlx::Error>;

    /// Insert or replace
    async fn put(&self, entry: &VerificationCacheEntry) -> Result<(), sqlx::Error>;

    async fn invalidate(&self, group_id: i64, cache_key: &str) -> Result<(), sqlx::Error>;

    /// Drop expired entries, returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error>;
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryVerificationCache {
    entries: DashMap<(i64, String), VerificationCacheEntry>,
}

impl MemoryVerificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VerificationCache for MemoryVerificationCache {
    async fn get(
        &self,
        group_id: i64,
        cache_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCacheEntry>, sqlx::Error> {
        Ok(self
            .entries
            .get(&(group_id, cache_key.to_string()))
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value().clone()))
    }

    async fn put(&self, entry: &VerificationCacheEntry) -> Result<(), sqlx::Error> {
        self.entries
            .insert((entry.group_id, entry.cache_key.clone()), entry.clone());
        Ok(())
    }

    async fn invalidate(&self, group_id: i64, cache_key: &str) -> Result<(), sqlx::Error> {
        self.entries.remove(&(group_id, cache_key.to_string()));
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        Ok((before - self.entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchType;

    fn entry(group_id: i64, key: &str, expires_at: DateTime<Utc>) -> VerificationCacheEntry {
        VerificationCacheEntry {
            group_id,
            cache_key: key.to_string(),
            exists: false,
            match_type: MatchType::None,
            invoice_reference: None,
            invoice_amount: None,
            due_date: None,
            error_message: Some("no invoice found".to_string()),
            created_at: expires_at - chrono::Duration::hours(1),
            expires_at,
        }
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_absent() {
        let cache = MemoryVerificationCache::new();
        let now = Utc::now();
        cache.put(&entry(1, "INV:A|BL:", now - chrono::Duration::seconds(1))).await.unwrap();
        cache.put(&entry(1, "INV:B|BL:", now + chrono::Duration::hours(1))).await.unwrap();

        assert!(cache.get(1, "INV:A|BL:", now).await.unwrap().is_none());
        assert!(cache.get(1, "INV:B|BL:", now).await.unwrap().is_some());
        // keys are scoped by store
        assert!(cache.get(2, "INV:B|BL:", now).await.unwrap().is_none());

        assert_eq!(cache.purge_expired(now).await.unwrap(), 1);
        assert_eq!(cache.len(), 1);

        cache.invalidate(1, "INV:B|BL:").await.unwrap();
        assert!(cache.is_empty());
    }
}
