use chrono::{SubsecRound, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ReconciliationConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    CurrentUser, DeliveryWithRelations, LedgerMapping, MatchType, References,
    VerificationCacheEntry, VerificationOutcome, VerifyInvoiceRequest,
};
use crate::service::cache::VerificationCache;
use crate::service::ledger::{InvoiceLedger, LedgerError, LedgerRecord};
use crate::service::permissions::{self, Action, Module, StoreScope};
use crate::service::store::DeliveryStore;

/// Per-delivery line of a bulk verification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVerificationItem {
    pub delivery_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VerificationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVerificationReport {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    pub results: Vec<BulkVerificationItem>,
}

/// BL / invoice reconciliation: verification against the store ledger,
/// validation and devalidation.
pub struct ReconciliationService {
    deliveries: Arc<dyn DeliveryStore>,
    cache: Arc<dyn VerificationCache>,
    ledger: Arc<dyn InvoiceLedger>,
    settings: ReconciliationConfig,
}

impl ReconciliationService {
    pub fn new(
        deliveries: Arc<dyn DeliveryStore>,
        cache: Arc<dyn VerificationCache>,
        ledger: Arc<dyn InvoiceLedger>,
        settings: ReconciliationConfig,
    ) -> Self {
        Self {
            deliveries,
            cache,
            ledger,
            settings,
        }
    }

    pub fn settings(&self) -> &ReconciliationConfig {
        &self.settings
    }

    /// Loads a delivery the caller may see
    pub async fn load(&self, user: &CurrentUser, delivery_id: i64) -> AppResult<DeliveryWithRelations> {
        let delivery = self
            .deliveries
            .find_with_relations(delivery_id)
            .await?
            .ok_or_else(|| AppError::not_found("delivery", delivery_id))?;
        permissions::require_group(user, delivery.delivery.group_id)?;
        Ok(delivery)
    }

    /// Checks the delivery's references against the store's ledger and backfills empty
    /// invoice fields. Request references may only fill fields the delivery leaves empty.
    /// A reconciled delivery is checked read-only.
    pub async fn verify(
        &self,
        user: &CurrentUser,
        delivery_id: i64,
        request: &VerifyInvoiceRequest,
    ) -> AppResult<VerificationOutcome> {
        let requested = References::new(
            request.invoice_reference.as_deref(),
            request.bl_number.as_deref(),
        )
        .ok_or(AppError::MissingReference)?;
        permissions::require(user, Module::Reconciliation, Action::View)?;

        let delivery = self.load(user, delivery_id).await?;
        let refs = requested
            .for_delivery(&delivery.delivery)
            .map_err(AppError::Validation)?;
        let mapping = delivery
            .group
            .ledger_mapping(delivery.nocodb_config.as_ref())
            .ok_or_else(|| AppError::VerificationUnavailable {
                store: delivery.group.name.clone(),
            })?;

        let group_id = delivery.group.id;
        let cache_key = refs.cache_key(delivery.supplier.id);
        let now = Utc::now();

        let cached = if request.force_refresh {
            None
        } else {
            self.cache.get(group_id, &cache_key, now).await?
        };

        let outcome = match cached {
            Some(entry) => {
                tracing::debug!(delivery_id, cache_key = %cache_key, "verification served from cache");
                entry.to_outcome()
            }
            None => {
                let outcome = self
                    .lookup(&mapping, &refs, &delivery.supplier.name)
                    .await
                    .map_err(|e| {
                        warn!(delivery_id, error = %e, "ledger lookup failed");
                        AppError::ExternalLookup(e.to_string())
                    })?;
                let entry = VerificationCacheEntry::from_outcome(
                    group_id,
                    cache_key,
                    &outcome,
                    self.settings.cache_ttl(),
                );
                self.cache.put(&entry).await?;
                outcome
            }
        };

        if delivery.delivery.reconciled {
            info!(
                delivery_id,
                exists = outcome.exists,
                "reconciled delivery checked, nothing recorded"
            );
            return Ok(outcome);
        }

        // a request invoice reference the ledger did not confirm is not kept
        let adopted = References {
            invoice_reference: refs
                .invoice_reference
                .clone()
                .filter(|_| outcome.match_type != MatchType::BlNumber),
            bl_number: refs.bl_number.clone(),
        };
        if adopted.fills_empty_fields_of(&delivery.delivery) {
            self.deliveries.adopt_references(delivery_id, &adopted).await?;
        }
        if let Some(backfill) = outcome.backfill().filter(|b| !b.is_empty()) {
            self.deliveries.backfill_invoice(delivery_id, &backfill).await?;
        }
        self.deliveries
            .record_verification(delivery_id, outcome.verification_status(), Utc::now())
            .await?;

        info!(
            delivery_id,
            exists = outcome.exists,
            match_type = ?outcome.match_type,
            from_cache = outcome.from_cache,
            "invoice verified"
        );
        Ok(outcome)
    }

    /// Invoice reference first, then BL number
    async fn lookup(
        &self,
        mapping: &LedgerMapping,
        refs: &References,
        supplier_name: &str,
    ) -> Result<VerificationOutcome, LedgerError> {
        // Postgres keeps microseconds; a cached outcome must read back identical
        let now = Utc::now().trunc_subsecs(6);

        if let Some(reference) = &refs.invoice_reference {
            let records = self
                .ledger
                .find_records(mapping, &mapping.invoice_column, reference)
                .await?;
            if let Some(record) = records.into_iter().find(|r| r.matches_supplier(supplier_name)) {
                return Ok(found(MatchType::InvoiceReference, record, reference, now));
            }
        }

        if let Some(bl_number) = &refs.bl_number {
            let records = self
                .ledger
                .find_records(mapping, &mapping.bl_column, bl_number)
                .await?;
            if let Some(record) = records.into_iter().find(|r| r.matches_supplier(supplier_name)) {
                let fallback = refs.invoice_reference.as_deref().unwrap_or_default();
                return Ok(found(MatchType::BlNumber, record, fallback, now));
            }
        }

        Ok(VerificationOutcome {
            exists: false,
            match_type: MatchType::None,
            invoice_reference: None,
            invoice_amount: None,
            due_date: None,
            error_message: Some(not_found_message(refs)),
            from_cache: false,
            checked_at: now,
        })
    }

    /// verified_found → reconciled (or unverified → reconciled for stores without a ledger)
    pub async fn validate(
        &self,
        user: &CurrentUser,
        delivery_id: i64,
    ) -> AppResult<DeliveryWithRelations> {
        permissions::require(user, Module::Reconciliation, Action::Validate)?;
        let delivery = self.load(user, delivery_id).await?;

        if !delivery.delivery.is_delivered() {
            return Err(AppError::InvalidTransition(
                "only delivered deliveries can be reconciled".to_string(),
            ));
        }
        let ledger_configured = delivery
            .group
            .ledger_mapping(delivery.nocodb_config.as_ref())
            .is_some();
        delivery
            .reconciliation_state
            .check_validate(ledger_configured)
            .map_err(|m| AppError::InvalidTransition(m.to_string()))?;

        self.deliveries
            .set_reconciled(delivery_id, Some(Utc::now()))
            .await?;
        info!(delivery_id, user_id = user.id(), "delivery reconciled");
        self.load(user, delivery_id).await
    }

    /// reconciled → unverified
    pub async fn devalidate(
        &self,
        user: &CurrentUser,
        delivery_id: i64,
    ) -> AppResult<DeliveryWithRelations> {
        permissions::require_any(user, Module::Reconciliation, &[Action::Edit, Action::Validate])?;
        let delivery = self.load(user, delivery_id).await?;
        delivery
            .reconciliation_state
            .check_devalidate()
            .map_err(|m| AppError::InvalidTransition(m.to_string()))?;

        self.deliveries.set_reconciled(delivery_id, None).await?;
        info!(delivery_id, user_id = user.id(), "delivery devalidated");
        self.load(user, delivery_id).await
    }

    pub async fn list(
        &self,
        user: &CurrentUser,
        store_id: Option<i64>,
    ) -> AppResult<Vec<DeliveryWithRelations>> {
        permissions::require(user, Module::Reconciliation, Action::View)?;
        let scope = StoreScope::resolve(user, store_id)?;
        Ok(self.deliveries.list_for_reconciliation(&scope).await?)
    }

    /// Re-verifies every unreconciled delivery that can be verified, staggered, force refresh.
    pub async fn bulk_verify(
        &self,
        user: &CurrentUser,
        store_id: Option<i64>,
    ) -> AppResult<BulkVerificationReport> {
        let candidates = self.list(user, store_id).await?;

        let mut queue: IndexMap<i64, References> = IndexMap::new();
        for d in candidates.iter().filter(|d| !d.delivery.reconciled) {
            if d.group.ledger_mapping(d.nocodb_config.as_ref()).is_none() {
                continue;
            }
            if let Some(refs) = References::of_delivery(&d.delivery) {
                queue.entry(d.delivery.id).or_insert(refs);
            }
        }

        info!(count = queue.len(), "bulk verification started");
        let stagger = self.settings.bulk_stagger();
        let runs = queue.into_iter().enumerate().map(|(idx, (delivery_id, refs))| async move {
            tokio::time::sleep(stagger * idx as u32).await;
            let request = VerifyInvoiceRequest {
                invoice_reference: refs.invoice_reference,
                bl_number: refs.bl_number,
                force_refresh: true,
            };
            (delivery_id, self.verify(user, delivery_id, &request).await)
        });
        let results = futures::future::join_all(runs).await;

        let mut report = BulkVerificationReport {
            total: results.len(),
            ..Default::default()
        };
        for (delivery_id, result) in results {
            let item = match result {
                Ok(outcome) => {
                    if outcome.exists {
                        report.found += 1;
                    } else {
                        report.not_found += 1;
                    }
                    BulkVerificationItem {
                        delivery_id,
                        outcome: Some(outcome),
                        error: None,
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    BulkVerificationItem {
                        delivery_id,
                        outcome: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.results.push(item);
        }

        info!(
            total = report.total,
            found = report.found,
            not_found = report.not_found,
            failed = report.failed,
            "bulk verification finished"
        );
        Ok(report)
    }

    /// Forget the cached lookup for a delivery's current references
    pub async fn invalidate(&self, delivery: &DeliveryWithRelations) -> AppResult<()> {
        if let Some(refs) = References::of_delivery(&delivery.delivery) {
            self.cache
                .invalidate(delivery.group.id, &refs.cache_key(delivery.supplier.id))
                .await?;
        }
        Ok(())
    }
}

fn found(
    match_type: MatchType,
    record: LedgerRecord,
    fallback_reference: &str,
    now: chrono::DateTime<Utc>,
) -> VerificationOutcome {
    let invoice_reference = record
        .invoice_reference
        .or_else(|| (!fallback_reference.is_empty()).then(|| fallback_reference.to_string()));
    VerificationOutcome {
        exists: true,
        match_type,
        invoice_reference,
        invoice_amount: record.amount,
        due_date: record.due_date,
        error_message: None,
        from_cache: false,
        checked_at: now,
    }
}

fn not_found_message(refs: &References) -> String {
    match (&refs.invoice_reference, &refs.bl_number) {
        (Some(inv), Some(bl)) => format!(
            "No invoice found for reference {} or BL number {}",
            inv, bl
        ),
        (Some(inv), None) => format!("No invoice found for reference {}", inv),
        (None, Some(bl)) => format!("No invoice found for BL number {}", bl),
        (None, None) => "No invoice found".to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::delivery::fixtures::delivered;
    use crate::models::group::fixtures::{group, mapped_group, nocodb_config};
    use crate::models::{
        Delivery, DeliveryStatus, ReconciliationState, Role, Supplier, VerificationStatus,
    };
    use crate::service::cache::MemoryVerificationCache;
    use crate::service::permissions::fixtures::user;
    use crate::service::store::memory::MemoryDeliveryStore;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;
    use std::time::Duration;
    use tokio::time::Instant;

    const STORE: i64 = 1;
    const WEBHOOK_STORE: i64 = 2;
    const MANUAL_STORE: i64 = 3;

    fn supplier(id: i64, name: &str, automatic: bool) -> Supplier {
        Supplier {
            id,
            name: name.to_string(),
            contact: None,
            phone: None,
            has_dlc: false,
            automatic_reconciliation: automatic,
            requires_control: false,
            created_at: Utc::now(),
        }
    }

    fn invoice(reference: &str, amount: &str) -> LedgerRecord {
        LedgerRecord {
            invoice_reference: Some(reference.to_string()),
            bl_number: None,
            amount: Some(BigDecimal::from_str(amount).unwrap()),
            supplier: Some("Lactalis".to_string()),
            due_date: NaiveDate::from_ymd_opt(2024, 4, 30),
        }
    }

    struct Harness {
        store: Arc<MemoryDeliveryStore>,
        cache: Arc<MemoryVerificationCache>,
        ledger: Arc<FakeLedger>,
        service: ReconciliationService,
    }

    fn harness(deliveries: Vec<Delivery>) -> Harness {
        harness_with(deliveries, test_settings())
    }

    fn harness_with(deliveries: Vec<Delivery>, settings: ReconciliationConfig) -> Harness {
        let mut store = MemoryDeliveryStore::new()
            .with_supplier(supplier(1, "Lactalis", false))
            .with_supplier(supplier(2, "Bonduelle", true))
            .with_config(nocodb_config(10, "http://ledger.test"))
            .with_group(mapped_group(STORE, 10))
            .with_group(crate::models::Group {
                webhook_url: Some("http://hooks.test/invoice".to_string()),
                ..group(WEBHOOK_STORE, "Houdemont")
            })
            .with_group(group(MANUAL_STORE, "Vandoeuvre"));
        for d in deliveries {
            store = store.with_delivery(d);
        }
        let store = Arc::new(store);
        let cache = Arc::new(MemoryVerificationCache::new());
        let ledger = Arc::new(FakeLedger::new());
        let service = ReconciliationService::new(
            store.clone(),
            cache.clone(),
            ledger.clone(),
            settings,
        );
        Harness {
            store,
            cache,
            ledger,
            service,
        }
    }

    fn by_bl(bl: &str) -> VerifyInvoiceRequest {
        VerifyInvoiceRequest {
            invoice_reference: None,
            bl_number: Some(bl.to_string()),
            force_refresh: false,
        }
    }

    fn manager() -> CurrentUser {
        user(5, Role::Manager, &[STORE, WEBHOOK_STORE, MANUAL_STORE])
    }

    #[tokio::test]
    async fn missing_reference_makes_no_external_call() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        let request = VerifyInvoiceRequest {
            invoice_reference: Some("  ".into()),
            bl_number: None,
            force_refresh: true,
        };

        let err = h.service.verify(&manager(), 1, &request).await.unwrap_err();
        assert!(matches!(err, AppError::MissingReference));
        assert_eq!(h.ledger.calls(), 0);
        assert!(h.cache.is_empty());
        assert_eq!(h.store.delivery(1).verification_status, VerificationStatus::Unverified);
    }

    #[tokio::test]
    async fn webhook_only_store_cannot_verify() {
        let mut d = delivered(42, 1, WEBHOOK_STORE, "BL-2024-009");
        d.invoice_reference = None;
        let h = harness(vec![d]);

        let err = h
            .service
            .verify(&manager(), 42, &by_bl("BL-2024-009"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::VerificationUnavailable { .. }));
        assert_eq!(h.ledger.calls(), 0);
    }

    #[tokio::test]
    async fn second_verification_is_served_from_cache() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        let first = h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();
        let calls = h.ledger.calls();
        let second = h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(h.ledger.calls(), calls);
        assert_eq!(second, VerificationOutcome { from_cache: true, ..first });
    }

    #[tokio::test]
    async fn force_refresh_bypasses_the_cache() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();
        let refreshed = h
            .service
            .verify(
                &manager(),
                1,
                &VerifyInvoiceRequest {
                    force_refresh: true,
                    ..by_bl("BL-1")
                },
            )
            .await
            .unwrap();

        assert!(!refreshed.from_cache);
        assert_eq!(h.ledger.calls(), 2);
    }

    #[tokio::test]
    async fn expired_cache_entry_is_recomputed() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        let stale = VerificationCacheEntry {
            group_id: STORE,
            cache_key: "SUP:1|INV:|BL:BL-1".to_string(),
            exists: false,
            match_type: MatchType::None,
            invoice_reference: None,
            invoice_amount: None,
            due_date: None,
            error_message: Some("old".to_string()),
            created_at: Utc::now() - chrono::Duration::hours(2),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        };
        h.cache.put(&stale).await.unwrap();
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        let outcome = h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();
        assert!(outcome.exists);
        assert!(!outcome.from_cache);
        assert_eq!(h.ledger.calls(), 1);
    }

    #[tokio::test]
    async fn backfill_never_overwrites_populated_amount() {
        let mut preset = delivered(1, 1, STORE, "BL-1");
        preset.invoice_amount = Some(BigDecimal::from(100));
        let empty = delivered(2, 1, STORE, "BL-2");
        let h = harness(vec![preset, empty]);
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));
        h.ledger.insert("Numero de BL", "BL-2", invoice("FAC-2", "150"));

        h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();
        h.service.verify(&manager(), 2, &by_bl("BL-2")).await.unwrap();

        let kept = h.store.delivery(1);
        assert_eq!(kept.invoice_amount, Some(BigDecimal::from(100)));
        assert_eq!(kept.invoice_reference.as_deref(), Some("FAC-1"));

        let filled = h.store.delivery(2);
        assert_eq!(filled.invoice_amount, Some(BigDecimal::from(150)));
        assert_eq!(filled.due_date, NaiveDate::from_ymd_opt(2024, 4, 30));
        assert_eq!(filled.verification_status, VerificationStatus::Found);
    }

    #[tokio::test]
    async fn invoice_reference_is_tried_before_bl_number() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        h.ledger.insert("RefFacture", "FAC-9", invoice("FAC-9", "80"));
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        let outcome = h
            .service
            .verify(
                &manager(),
                1,
                &VerifyInvoiceRequest {
                    invoice_reference: Some("FAC-9".into()),
                    bl_number: Some("BL-1".into()),
                    force_refresh: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.match_type, MatchType::InvoiceReference);
        assert_eq!(outcome.invoice_amount, Some(BigDecimal::from(80)));
        assert_eq!(h.ledger.calls(), 1);
        // the confirmed reference fills the empty field
        assert_eq!(h.store.delivery(1).invoice_reference.as_deref(), Some("FAC-9"));
    }

    #[tokio::test]
    async fn falls_back_to_bl_number_and_rejects_other_suppliers() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        h.ledger.insert(
            "RefFacture",
            "FAC-9",
            LedgerRecord {
                supplier: Some("Bonduelle".into()),
                ..invoice("FAC-9", "80")
            },
        );
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        let outcome = h
            .service
            .verify(
                &manager(),
                1,
                &VerifyInvoiceRequest {
                    invoice_reference: Some("FAC-9".into()),
                    bl_number: Some("BL-1".into()),
                    force_refresh: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.match_type, MatchType::BlNumber);
        assert_eq!(outcome.invoice_reference.as_deref(), Some("FAC-1"));
        assert_eq!(h.ledger.calls(), 2);
    }

    #[tokio::test]
    async fn not_found_blocks_validation() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-404")]);

        let outcome = h.service.verify(&manager(), 1, &by_bl("BL-404")).await.unwrap();
        assert!(!outcome.exists);
        assert_eq!(outcome.match_type, MatchType::None);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("No invoice found for BL number BL-404")
        );

        let err = h.service.validate(&manager(), 1).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert!(!h.store.delivery(1).reconciled);

        // misses are cached too
        let again = h.service.verify(&manager(), 1, &by_bl("BL-404")).await.unwrap();
        assert!(again.from_cache);
        assert!(h.service.validate(&manager(), 1).await.is_err());
    }

    #[tokio::test]
    async fn ledger_failure_is_reported_and_not_cached() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        h.ledger.fail_with(LedgerError::Timeout);

        let err = h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap_err();
        match err {
            AppError::ExternalLookup(message) => assert_eq!(message, "ledger did not answer in time"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(h.cache.is_empty());
        assert_eq!(h.store.delivery(1).verification_status, VerificationStatus::Unverified);
    }

    #[tokio::test]
    async fn found_then_validated_then_devalidated() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        let employee = user(9, Role::Employee, &[STORE]);
        assert!(matches!(
            h.service.verify(&employee, 1, &by_bl("BL-1")).await,
            Err(AppError::PermissionDenied(_))
        ));

        h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();
        assert!(matches!(
            h.service.validate(&employee, 1).await,
            Err(AppError::PermissionDenied(_))
        ));

        let reconciled = h.service.validate(&manager(), 1).await.unwrap();
        assert_eq!(reconciled.reconciliation_state, ReconciliationState::Reconciled);
        assert!(reconciled.delivery.validated_at.is_some());

        assert!(matches!(
            h.service.devalidate(&employee, 1).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert!(h.store.delivery(1).reconciled);

        let reverted = h.service.devalidate(&manager(), 1).await.unwrap();
        assert_eq!(reverted.reconciliation_state, ReconciliationState::Unverified);
        assert!(reverted.delivery.validated_at.is_none());
    }

    #[tokio::test]
    async fn unverified_validation_depends_on_ledger_configuration() {
        let h = harness(vec![
            delivered(1, 1, STORE, "BL-1"),
            delivered(2, 1, MANUAL_STORE, "BL-2"),
        ]);

        assert!(matches!(
            h.service.validate(&manager(), 1).await,
            Err(AppError::InvalidTransition(_))
        ));
        assert!(h.service.validate(&manager(), 2).await.unwrap().delivery.reconciled);
    }

    #[tokio::test]
    async fn planned_deliveries_cannot_be_validated() {
        let mut planned = delivered(1, 1, MANUAL_STORE, "BL-1");
        planned.status = DeliveryStatus::Planned;
        let h = harness(vec![planned]);

        assert!(matches!(
            h.service.validate(&manager(), 1).await,
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn store_membership_is_enforced() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        let outsider = user(7, Role::Directeur, &[MANUAL_STORE]);

        assert!(matches!(
            h.service.verify(&outsider, 1, &by_bl("BL-1")).await,
            Err(AppError::PermissionDenied(_))
        ));
        assert_eq!(h.ledger.calls(), 0);
    }

    #[tokio::test]
    async fn bulk_verification_only_touches_eligible_deliveries() {
        let mut reconciled = delivered(2, 1, STORE, "BL-2");
        reconciled.reconciled = true;
        let mut no_reference = delivered(3, 1, STORE, "");
        no_reference.bl_number = None;
        let automatic = delivered(4, 2, STORE, "BL-4");
        let unmapped = delivered(5, 1, WEBHOOK_STORE, "BL-5");
        let h = harness(vec![
            delivered(1, 1, STORE, "BL-1"),
            reconciled,
            no_reference,
            automatic,
            unmapped,
            delivered(6, 1, STORE, "BL-6"),
        ]);
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        // a cached hit must not short-circuit bulk runs
        h.service.verify(&manager(), 6, &by_bl("BL-6")).await.unwrap();
        let before = h.ledger.calls();

        let report = h.service.bulk_verify(&manager(), None).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.found, 1);
        assert_eq!(report.not_found, 1);
        assert_eq!(report.failed, 0);
        let ids: Vec<i64> = report.results.iter().map(|r| r.delivery_id).collect();
        assert_eq!(ids, vec![1, 6]);
        assert_eq!(h.ledger.calls(), before + 2);
    }

    #[tokio::test]
    async fn cached_hits_are_not_shared_between_suppliers() {
        let h = harness(vec![
            delivered(1, 1, STORE, "1200"),
            delivered(2, 2, STORE, "1200"),
        ]);
        // the ledger row belongs to Lactalis
        h.ledger.insert("Numero de BL", "1200", invoice("FAC-LACT", "999"));

        let lactalis = h.service.verify(&manager(), 1, &by_bl("1200")).await.unwrap();
        assert!(lactalis.exists);

        let bonduelle = h.service.verify(&manager(), 2, &by_bl("1200")).await.unwrap();
        assert!(!bonduelle.exists);
        assert!(!bonduelle.from_cache);
        assert_eq!(h.ledger.calls(), 2);

        let d = h.store.delivery(2);
        assert_eq!(d.verification_status, VerificationStatus::NotFound);
        assert_eq!(d.invoice_amount, None);
        assert_eq!(d.invoice_reference, None);
        assert!(matches!(
            h.service.validate(&manager(), 2).await,
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn references_of_another_delivery_are_rejected() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-UNKNOWN")]);
        h.ledger.insert("Numero de BL", "BL-OTHER", invoice("FAC-OTHER", "50"));

        let own = h.service.verify(&manager(), 1, &by_bl("BL-UNKNOWN")).await.unwrap();
        assert!(!own.exists);

        let err = h
            .service
            .verify(&manager(), 1, &by_bl("BL-OTHER"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.ledger.calls(), 1);

        let d = h.store.delivery(1);
        assert_eq!(d.verification_status, VerificationStatus::NotFound);
        assert_eq!(d.bl_number.as_deref(), Some("BL-UNKNOWN"));
        assert_eq!(d.invoice_reference, None);
        assert!(matches!(
            h.service.validate(&manager(), 1).await,
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn request_reference_fills_an_empty_bl_number() {
        let mut d = delivered(1, 1, STORE, "");
        d.bl_number = None;
        let h = harness(vec![d]);
        h.ledger.insert("Numero de BL", "BL-7", invoice("FAC-7", "150"));

        let outcome = h.service.verify(&manager(), 1, &by_bl("BL-7")).await.unwrap();
        assert!(outcome.exists);

        let saved = h.store.delivery(1);
        assert_eq!(saved.bl_number.as_deref(), Some("BL-7"));
        assert_eq!(saved.invoice_reference.as_deref(), Some("FAC-7"));
        assert_eq!(saved.verification_status, VerificationStatus::Found);
    }

    #[tokio::test]
    async fn reconciled_delivery_is_checked_without_writes() {
        let mut d = delivered(1, 1, STORE, "BL-1");
        d.reconciled = true;
        d.validated_at = Some(Utc::now());
        d.verification_status = VerificationStatus::Found;
        let h = harness(vec![d]);
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        let outcome = h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();
        assert!(outcome.exists);

        let after = h.store.delivery(1);
        assert!(after.reconciled);
        assert_eq!(after.invoice_amount, None);
        assert_eq!(after.invoice_reference, None);
        assert_eq!(after.due_date, None);
        assert_eq!(after.last_verified_at, None);
    }

    #[tokio::test]
    async fn outcome_timestamp_has_microsecond_precision() {
        let h = harness(vec![delivered(1, 1, STORE, "BL-1")]);
        h.ledger.insert("Numero de BL", "BL-1", invoice("FAC-1", "150"));

        let outcome = h.service.verify(&manager(), 1, &by_bl("BL-1")).await.unwrap();
        assert_eq!(outcome.checked_at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_verification_staggers_ledger_calls() {
        let settings = ReconciliationConfig {
            bulk_stagger_ms: 400,
            ..test_settings()
        };
        let h = harness_with(
            vec![
                delivered(1, 1, STORE, "BL-1"),
                delivered(2, 1, STORE, "BL-2"),
                delivered(3, 1, STORE, "BL-3"),
            ],
            settings,
        );

        let start = Instant::now();
        let report = h.service.bulk_verify(&manager(), None).await.unwrap();
        assert_eq!(report.total, 3);

        let started = h.ledger.started();
        assert_eq!(started.len(), 3);
        for (i, (value, at)) in started.iter().enumerate() {
            assert_eq!(value, &format!("BL-{}", i + 1));
            let expected = Duration::from_millis(400 * i as u64);
            let offset = *at - start;
            assert!(
                offset >= expected && offset < expected + Duration::from_millis(10),
                "call {} started after {:?}",
                i,
                offset
            );
        }
    }
}
