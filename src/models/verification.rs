use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{clean, Delivery};

/// Which lookup found the ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "match_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    InvoiceReference,
    BlNumber,
    None,
}

/// Outcome of the last completed verification, stored on the delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    Found,
    NotFound,
}

/// Reconciliation state of a delivery.
///
/// ```text
/// unverified --verify--> verified_found --validate--> reconciled
///            \-verify--> verified_not_found   (validate refused)
/// reconciled --devalidate--> unverified
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationState {
    Unverified,
    VerifiedFound,
    VerifiedNotFound,
    Reconciled,
}

impl ReconciliationState {
    pub fn of(delivery: &Delivery) -> Self {
        if delivery.reconciled {
            return Self::Reconciled;
        }
        match delivery.verification_status {
            VerificationStatus::Unverified => Self::Unverified,
            VerificationStatus::Found => Self::VerifiedFound,
            VerificationStatus::NotFound => Self::VerifiedNotFound,
        }
    }

    /// Whether validate may move this state to `Reconciled`.
    /// `ledger_configured` is false for stores that can only reconcile by hand.
    pub fn check_validate(self, ledger_configured: bool) -> Result<(), &'static str> {
        match self {
            Self::VerifiedFound => Ok(()),
            Self::Unverified if !ledger_configured => Ok(()),
            Self::Unverified => Err("verify the invoice before validating"),
            Self::VerifiedNotFound => {
                Err("the last verification found no matching invoice; fix the reference and verify again")
            }
            Self::Reconciled => Err("delivery is already reconciled"),
        }
    }

    pub fn check_devalidate(self) -> Result<(), &'static str> {
        match self {
            Self::Reconciled => Ok(()),
            _ => Err("delivery is not reconciled"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::VerifiedFound => "verified_found",
            Self::VerifiedNotFound => "verified_not_found",
            Self::Reconciled => "reconciled",
        }
    }
}

/// Body of `POST /api/deliveries/:id/verify-invoice`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyInvoiceRequest {
    pub invoice_reference: Option<String>,
    pub bl_number: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Trimmed references, at least one present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct References {
    pub invoice_reference: Option<String>,
    pub bl_number: Option<String>,
}

impl References {
    pub fn new(invoice_reference: Option<&str>, bl_number: Option<&str>) -> Option<Self> {
        let refs = Self {
            invoice_reference: clean(invoice_reference),
            bl_number: clean(bl_number),
        };
        if refs.invoice_reference.is_none() && refs.bl_number.is_none() {
            None
        } else {
            Some(refs)
        }
    }

    pub fn of_delivery(delivery: &Delivery) -> Option<Self> {
        Self::new(
            delivery.invoice_reference.as_deref(),
            delivery.bl_number.as_deref(),
        )
    }

    /// References to check for `delivery`. The request may fill a field the delivery
    /// leaves empty but never replace a stored one; a stored field the request omits is
    /// still checked.
    pub fn for_delivery(&self, delivery: &Delivery) -> Result<Self, String> {
        let stored = Self {
            invoice_reference: clean(delivery.invoice_reference.as_deref()),
            bl_number: clean(delivery.bl_number.as_deref()),
        };
        let pick = |label: &str, requested: &Option<String>, stored: &Option<String>| {
            match (requested, stored) {
                (Some(r), Some(s)) if r != s => Err(format!(
                    "{} {} does not match the delivery's {} {}; edit the delivery first",
                    label, r, label, s
                )),
                (Some(r), _) => Ok(Some(r.clone())),
                (None, s) => Ok(s.clone()),
            }
        };
        Ok(Self {
            invoice_reference: pick(
                "invoice reference",
                &self.invoice_reference,
                &stored.invoice_reference,
            )?,
            bl_number: pick("BL number", &self.bl_number, &stored.bl_number)?,
        })
    }

    /// Whether writing these references would fill an empty field of `delivery`
    pub fn fills_empty_fields_of(&self, delivery: &Delivery) -> bool {
        (self.bl_number.is_some() && clean(delivery.bl_number.as_deref()).is_none())
            || (self.invoice_reference.is_some()
                && clean(delivery.invoice_reference.as_deref()).is_none())
    }

    /// Ledger rows are filtered by supplier, so lookups are cached per supplier
    pub fn cache_key(&self, supplier_id: i64) -> String {
        format!(
            "SUP:{}|INV:{}|BL:{}",
            supplier_id,
            self.invoice_reference.as_deref().unwrap_or(""),
            self.bl_number.as_deref().unwrap_or("")
        )
    }
}

/// Result of a verification as returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub exists: bool,
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_amount: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub from_cache: bool,
    pub checked_at: DateTime<Utc>,
}

impl VerificationOutcome {
    /// Outcome body for a ledger failure; never cached
    pub fn lookup_failed(message: String) -> Self {
        Self {
            exists: false,
            match_type: MatchType::None,
            invoice_reference: None,
            invoice_amount: None,
            due_date: None,
            error_message: Some(message),
            from_cache: false,
            checked_at: Utc::now(),
        }
    }

    pub fn verification_status(&self) -> VerificationStatus {
        if self.exists {
            VerificationStatus::Found
        } else {
            VerificationStatus::NotFound
        }
    }

    /// Fields a successful match may fill on the delivery
    pub fn backfill(&self) -> Option<InvoiceBackfill> {
        if !self.exists {
            return None;
        }
        Some(InvoiceBackfill {
            invoice_reference: match self.match_type {
                MatchType::BlNumber => self.invoice_reference.clone(),
                _ => None,
            },
            invoice_amount: self.invoice_amount.clone(),
            due_date: self.due_date,
        })
    }
}

/// Values written to a delivery only where its field is still empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceBackfill {
    pub invoice_reference: Option<String>,
    pub invoice_amount: Option<BigDecimal>,
    pub due_date: Option<NaiveDate>,
}

impl InvoiceBackfill {
    pub fn is_empty(&self) -> bool {
        self.invoice_reference.is_none() && self.invoice_amount.is_none() && self.due_date.is_none()
    }

    /// Apply to a delivery without touching populated fields
    pub fn apply_to(&self, delivery: &mut Delivery) -> bool {
        let mut changed = false;
        if delivery.invoice_reference.is_none() && self.invoice_reference.is_some() {
            delivery.invoice_reference = self.invoice_reference.clone();
            changed = true;
        }
        if delivery.invoice_amount.is_none() && self.invoice_amount.is_some() {
            delivery.invoice_amount = self.invoice_amount.clone();
            changed = true;
        }
        if delivery.due_date.is_none() && self.due_date.is_some() {
            delivery.due_date = self.due_date;
            changed = true;
        }
        changed
    }
}

/// Row of `invoice_verification_cache`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VerificationCacheEntry {
    pub group_id: i64,
    pub cache_key: String,
    pub exists: bool,
    pub match_type: MatchType,
    pub invoice_reference: Option<String>,
    pub invoice_amount: Option<BigDecimal>,
    pub due_date: Option<NaiveDate>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCacheEntry {
    pub fn from_outcome(
        group_id: i64,
        cache_key: String,
        outcome: &VerificationOutcome,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            group_id,
            cache_key,
            exists: outcome.exists,
            match_type: outcome.match_type,
            invoice_reference: outcome.invoice_reference.clone(),
            invoice_amount: outcome.invoice_amount.clone(),
            due_date: outcome.due_date,
            error_message: outcome.error_message.clone(),
            created_at: outcome.checked_at,
            expires_at: outcome.checked_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn to_outcome(&self) -> VerificationOutcome {
        VerificationOutcome {
            exists: self.exists,
            match_type: self.match_type,
            invoice_reference: self.invoice_reference.clone(),
            invoice_amount: self.invoice_amount.clone(),
            due_date: self.due_date,
            error_message: self.error_message.clone(),
            from_cache: true,
            checked_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::delivery::fixtures::delivered;
    use std::str::FromStr;

    fn found_by_bl() -> VerificationOutcome {
        VerificationOutcome {
            exists: true,
            match_type: MatchType::BlNumber,
            invoice_reference: Some("FAC-881".into()),
            invoice_amount: Some(BigDecimal::from_str("150").unwrap()),
            due_date: NaiveDate::from_ymd_opt(2024, 4, 30),
            error_message: None,
            from_cache: false,
            checked_at: Utc::now(),
        }
    }

    #[test]
    fn state_machine_gates_validation() {
        assert!(ReconciliationState::VerifiedFound.check_validate(true).is_ok());
        assert!(ReconciliationState::VerifiedNotFound.check_validate(true).is_err());
        assert!(ReconciliationState::VerifiedNotFound.check_validate(false).is_err());
        assert!(ReconciliationState::Unverified.check_validate(true).is_err());
        assert!(ReconciliationState::Unverified.check_validate(false).is_ok());
        assert!(ReconciliationState::Reconciled.check_validate(true).is_err());
        assert!(ReconciliationState::Reconciled.check_devalidate().is_ok());
        assert!(ReconciliationState::VerifiedFound.check_devalidate().is_err());
    }

    #[test]
    fn reconciled_flag_wins_over_verification_status() {
        let mut d = delivered(1, 1, 1, "BL-1");
        d.verification_status = VerificationStatus::NotFound;
        assert_eq!(d.reconciliation_state(), ReconciliationState::VerifiedNotFound);
        d.reconciled = true;
        assert_eq!(d.reconciliation_state(), ReconciliationState::Reconciled);
    }

    #[test]
    fn references_require_one_non_blank_value() {
        assert_eq!(References::new(None, None), None);
        assert_eq!(References::new(Some("  "), Some("")), None);

        let refs = References::new(None, Some(" BL-2024-009 ")).unwrap();
        assert_eq!(refs.bl_number.as_deref(), Some("BL-2024-009"));
        assert_eq!(refs.cache_key(4), "SUP:4|INV:|BL:BL-2024-009");
        assert_ne!(refs.cache_key(4), refs.cache_key(5));
    }

    #[test]
    fn request_references_may_only_fill_empty_fields() {
        let mut d = delivered(1, 1, 1, "BL-UNKNOWN");

        let same = References::new(None, Some("BL-UNKNOWN")).unwrap();
        assert_eq!(same.for_delivery(&d).unwrap(), same);

        let other = References::new(None, Some("BL-OTHER")).unwrap();
        let err = other.for_delivery(&d).unwrap_err();
        assert!(err.contains("BL-OTHER") && err.contains("BL-UNKNOWN"));

        let with_invoice = References::new(Some("FAC-1"), None).unwrap();
        let merged = with_invoice.for_delivery(&d).unwrap();
        assert_eq!(merged.invoice_reference.as_deref(), Some("FAC-1"));
        assert_eq!(merged.bl_number.as_deref(), Some("BL-UNKNOWN"));
        assert!(merged.fills_empty_fields_of(&d));

        d.invoice_reference = Some("FAC-1".into());
        assert!(!merged.fills_empty_fields_of(&d));
    }

    #[test]
    fn backfill_only_fills_empty_fields() {
        let backfill = found_by_bl().backfill().unwrap();
        let mut d = delivered(1, 1, 1, "BL-1");
        d.invoice_amount = Some(BigDecimal::from_str("100").unwrap());

        assert!(backfill.apply_to(&mut d));
        assert_eq!(d.invoice_amount, Some(BigDecimal::from_str("100").unwrap()));
        assert_eq!(d.invoice_reference.as_deref(), Some("FAC-881"));
        assert_eq!(d.due_date, NaiveDate::from_ymd_opt(2024, 4, 30));

        // second pass changes nothing
        assert!(!backfill.apply_to(&mut d));
    }

    #[test]
    fn invoice_reference_is_backfilled_only_for_bl_matches() {
        let outcome = VerificationOutcome {
            match_type: MatchType::InvoiceReference,
            ..found_by_bl()
        };
        assert_eq!(outcome.backfill().unwrap().invoice_reference, None);

        let missing = VerificationOutcome {
            exists: false,
            match_type: MatchType::None,
            ..found_by_bl()
        };
        assert!(missing.backfill().is_none());
    }

    #[test]
    fn cache_entry_round_trips_outcome_and_expires() {
        let outcome = found_by_bl();
        let entry = VerificationCacheEntry::from_outcome(
            7,
            "INV:|BL:BL-1".into(),
            &outcome,
            chrono::Duration::minutes(5),
        );

        let cached = entry.to_outcome();
        assert!(cached.from_cache);
        assert_eq!(cached, VerificationOutcome { from_cache: true, ..outcome.clone() });

        assert!(!entry.is_expired(outcome.checked_at + chrono::Duration::minutes(4)));
        assert!(entry.is_expired(outcome.checked_at + chrono::Duration::minutes(5)));
    }
}
