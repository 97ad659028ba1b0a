use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// DLC: use-by, DDM: best-before, DLUO: optimal best-before
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dlc_date_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DateType {
    Dlc,
    Ddm,
    Dluo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dlc_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DlcStatus {
    Active,
    Expiring,
    Expired,
    Validated,
}

/// Products tracked for their expiry date
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlcProduct {
    pub id: i64,
    pub group_id: i64,
    pub supplier_id: i64,
    pub product_name: String,
    pub gencode: Option<String>,
    pub dlc_date: NaiveDate,
    pub date_type: DateType,
    pub quantity: i32,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub alert_threshold: i32,
    pub status: DlcStatus,
    pub stock_epuise: bool,
    pub validated_at: Option<DateTime<Utc>>,
    pub validated_by: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl DlcProduct {
    /// Status as of `today`; only `validated` is taken from storage
    pub fn effective_status(&self, today: NaiveDate) -> DlcStatus {
        if self.status == DlcStatus::Validated {
            return DlcStatus::Validated;
        }
        if self.dlc_date < today {
            return DlcStatus::Expired;
        }
        let horizon = today + chrono::Duration::days(self.alert_threshold.max(0) as i64);
        if self.dlc_date <= horizon {
            DlcStatus::Expiring
        } else {
            DlcStatus::Active
        }
    }

    pub fn with_effective_status(mut self, today: NaiveDate) -> Self {
        self.status = self.effective_status(today);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlcProductInput {
    pub group_id: i64,
    pub supplier_id: i64,
    pub product_name: String,
    pub gencode: Option<String>,
    pub dlc_date: NaiveDate,
    pub date_type: Option<DateType>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub alert_threshold: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlcProductUpdate {
    pub product_name: Option<String>,
    pub gencode: Option<String>,
    pub dlc_date: Option<NaiveDate>,
    pub date_type: Option<DateType>,
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub location: Option<String>,
    pub alert_threshold: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DlcFilter {
    pub store_id: Option<i64>,
    pub status: Option<DlcStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DlcStats {
    pub active: usize,
    pub expiring: usize,
    pub expired: usize,
    pub validated: usize,
    pub stock_epuise: usize,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(id: i64, dlc_date: NaiveDate) -> DlcProduct {
        DlcProduct {
            id,
            group_id: 1,
            supplier_id: 1,
            product_name: "Yaourt nature x4".to_string(),
            gencode: Some("3250390000000".to_string()),
            dlc_date,
            date_type: DateType::Dlc,
            quantity: 12,
            unit: None,
            location: Some("rayon frais".to_string()),
            alert_threshold: 15,
            status: DlcStatus::Active,
            stock_epuise: false,
            validated_at: None,
            validated_by: None,
            created_by: 1,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn status_is_derived_from_date_and_threshold() {
        let today = day(10);
        assert_eq!(product(1, day(9)).effective_status(today), DlcStatus::Expired);
        assert_eq!(product(1, day(10)).effective_status(today), DlcStatus::Expiring);
        assert_eq!(product(1, day(25)).effective_status(today), DlcStatus::Expiring);
        assert_eq!(product(1, day(26)).effective_status(today), DlcStatus::Active);
    }

    #[test]
    fn validated_products_stay_validated() {
        let mut p = product(1, day(1));
        p.status = DlcStatus::Validated;
        assert_eq!(p.effective_status(day(10)), DlcStatus::Validated);
    }
}
