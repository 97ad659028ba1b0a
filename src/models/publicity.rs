use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Promotional campaign shared by one or more stores
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publicity {
    pub id: i64,
    pub pub_number: String,
    pub designation: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub year: i32,
    /// Participating stores (aggregated from publicity_participations)
    pub group_ids: Vec<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl Publicity {
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start_date <= to && self.end_date >= from
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicityInput {
    pub pub_number: String,
    pub designation: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub group_ids: Vec<i64>,
}
