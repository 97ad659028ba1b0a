use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A NocoDB instance the ledger lookups go to
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocodbConfig {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub project_id: String,
    #[serde(skip_serializing)]
    pub api_token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// API view: the token is never sent back
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NocodbConfigView {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub project_id: String,
    pub has_api_token: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NocodbConfig> for NocodbConfigView {
    fn from(c: NocodbConfig) -> Self {
        Self {
            id: c.id,
            name: c.name,
            base_url: c.base_url,
            project_id: c.project_id,
            has_api_token: !c.api_token.is_empty(),
            is_active: c.is_active,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocodbConfigInput {
    pub name: String,
    pub base_url: String,
    pub project_id: String,
    /// Absent on update keeps the stored token
    pub api_token: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}
