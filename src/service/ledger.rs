use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::models::{LedgerMapping, LedgerTable};

const PAGE_LIMIT: u32 = 25;

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("ledger did not answer in time")]
    Timeout,
    #[error("ledger rejected the API token")]
    Unauthorized,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected ledger payload: {0}")]
    Malformed(String),
}

/// One invoice row of the external ledger, read through the store's column mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerRecord {
    pub invoice_reference: Option<String>,
    pub bl_number: Option<String>,
    pub amount: Option<BigDecimal>,
    pub supplier: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl LedgerRecord {
    pub fn from_row(mapping: &LedgerMapping, row: &Map<String, Value>) -> Self {
        Self {
            invoice_reference: text(row.get(&mapping.invoice_column)),
            bl_number: text(row.get(&mapping.bl_column)),
            amount: row.get(&mapping.amount_column).and_then(parse_amount),
            supplier: text(row.get(&mapping.supplier_column)),
            due_date: row.get(&mapping.due_date_column).and_then(parse_date),
        }
    }

    /// A row without a supplier value matches any supplier
    pub fn matches_supplier(&self, supplier_name: &str) -> bool {
        let Some(recorded) = &self.supplier else {
            return true;
        };
        let recorded = recorded.trim().to_lowercase();
        let expected = supplier_name.trim().to_lowercase();
        if recorded.is_empty() || expected.is_empty() {
            return true;
        }
        recorded.contains(&expected) || expected.contains(&recorded)
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Accepts JSON numbers and strings like "1 234,56" or "1234.56 €"
pub fn parse_amount(value: &Value) -> Option<BigDecimal> {
    match value {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '€' && *c != '\u{a0}')
                .map(|c| if c == ',' { '.' } else { c })
                .collect();
            BigDecimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

/// Accepts "2024-04-30", "2024-04-30T00:00:00Z" and "30/04/2024"
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    if let Some(prefix) = s.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

/// Read access to a store's invoice ledger
#[async_trait]
pub trait InvoiceLedger: Send + Sync {
    /// Rows whose `column` equals `value`
    async fn find_records(
        &self,
        mapping: &LedgerMapping,
        column: &str,
        value: &str,
    ) -> Result<Vec<LedgerRecord>, LedgerError>;
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    list: Vec<Map<String, Value>>,
}

/// NocoDB REST client
#[derive(Debug, Clone)]
pub struct NocoDbLedger {
    http: Client,
}

impl NocoDbLedger {
    pub fn new(timeout: Duration) -> Result<Self, LedgerError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("backoffice-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    fn records_url(mapping: &LedgerMapping) -> String {
        match &mapping.table {
            LedgerTable::Id(id) => format!("{}/api/v2/tables/{}/records", mapping.base_url, id),
            LedgerTable::Name {
                project_id,
                table_name,
            } => format!(
                "{}/api/v1/db/data/noco/{}/{}",
                mapping.base_url, project_id, table_name
            ),
        }
    }
}

/// NocoDB `where` clause; parentheses and commas would break the syntax
fn where_clause(column: &str, value: &str) -> String {
    let value: String = value
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ','))
        .collect();
    format!("({},eq,{})", column, value)
}

fn map_reqwest_error(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Timeout
    } else {
        LedgerError::Transport(e.to_string())
    }
}

#[async_trait]
impl InvoiceLedger for NocoDbLedger {
    async fn find_records(
        &self,
        mapping: &LedgerMapping,
        column: &str,
        value: &str,
    ) -> Result<Vec<LedgerRecord>, LedgerError> {
        let url = Self::records_url(mapping);
        let limit = PAGE_LIMIT.to_string();
        tracing::debug!(url = %url, column = %column, value = %value, "ledger lookup");

        let res = self
            .http
            .get(&url)
            .header("xc-token", &mapping.api_token)
            .query(&[("where", where_clause(column, value)), ("limit", limit)])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let body: ListResponse = res
                    .json()
                    .await
                    .map_err(|e| LedgerError::Malformed(e.to_string()))?;
                Ok(body
                    .list
                    .iter()
                    .map(|row| LedgerRecord::from_row(mapping, row))
                    .collect())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LedgerError::Unauthorized),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(LedgerError::Http { status, body })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::HeaderMap,
        routing::get,
        Json, Router,
    };
    use crate::service::test_server::serve;
    use serde_json::json;
    use std::collections::HashMap;

    fn mapping(base_url: String, table: LedgerTable) -> LedgerMapping {
        LedgerMapping {
            base_url,
            api_token: "secret".into(),
            table,
            invoice_column: "RefFacture".into(),
            bl_column: "Numero de BL".into(),
            amount_column: "Montant HT".into(),
            supplier_column: "Fournisseur".into(),
            due_date_column: "Date echeance".into(),
        }
    }

    #[test]
    fn row_is_read_through_the_column_mapping() {
        let m = mapping("http://ledger".into(), LedgerTable::Id("t".into()));
        let row = json!({
            "RefFacture": "FAC-881",
            "Numero de BL": 1200457,
            "Montant HT": "1 234,50",
            "Fournisseur": " Lactalis ",
            "Date echeance": "2024-04-30T00:00:00.000Z",
            "Other": true
        });

        let record = LedgerRecord::from_row(&m, row.as_object().unwrap());
        assert_eq!(record.invoice_reference.as_deref(), Some("FAC-881"));
        assert_eq!(record.bl_number.as_deref(), Some("1200457"));
        assert_eq!(record.amount, Some(BigDecimal::from_str("1234.50").unwrap()));
        assert_eq!(record.supplier.as_deref(), Some("Lactalis"));
        assert_eq!(record.due_date, NaiveDate::from_ymd_opt(2024, 4, 30));
    }

    #[test]
    fn amounts_and_dates_in_french_formats() {
        assert_eq!(parse_amount(&json!(150)), Some(BigDecimal::from(150)));
        assert_eq!(parse_amount(&json!("99,90 €")), Some(BigDecimal::from_str("99.90").unwrap()));
        assert_eq!(parse_amount(&json!("n/a")), None);
        assert_eq!(parse_date(&json!("30/04/2024")), NaiveDate::from_ymd_opt(2024, 4, 30));
        assert_eq!(parse_date(&json!(null)), None);
    }

    #[test]
    fn supplier_comparison_is_lenient() {
        let record = LedgerRecord {
            supplier: Some("LACTALIS BEURRES & CREMES".into()),
            ..Default::default()
        };
        assert!(record.matches_supplier("Lactalis"));
        assert!(!record.matches_supplier("Bonduelle"));
        assert!(LedgerRecord::default().matches_supplier("Bonduelle"));
    }

    #[test]
    fn where_clause_strips_syntax_characters() {
        assert_eq!(where_clause("RefFacture", "F(12),3"), "(RefFacture,eq,F123)");
    }

    #[tokio::test]
    async fn queries_v2_records_with_token_and_where_clause() {
        let router = Router::new().route(
            "/api/v2/tables/tbl_invoices/records",
            get(|headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                let authorized = headers.get("xc-token").and_then(|v| v.to_str().ok()) == Some("secret");
                let wanted = q.get("where").map(String::as_str) == Some("(RefFacture,eq,FAC-881)");
                let list = if authorized && wanted {
                    json!([{ "RefFacture": "FAC-881", "Montant HT": 150 }])
                } else {
                    json!([])
                };
                Json(json!({ "list": list, "pageInfo": {} }))
            }),
        );
        let base = serve(router).await;
        let ledger = NocoDbLedger::new(Duration::from_secs(5)).unwrap();
        let m = mapping(base, LedgerTable::Id("tbl_invoices".into()));

        let records = ledger.find_records(&m, "RefFacture", "FAC-881").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, Some(BigDecimal::from(150)));
    }

    #[tokio::test]
    async fn maps_http_failures() {
        let router = Router::new()
            .route(
                "/api/v1/db/data/noco/p1/Factures",
                get(|| async { (axum::http::StatusCode::UNAUTHORIZED, "nope") }),
            )
            .route(
                "/api/v2/tables/broken/records",
                get(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let base = serve(router).await;
        let ledger = NocoDbLedger::new(Duration::from_secs(5)).unwrap();

        let by_name = mapping(
            base.clone(),
            LedgerTable::Name {
                project_id: "p1".into(),
                table_name: "Factures".into(),
            },
        );
        assert!(matches!(
            ledger.find_records(&by_name, "RefFacture", "X").await,
            Err(LedgerError::Unauthorized)
        ));

        let broken = mapping(base, LedgerTable::Id("broken".into()));
        match ledger.find_records(&broken, "RefFacture", "X").await {
            Err(LedgerError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
