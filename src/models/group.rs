use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::NocodbConfig;

pub const DEFAULT_INVOICE_COLUMN: &str = "RefFacture";
pub const DEFAULT_BL_COLUMN: &str = "Numero de BL";
pub const DEFAULT_AMOUNT_COLUMN: &str = "Montant HT";
pub const DEFAULT_SUPPLIER_COLUMN: &str = "Fournisseur";
pub const DEFAULT_DUE_DATE_COLUMN: &str = "Date echeance";

/// Stores (groups) table, including the optional ledger mapping
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub nocodb_config_id: Option<i64>,
    pub nocodb_table_id: Option<String>,
    pub nocodb_table_name: Option<String>,
    pub invoice_column_name: Option<String>,
    pub bl_column_name: Option<String>,
    pub amount_column_name: Option<String>,
    pub supplier_column_name: Option<String>,
    pub due_date_column_name: Option<String>,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Table addressing: NocoDB v2 uses table ids, v1 uses project + table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerTable {
    Id(String),
    Name { project_id: String, table_name: String },
}

/// Everything needed to query a store's external ledger
#[derive(Debug, Clone)]
pub struct LedgerMapping {
    pub base_url: String,
    pub api_token: String,
    pub table: LedgerTable,
    pub invoice_column: String,
    pub bl_column: String,
    pub amount_column: String,
    pub supplier_column: String,
    pub due_date_column: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn column(value: &Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or(default).to_string()
}

impl Group {
    fn table(&self, config: &NocodbConfig) -> Option<LedgerTable> {
        if let Some(id) = non_empty(&self.nocodb_table_id) {
            return Some(LedgerTable::Id(id.to_string()));
        }
        non_empty(&self.nocodb_table_name).map(|name| LedgerTable::Name {
            project_id: config.project_id.clone(),
            table_name: name.to_string(),
        })
    }

    /// Ledger mapping for read lookups. A webhook URL alone does not count.
    pub fn ledger_mapping(&self, config: Option<&NocodbConfig>) -> Option<LedgerMapping> {
        let config = config.filter(|c| c.is_active && self.nocodb_config_id == Some(c.id))?;
        let table = self.table(config)?;

        Some(LedgerMapping {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            table,
            invoice_column: column(&self.invoice_column_name, DEFAULT_INVOICE_COLUMN),
            bl_column: column(&self.bl_column_name, DEFAULT_BL_COLUMN),
            amount_column: column(&self.amount_column_name, DEFAULT_AMOUNT_COLUMN),
            supplier_column: column(&self.supplier_column_name, DEFAULT_SUPPLIER_COLUMN),
            due_date_column: column(&self.due_date_column_name, DEFAULT_DUE_DATE_COLUMN),
        })
    }

    pub fn webhook(&self) -> Option<&str> {
        non_empty(&self.webhook_url)
    }

    pub fn capabilities(&self, config: Option<&NocodbConfig>) -> GroupCapabilities {
        GroupCapabilities {
            can_verify: self.ledger_mapping(config).is_some(),
            can_upload_invoice: self.webhook().is_some(),
        }
    }
}

/// Which reconciliation affordances a store supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCapabilities {
    pub can_verify: bool,
    pub can_upload_invoice: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    #[serde(flatten)]
    pub group: Group,
    #[serde(flatten)]
    pub capabilities: GroupCapabilities,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInput {
    pub name: String,
    pub color: Option<String>,
    pub nocodb_config_id: Option<i64>,
    pub nocodb_table_id: Option<String>,
    pub nocodb_table_name: Option<String>,
    pub invoice_column_name: Option<String>,
    pub bl_column_name: Option<String>,
    pub amount_column_name: Option<String>,
    pub supplier_column_name: Option<String>,
    pub due_date_column_name: Option<String>,
    pub webhook_url: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn group(id: i64, name: &str) -> Group {
        Group {
            id,
            name: name.to_string(),
            color: "#1976D2".to_string(),
            nocodb_config_id: None,
            nocodb_table_id: None,
            nocodb_table_name: None,
            invoice_column_name: None,
            bl_column_name: None,
            amount_column_name: None,
            supplier_column_name: None,
            due_date_column_name: None,
            webhook_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn nocodb_config(id: i64, base_url: &str) -> NocodbConfig {
        NocodbConfig {
            id,
            name: "Ledger".to_string(),
            base_url: base_url.to_string(),
            project_id: "p_ledger".to_string(),
            api_token: "token".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Store wired to config `config_id` through table id `tbl_invoices`
    pub fn mapped_group(id: i64, config_id: i64) -> Group {
        Group {
            nocodb_config_id: Some(config_id),
            nocodb_table_id: Some("tbl_invoices".to_string()),
            ..group(id, "Frouard")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn webhook_only_store_cannot_verify() {
        let group = Group {
            webhook_url: Some("https://hooks.example.test/invoices".into()),
            ..group(1, "Houdemont")
        };

        let caps = group.capabilities(None);
        assert!(!caps.can_verify);
        assert!(caps.can_upload_invoice);
    }

    #[test]
    fn table_name_falls_back_to_v1_addressing_with_default_columns() {
        let config = nocodb_config(3, "https://noco.example.test/");
        let group = Group {
            nocodb_config_id: Some(3),
            nocodb_table_name: Some("Factures".into()),
            amount_column_name: Some("  ".into()),
            ..group(1, "Frouard")
        };

        let mapping = group.ledger_mapping(Some(&config)).unwrap();
        assert_eq!(mapping.base_url, "https://noco.example.test");
        assert_eq!(
            mapping.table,
            LedgerTable::Name {
                project_id: "p_ledger".into(),
                table_name: "Factures".into()
            }
        );
        assert_eq!(mapping.amount_column, DEFAULT_AMOUNT_COLUMN);
        assert_eq!(mapping.invoice_column, DEFAULT_INVOICE_COLUMN);
    }

    #[test]
    fn inactive_or_foreign_config_is_ignored() {
        let mut config = nocodb_config(3, "https://noco.example.test");
        let group = mapped_group(1, 3);
        assert!(group.ledger_mapping(Some(&config)).is_some());

        config.is_active = false;
        assert!(group.ledger_mapping(Some(&config)).is_none());

        let other = nocodb_config(4, "https://noco.example.test");
        assert!(group.ledger_mapping(Some(&other)).is_none());
    }
}
