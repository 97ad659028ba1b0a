use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reconciliation: ReconciliationConfig,
    pub calendar: CalendarConfig,
    pub dlc: DlcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Where verification outcomes are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    pub cache_backend: CacheBackend,
    /// Lifetime of a cached ledger lookup
    pub cache_ttl_secs: u64,
    /// Delay between two starts during bulk verification
    pub bulk_stagger_ms: u64,
    /// Hard cutoff for the invoice-PDF webhook
    pub webhook_timeout_secs: u64,
    /// Wait before re-verifying after a successful upload
    pub reverify_delay_ms: u64,
    pub ledger_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub max_visible_per_day: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlcConfig {
    pub default_alert_threshold_days: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/backoffice".to_string(),
                max_connections: 20,
                acquire_timeout_secs: 10,
            },
            reconciliation: ReconciliationConfig::default(),
            calendar: CalendarConfig {
                max_visible_per_day: 3,
            },
            dlc: DlcConfig {
                default_alert_threshold_days: 15,
            },
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            cache_backend: CacheBackend::Postgres,
            cache_ttl_secs: 3600,
            bulk_stagger_ms: 400,
            webhook_timeout_secs: 60,
            reverify_delay_ms: 3000,
            ledger_timeout_secs: 15,
        }
    }
}

impl ReconciliationConfig {
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs as i64)
    }

    pub fn bulk_stagger(&self) -> Duration {
        Duration::from_millis(self.bulk_stagger_ms)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn reverify_delay(&self) -> Duration {
        Duration::from_millis(self.reverify_delay_ms)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration: defaults, then `config/default`, `config/{RUN_MODE}`,
    /// then `APP__SECTION__KEY` environment variables. `DATABASE_URL`, `SERVER_HOST`
    /// and `SERVER_PORT` win over everything.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"));

        if let Ok(url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", url)?;
        }
        if let Ok(host) = std::env::var("SERVER_HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            builder = builder.set_override("server.port", i64::from(port))?;
        }

        builder.build()?.try_deserialize()
    }
}
