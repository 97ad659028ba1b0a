use backoffice_rust::{
    api,
    config::CacheBackend,
    create_pool,
    db::{run_migrations, PgStore},
    service::{MemoryVerificationCache, NocoDbLedger, VerificationCache},
    AppConfig, AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        cache_backend = ?config.reconciliation.cache_backend,
        "configuration loaded"
    );

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;
    info!("database pool ready, migrations applied");

    let store = Arc::new(PgStore::new(pool.clone()));
    let cache: Arc<dyn VerificationCache> = match config.reconciliation.cache_backend {
        CacheBackend::Postgres => store.clone(),
        CacheBackend::Memory => Arc::new(MemoryVerificationCache::new()),
    };
    let ledger = Arc::new(NocoDbLedger::new(config.reconciliation.ledger_timeout())?);

    let state = AppState::new(pool, &config, store, cache.clone(), ledger);
    spawn_cache_purge(cache);

    let app = api::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

fn spawn_cache_purge(cache: Arc<dyn VerificationCache>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match cache.purge_expired(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "expired verification entries purged"),
                Err(e) => warn!(error = %e, "verification cache purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
