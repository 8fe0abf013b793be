//! Saleshook webhook ingestion service.
//!
//! Main entry point. Resolves configuration, binds exactly one storage
//! engine, applies the schema and serves until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::{Context, Result};
use saleshook_api::{AppState, AuthGuard, Config};
use saleshook_core::{EngineSelector, RealClock, Storage};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log);

    info!("Starting saleshook webhook ingestion service");
    info!(
        database_url = %config.database_url_masked(),
        database_url_mysql = %config.database_url_mysql_masked(),
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let guard = AuthGuard::new(config.api_key.clone()).context("API_KEY must be set")?;
    let addr = config.parse_server_addr()?;

    let engine = EngineSelector::new(config.to_candidates(), config.pool_settings())
        .select()
        .await
        .context("Failed to bind a storage engine")?;

    if engine.is_ephemeral() {
        warn!("No database reachable, events will not survive a restart");
    }

    let storage = Arc::new(Storage::new(engine));
    storage.bootstrap().await.context("Failed to create schema")?;
    info!(backend = %storage.engine().backend(), "Schema ready");

    let state = AppState::new(guard, storage.clone(), Arc::new(RealClock::new()));

    info!(%addr, "saleshook is ready to receive webhooks");
    saleshook_api::start_server(state, addr, config.request_timeout())
        .await
        .context("Server failed")?;

    storage.engine().pool().close().await;
    info!("Database connections closed");

    info!("saleshook shutdown complete");
    Ok(())
}

/// Initializes tracing. `RUST_LOG` wins over the configured level.
fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directives = format!("{default_level},saleshook=debug,tower_http=debug");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
