//! Test infrastructure for saleshook.
//!
//! [`TestEnv`] binds a fresh in-memory SQLite engine with the schema applied
//! and a [`TestClock`] pinned to a known instant, so event identifiers are
//! predictable. Fixtures for request bodies live in [`fixtures`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
pub use saleshook_core::{
    storage::{mock::MockEventStore, EngineSelector, EventStore, Storage},
    Clock, TestClock,
};

pub mod fixtures;

pub use fixtures::PayloadBuilder;

/// API key configured for every test environment.
pub const TEST_API_KEY: &str = "test-api-key";

/// The instant every [`TestEnv`] clock starts at: 2026-02-03T12:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 3, 12, 0, 0).single().unwrap_or_default()
}

/// Test environment with an isolated in-memory database.
///
/// Each environment owns its own database; nothing is shared between tests.
pub struct TestEnv {
    /// Deterministic clock pinned to [`fixed_now`].
    pub clock: TestClock,
    storage: Arc<Storage>,
}

impl TestEnv {
    /// Binds an ephemeral engine and creates the schema.
    pub async fn new() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
            )
            .with_test_writer()
            .try_init();

        let engine = EngineSelector::ephemeral().context("failed to bind ephemeral engine")?;
        let storage = Storage::new(engine);
        storage.bootstrap().await.context("failed to bootstrap schema")?;

        Ok(Self { clock: TestClock::at(fixed_now()), storage: Arc::new(storage) })
    }

    /// Storage with direct repository access.
    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    /// Storage behind the trait used by request handling.
    pub fn store(&self) -> Arc<dyn EventStore> {
        self.storage.clone()
    }

    /// The test clock as a trait object.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    /// Number of audit rows.
    pub async fn audit_count(&self) -> Result<i64> {
        Ok(self.storage.audit_log.count().await?)
    }

    /// Number of audit rows with the given validity flag.
    pub async fn audit_count_by_validity(&self, valid: bool) -> Result<i64> {
        Ok(self.storage.audit_log.count_by_validity(valid).await?)
    }

    /// Number of sale event rows.
    pub async fn data_count(&self) -> Result<i64> {
        Ok(self.storage.sale_events.count().await?)
    }

    /// Polls until at least `expected` audit rows exist.
    ///
    /// Rejected-body audit writes run detached from the request, so tests
    /// observe them by polling.
    pub async fn wait_for_audit_rows(&self, expected: i64, within: Duration) -> Result<i64> {
        let poll = async {
            loop {
                let count = self.audit_count().await?;
                if count >= expected {
                    return Ok::<_, anyhow::Error>(count);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };

        match tokio::time::timeout(within, poll).await {
            Ok(count) => count,
            Err(_) => bail!("expected {expected} audit rows within {within:?}"),
        }
    }

    /// Installs a trigger that aborts every sale event insert.
    ///
    /// The audit insert in the same unit of work succeeds first, so this
    /// exercises rollback of a partially written transaction. Both tables
    /// stay readable.
    pub async fn reject_sale_event_inserts(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TRIGGER reject_sale_events BEFORE INSERT ON webhook_data
            BEGIN
                SELECT RAISE(ABORT, 'sale event inserts disabled');
            END
            ",
        )
        .execute(self.storage.engine().pool())
        .await
        .context("failed to install reject trigger")?;
        Ok(())
    }
}
