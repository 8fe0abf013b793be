//! Persistence for audit rows and sale events.
//!
//! The process binds exactly one engine at startup (see [`engine`]). The
//! repositories translate rows to and from that engine's dialect; nothing
//! outside this module issues SQL.
//!
//! Request handling talks to storage through the [`EventStore`] trait so the
//! ingestion pipeline can be exercised against [`mock::MockEventStore`]
//! without a database.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::warn;

pub mod audit_log;
pub mod engine;
pub mod mock;
pub mod sale_events;
pub mod schema;

use crate::{
    error::Result,
    models::{AuditRow, DataRow},
};

pub use engine::{
    Backend, BoundEngine, Candidate, CandidateSource, EngineSelector, PoolSettings, ProbeOutcome,
};

/// Storage operations used while handling a request.
pub trait EventStore: Send + Sync + 'static {
    /// Dialect of the bound engine, for health reporting.
    fn backend(&self) -> &'static str;

    /// Returns true if the in-memory fallback is bound.
    fn is_ephemeral(&self) -> bool {
        false
    }

    /// Runs a liveness query against the bound engine.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Writes a single audit row outside any unit of work.
    ///
    /// Used for rejected bodies, where the write is best effort.
    fn append_audit(&self, row: AuditRow) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Writes an audit row and a sale event row atomically.
    ///
    /// Either both rows become visible or neither does.
    fn commit_event(
        &self,
        audit: AuditRow,
        data: DataRow,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Container for all repository instances over the bound engine.
#[derive(Clone)]
pub struct Storage {
    engine: BoundEngine,

    /// Repository for the audit log.
    pub audit_log: Arc<audit_log::Repository>,

    /// Repository for accepted sale events.
    pub sale_events: Arc<sale_events::Repository>,
}

impl Storage {
    /// Creates a storage instance over the bound engine.
    pub fn new(engine: BoundEngine) -> Self {
        let pool = Arc::new(engine.pool().clone());
        let backend = engine.backend();

        Self {
            audit_log: Arc::new(audit_log::Repository::new(pool.clone(), backend)),
            sale_events: Arc::new(sale_events::Repository::new(pool, backend)),
            engine,
        }
    }

    /// The engine this storage writes to.
    pub fn engine(&self) -> &BoundEngine {
        &self.engine
    }

    /// Creates tables and indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns error if any DDL statement fails.
    pub async fn bootstrap(&self) -> Result<()> {
        schema::bootstrap(&self.engine).await
    }

    /// Performs a health check on the database connection.
    ///
    /// # Errors
    ///
    /// Returns error if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.engine.pool()).await?;
        Ok(())
    }

    /// Inserts both rows in one transaction and commits.
    ///
    /// The transaction is rolled back explicitly if either insert fails.
    ///
    /// # Errors
    ///
    /// Returns the first insert error, or the commit error.
    pub async fn persist_accepted(&self, audit: &AuditRow, data: &DataRow) -> Result<()> {
        let mut tx = self.engine.pool().begin().await?;

        let written = async {
            self.audit_log.insert_in_tx(&mut tx, audit).await?;
            self.sale_events.insert_in_tx(&mut tx, data).await?;
            Ok::<_, crate::error::CoreError>(())
        }
        .await;

        if let Err(e) = written {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback after failed insert also failed");
            }
            return Err(e);
        }

        tx.commit().await?;
        Ok(())
    }
}

impl EventStore for Storage {
    fn backend(&self) -> &'static str {
        self.engine.backend().as_str()
    }

    fn is_ephemeral(&self) -> bool {
        self.engine.is_ephemeral()
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(Storage::health_check(self))
    }

    fn append_audit(&self, row: AuditRow) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.audit_log.insert(&row).await.map(|_| ()) })
    }

    fn commit_event(
        &self,
        audit: AuditRow,
        data: DataRow,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.persist_accepted(&audit, &data).await })
    }
}
