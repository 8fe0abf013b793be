//! In-memory event store for testing.
//!
//! Records rows in memory with configurable failures. A failed commit
//! records nothing, matching the all-or-nothing behavior of the database
//! unit of work.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::sync::RwLock;

use super::EventStore;
use crate::{
    error::{CoreError, Result},
    models::{AuditRow, DataRow},
};

/// Mock store for exercising request handling without a database.
#[derive(Clone, Default)]
pub struct MockEventStore {
    audit_rows: Arc<RwLock<Vec<AuditRow>>>,
    data_rows: Arc<RwLock<Vec<DataRow>>>,
    commit_error: Arc<RwLock<Option<String>>>,
    audit_error: Arc<RwLock<Option<String>>>,
    health_error: Arc<RwLock<Option<String>>>,
    audit_delay: Arc<RwLock<Option<Duration>>>,
    commit_delay: Arc<RwLock<Option<Duration>>>,
}

impl MockEventStore {
    /// Creates an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail with the given message.
    pub async fn fail_commits(&self, error: impl Into<String>) {
        *self.commit_error.write().await = Some(error.into());
    }

    /// Makes every subsequent standalone audit write fail.
    pub async fn fail_audit_writes(&self, error: impl Into<String>) {
        *self.audit_error.write().await = Some(error.into());
    }

    /// Makes health checks fail.
    pub async fn fail_health_checks(&self, error: impl Into<String>) {
        *self.health_error.write().await = Some(error.into());
    }

    /// Delays standalone audit writes, to observe that callers do not wait.
    pub async fn delay_audit_writes(&self, delay: Duration) {
        *self.audit_delay.write().await = Some(delay);
    }

    /// Delays commits before they take effect.
    pub async fn delay_commits(&self, delay: Duration) {
        *self.commit_delay.write().await = Some(delay);
    }

    /// Returns all recorded audit rows.
    pub async fn audit_rows(&self) -> Vec<AuditRow> {
        self.audit_rows.read().await.clone()
    }

    /// Returns all recorded sale event rows.
    pub async fn data_rows(&self) -> Vec<DataRow> {
        self.data_rows.read().await.clone()
    }
}

impl EventStore for MockEventStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            match self.health_error.read().await.clone() {
                Some(error) => Err(CoreError::Unavailable(error)),
                None => Ok(()),
            }
        })
    }

    fn append_audit(&self, row: AuditRow) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let delay = *self.audit_delay.read().await;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(error) = self.audit_error.read().await.clone() {
                return Err(CoreError::Database(error));
            }

            self.audit_rows.write().await.push(row);
            Ok(())
        })
    }

    fn commit_event(
        &self,
        audit: AuditRow,
        data: DataRow,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let delay = *self.commit_delay.read().await;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(error) = self.commit_error.read().await.clone() {
                return Err(CoreError::Aborted(error));
            }

            let mut audit_rows = self.audit_rows.write().await;
            let mut data_rows = self.data_rows.write().await;
            audit_rows.push(audit);
            data_rows.push(data);
            Ok(())
        })
    }
}
