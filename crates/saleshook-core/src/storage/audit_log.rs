//! Repository for the `webhook_logs` audit table.
//!
//! One row per request attempt that reached validation. Rows are only ever
//! inserted.

use std::sync::Arc;

use sqlx::{Any, AnyPool, Executor, Transaction};

use super::{engine::Backend, schema};
use crate::{
    error::Result,
    models::{AuditRow, AuditRowId},
};

/// Repository for audit log operations.
pub struct Repository {
    pool: Arc<AnyPool>,
    backend: Backend,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<AnyPool>, backend: Backend) -> Self {
        Self { pool, backend }
    }

    /// Inserts an audit row on its own connection.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn insert(&self, row: &AuditRow) -> Result<AuditRowId> {
        self.insert_impl(&*self.pool, row).await
    }

    /// Inserts an audit row within a transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Any>,
        row: &AuditRow,
    ) -> Result<AuditRowId> {
        self.insert_impl(&mut **tx, row).await
    }

    async fn insert_impl<'e, E>(&self, executor: E, row: &AuditRow) -> Result<AuditRowId>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query(schema::insert_audit(self.backend))
            .bind(row.id.0.to_string())
            .bind(schema::encode_timestamp(self.backend, row.created_at))
            .bind(serde_json::to_string(&row.payload)?)
            .bind(row.valid)
            .execute(executor)
            .await?;

        Ok(row.id)
    }

    /// Counts all audit rows.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook_logs").fetch_one(&*self.pool).await?;

        Ok(count)
    }

    /// Counts audit rows with the given validity flag.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn count_by_validity(&self, valid: bool) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(schema::count_audit_by_validity(self.backend))
            .bind(valid)
            .fetch_one(&*self.pool)
            .await?;

        Ok(count)
    }

    /// Returns the most recent audit rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if query fails or a stored row cannot be decoded.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditRow>> {
        let rows: Vec<(String, String, String, i64)> =
            sqlx::query_as(schema::recent_audit(self.backend))
                .bind(limit)
                .fetch_all(&*self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, created_at, payload, valid)| {
                Ok(AuditRow {
                    id: AuditRowId(parse_uuid(&id)?),
                    created_at: schema::decode_timestamp(&created_at)?,
                    payload: serde_json::from_str(&payload)?,
                    valid: valid != 0,
                })
            })
            .collect()
    }
}

pub(crate) fn parse_uuid(text: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(text)
        .map_err(|e| crate::error::CoreError::CorruptRow(format!("invalid row id {text}: {e}")))
}
