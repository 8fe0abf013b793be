//! Repository for the `webhook_data` table of accepted sale events.
//!
//! Repeated submissions for the same sale each get their own row; nothing is
//! deduplicated or updated.

use std::sync::Arc;

use sqlx::{Any, AnyPool, Executor, Transaction};

use super::{audit_log::parse_uuid, engine::Backend, schema};
use crate::{
    error::Result,
    models::{DataRow, DataRowId},
};

/// Repository for sale event operations.
pub struct Repository {
    pool: Arc<AnyPool>,
    backend: Backend,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<AnyPool>, backend: Backend) -> Self {
        Self { pool, backend }
    }

    /// Inserts a sale event row within a transaction.
    ///
    /// There is no standalone insert: a sale event is only ever written in
    /// the same unit of work as its audit row.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Any>,
        row: &DataRow,
    ) -> Result<DataRowId> {
        self.insert_impl(&mut **tx, row).await
    }

    async fn insert_impl<'e, E>(&self, executor: E, row: &DataRow) -> Result<DataRowId>
    where
        E: Executor<'e, Database = Any>,
    {
        sqlx::query(schema::insert_data(self.backend))
            .bind(row.id.0.to_string())
            .bind(schema::encode_timestamp(self.backend, row.created_at))
            .bind(row.sale_id)
            .bind(&row.status)
            .bind(serde_json::to_string(&row.payload)?)
            .execute(executor)
            .await?;

        Ok(row.id)
    }

    /// Counts all sale event rows.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook_data").fetch_one(&*self.pool).await?;

        Ok(count)
    }

    /// Finds every row recorded for a sale, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if query fails or a stored row cannot be decoded.
    pub async fn find_by_sale_id(&self, sale_id: i64) -> Result<Vec<DataRow>> {
        let rows: Vec<(String, String, i64, String, String)> =
            sqlx::query_as(schema::data_by_sale_id(self.backend))
                .bind(sale_id)
                .fetch_all(&*self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, created_at, sale_id, status, payload)| {
                Ok(DataRow {
                    id: DataRowId(parse_uuid(&id)?),
                    created_at: schema::decode_timestamp(&created_at)?,
                    sale_id,
                    status,
                    payload: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }
}
