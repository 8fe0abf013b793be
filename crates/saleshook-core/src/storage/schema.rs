//! Dialect-specific DDL and statements.
//!
//! All values cross the driver boundary as text, integers or booleans.
//! PostgreSQL casts text into its native UUID, TIMESTAMPTZ and JSONB
//! columns on insert; reads cast back to text so every backend decodes
//! the same way.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use super::engine::{Backend, BoundEngine};
use crate::error::Result;

const POSTGRES_DDL: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS webhook_logs (
        id UUID PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        payload JSONB NOT NULL,
        valid BOOLEAN NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS webhook_data (
        id UUID PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL,
        id_venda BIGINT NOT NULL,
        status TEXT NOT NULL,
        payload JSONB NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS ix_webhook_data_id_venda ON webhook_data (id_venda)",
    "CREATE INDEX IF NOT EXISTS ix_webhook_data_status ON webhook_data (status)",
];

// MySQL has no CREATE INDEX IF NOT EXISTS, so indexes are declared inline.
const MYSQL_DDL: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS webhook_logs (
        id CHAR(36) NOT NULL PRIMARY KEY,
        created_at DATETIME(6) NOT NULL,
        payload JSON NOT NULL,
        valid BOOLEAN NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS webhook_data (
        id CHAR(36) NOT NULL PRIMARY KEY,
        created_at DATETIME(6) NOT NULL,
        id_venda BIGINT NOT NULL,
        status VARCHAR(255) NOT NULL,
        payload JSON NOT NULL,
        INDEX ix_webhook_data_id_venda (id_venda),
        INDEX ix_webhook_data_status (status)
    )
    ",
];

const SQLITE_DDL: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS webhook_logs (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        payload TEXT NOT NULL,
        valid BOOLEAN NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS webhook_data (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        id_venda BIGINT NOT NULL,
        status TEXT NOT NULL,
        payload TEXT NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS ix_webhook_data_id_venda ON webhook_data (id_venda)",
    "CREATE INDEX IF NOT EXISTS ix_webhook_data_status ON webhook_data (status)",
];

/// Creates both tables and their indexes if they do not exist.
///
/// # Errors
///
/// Returns error if any DDL statement fails.
pub async fn bootstrap(engine: &BoundEngine) -> Result<()> {
    let statements = match engine.backend() {
        Backend::Postgres => POSTGRES_DDL,
        Backend::MySql => MYSQL_DDL,
        Backend::Sqlite => SQLITE_DDL,
    };

    for statement in statements {
        sqlx::query(statement).execute(engine.pool()).await?;
    }

    debug!(backend = engine.backend().as_str(), "schema bootstrap complete");
    Ok(())
}

pub(crate) fn insert_audit(backend: Backend) -> &'static str {
    match backend {
        Backend::Postgres => {
            r"
            INSERT INTO webhook_logs (id, created_at, payload, valid)
            VALUES (CAST($1 AS UUID), CAST($2 AS TIMESTAMPTZ), CAST($3 AS JSONB), $4)
            "
        },
        Backend::MySql => {
            r"
            INSERT INTO webhook_logs (id, created_at, payload, valid)
            VALUES (?, ?, ?, ?)
            "
        },
        Backend::Sqlite => {
            r"
            INSERT INTO webhook_logs (id, created_at, payload, valid)
            VALUES ($1, $2, $3, $4)
            "
        },
    }
}

pub(crate) fn insert_data(backend: Backend) -> &'static str {
    match backend {
        Backend::Postgres => {
            r"
            INSERT INTO webhook_data (id, created_at, id_venda, status, payload)
            VALUES (CAST($1 AS UUID), CAST($2 AS TIMESTAMPTZ), $3, $4, CAST($5 AS JSONB))
            "
        },
        Backend::MySql => {
            r"
            INSERT INTO webhook_data (id, created_at, id_venda, status, payload)
            VALUES (?, ?, ?, ?, ?)
            "
        },
        Backend::Sqlite => {
            r"
            INSERT INTO webhook_data (id, created_at, id_venda, status, payload)
            VALUES ($1, $2, $3, $4, $5)
            "
        },
    }
}

pub(crate) fn count_audit_by_validity(backend: Backend) -> &'static str {
    match backend {
        Backend::MySql => "SELECT COUNT(*) FROM webhook_logs WHERE valid = ?",
        Backend::Postgres | Backend::Sqlite => "SELECT COUNT(*) FROM webhook_logs WHERE valid = $1",
    }
}

pub(crate) fn recent_audit(backend: Backend) -> &'static str {
    match backend {
        Backend::Postgres => {
            r#"
            SELECT CAST(id AS TEXT),
                   to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.US"Z"'),
                   CAST(payload AS TEXT),
                   CAST(CASE WHEN valid THEN 1 ELSE 0 END AS BIGINT)
            FROM webhook_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#
        },
        Backend::MySql => {
            r"
            SELECT id,
                   DATE_FORMAT(created_at, '%Y-%m-%dT%H:%i:%s.%fZ'),
                   CAST(payload AS CHAR),
                   CAST(CASE WHEN valid THEN 1 ELSE 0 END AS SIGNED)
            FROM webhook_logs
            ORDER BY created_at DESC
            LIMIT ?
            "
        },
        Backend::Sqlite => {
            r"
            SELECT id, created_at, payload, CASE WHEN valid THEN 1 ELSE 0 END
            FROM webhook_logs
            ORDER BY created_at DESC
            LIMIT $1
            "
        },
    }
}

pub(crate) fn data_by_sale_id(backend: Backend) -> &'static str {
    match backend {
        Backend::Postgres => {
            r#"
            SELECT CAST(id AS TEXT),
                   to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.US"Z"'),
                   id_venda,
                   status,
                   CAST(payload AS TEXT)
            FROM webhook_data
            WHERE id_venda = $1
            ORDER BY created_at ASC
            "#
        },
        Backend::MySql => {
            r"
            SELECT id,
                   DATE_FORMAT(created_at, '%Y-%m-%dT%H:%i:%s.%fZ'),
                   id_venda,
                   status,
                   CAST(payload AS CHAR)
            FROM webhook_data
            WHERE id_venda = ?
            ORDER BY created_at ASC
            "
        },
        Backend::Sqlite => {
            r"
            SELECT id, created_at, id_venda, status, payload
            FROM webhook_data
            WHERE id_venda = $1
            ORDER BY created_at ASC
            "
        },
    }
}

/// Formats a timestamp the way the backend's column accepts it.
pub(crate) fn encode_timestamp(backend: Backend, at: DateTime<Utc>) -> String {
    match backend {
        Backend::MySql => at.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        Backend::Postgres | Backend::Sqlite => at.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}

pub(crate) fn decode_timestamp(text: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_round_trip_through_text() {
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 10, 30, 0).unwrap();

        let encoded = encode_timestamp(Backend::Sqlite, at);
        assert_eq!(encoded, "2026-02-03T10:30:00.000000Z");
        assert_eq!(decode_timestamp(&encoded).unwrap(), at);

        assert_eq!(encode_timestamp(Backend::MySql, at), "2026-02-03 10:30:00.000000");
    }

    #[test]
    fn mysql_uses_question_mark_placeholders() {
        assert!(insert_audit(Backend::MySql).contains('?'));
        assert!(!insert_audit(Backend::MySql).contains('$'));
        assert!(insert_data(Backend::Postgres).contains("CAST($5 AS JSONB)"));
    }
}
