//! Error types and result handling for storage operations.
//!
//! Field-level payload problems are not errors in this sense; they are
//! reported as [`crate::validation::FieldError`] values. Everything here is
//! an infrastructure failure that callers either degrade around (engine
//! selection) or turn into an opaque server error (request handling).

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// No connection could be obtained from the bound engine.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A stored JSON document or timestamp could not be decoded.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// Unit of work did not run to completion.
    #[error("Unit of work aborted: {0}")]
    Aborted(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptRow(format!("invalid JSON payload: {err}"))
    }
}

impl From<chrono::ParseError> for CoreError {
    fn from(err: chrono::ParseError) -> Self {
        Self::CorruptRow(format!("invalid timestamp: {err}"))
    }
}
