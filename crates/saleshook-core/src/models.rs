//! Persisted record shapes and strongly-typed identifiers.
//!
//! Audit rows and sale event rows look alike but are persisted
//! independently: they share no base type and carry no foreign key to each
//! other. Both are append-only.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::payload::ValidatedPayload;

/// Strongly-typed audit row identifier.
///
/// # Example
///
/// ```
/// use saleshook_core::models::AuditRowId;
/// let id = AuditRowId::new();
/// println!("audit row {id}");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditRowId(pub Uuid);

impl AuditRowId {
    /// Creates a new random audit row ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditRowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AuditRowId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed sale event row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRowId(pub Uuid);

impl DataRowId {
    /// Creates a new random data row ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DataRowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DataRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DataRowId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// One request attempt, valid or not. Stored in `webhook_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    /// Unique identifier for this attempt.
    pub id: AuditRowId,
    /// When the attempt was recorded.
    pub created_at: DateTime<Utc>,
    /// Canonical payload for valid attempts, the raw body otherwise.
    pub payload: Value,
    /// Whether the payload passed validation.
    pub valid: bool,
}

impl AuditRow {
    /// Audit entry for a payload that passed validation.
    pub fn accepted(canonical: Value, created_at: DateTime<Utc>) -> Self {
        Self { id: AuditRowId::new(), created_at, payload: canonical, valid: true }
    }

    /// Audit entry for a rejected body.
    ///
    /// `payload` should come from [`RejectedBody::into_audit_payload`].
    pub fn rejected(payload: Value, created_at: DateTime<Utc>) -> Self {
        Self { id: AuditRowId::new(), created_at, payload, valid: false }
    }
}

/// Queryable projection of an accepted sale event. Stored in `webhook_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    /// Unique identifier, unrelated to the audit row of the same request.
    pub id: DataRowId,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
    /// Vendor-side sale identifier (`id_venda`).
    pub sale_id: i64,
    /// Sale status label.
    pub status: String,
    /// Canonical JSON projection of the validated payload.
    pub payload: Value,
}

impl DataRow {
    /// Builds the data row for a validated payload and its canonical JSON.
    pub fn from_payload(
        payload: &ValidatedPayload,
        canonical: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DataRowId::new(),
            created_at,
            sale_id: payload.sale_id,
            status: payload.status.clone(),
            payload: canonical,
        }
    }
}

/// A request body that did not produce a valid payload, kept for auditing.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectedBody {
    /// Parsed as a JSON object but failed the schema.
    Object(Value),
    /// Parsed as JSON that is not an object.
    NonObject(Value),
    /// Not parseable as JSON; the lossily decoded text.
    Raw(String),
}

impl RejectedBody {
    /// Classifies raw request bytes.
    pub fn from_bytes(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => Self::Object(value),
            Ok(value) => Self::NonObject(value),
            Err(_) => Self::Raw(String::from_utf8_lossy(body).into_owned()),
        }
    }

    /// JSON stored in the audit row for this body.
    pub fn into_audit_payload(self) -> Value {
        match self {
            Self::Object(value) => value,
            Self::NonObject(value) => json!({ "_non_object_json": value }),
            Self::Raw(text) => json!({ "_raw": text }),
        }
    }
}

/// Derives the public event identifier `evt_<YYYYMMDD>_<sale_id>`.
///
/// The date is the UTC calendar date of `at`. Two submissions of the same
/// sale on the same day share an identifier.
pub fn event_id(sale_id: i64, at: DateTime<Utc>) -> String {
    format!("evt_{}_{}", at.format("%Y%m%d"), sale_id)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn event_id_uses_utc_date() {
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 23, 59, 59).unwrap();
        assert_eq!(event_id(6010, at), "evt_20260203_6010");
    }

    #[test]
    fn rejected_body_wraps_unparseable_text() {
        let body = RejectedBody::from_bytes(b"{not json");
        assert_eq!(body.into_audit_payload(), json!({"_raw": "{not json"}));
    }

    #[test]
    fn rejected_body_wraps_non_object_json() {
        let body = RejectedBody::from_bytes(b"[1, 2]");
        assert_eq!(body.into_audit_payload(), json!({"_non_object_json": [1, 2]}));
    }

    #[test]
    fn rejected_body_keeps_objects_verbatim() {
        let body = RejectedBody::from_bytes(br#"{"id_venda": "x"}"#);
        assert_eq!(body.into_audit_payload(), json!({"id_venda": "x"}));
    }

    #[test]
    fn empty_body_is_raw_empty_string() {
        assert_eq!(RejectedBody::from_bytes(b"").into_audit_payload(), json!({"_raw": ""}));
    }

    #[test]
    fn audit_and_data_ids_are_independent() {
        let now = Utc::now();
        let a = AuditRow::accepted(json!({}), now);
        let b = AuditRow::accepted(json!({}), now);
        assert_ne!(a.id, b.id);
        assert!(a.valid);
        assert!(!AuditRow::rejected(json!({}), now).valid);
    }
}
