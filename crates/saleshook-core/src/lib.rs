//! Core domain types, payload validation and storage for sale-status
//! webhooks.
//!
//! The API crate depends on these pieces for request handling: the
//! [`validation`] gate turns request bodies into typed payloads, and the
//! [`storage`] layer binds one database engine at startup and persists audit
//! rows and sale events through it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod payload;
pub mod storage;
pub mod time;
pub mod validation;

pub use error::{CoreError, Result};
pub use models::{event_id, AuditRow, AuditRowId, DataRow, DataRowId, RejectedBody};
pub use payload::{
    example_body, ClientDescriptor, SpouseDescriptor, ValidatedPayload, VentureDescriptor,
};
pub use storage::{EngineSelector, EventStore, Storage};
pub use time::{Clock, RealClock, TestClock};
pub use validation::{validate, validate_body, ErrorKind, FieldError, PathSegment};
