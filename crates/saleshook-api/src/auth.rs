//! Shared-secret authentication for the ingestion endpoint.
//!
//! The vendor sends the secret in the `X-API-Key` header. It is compared by
//! exact equality with the secret resolved at startup; there is no hashing,
//! lookup or per-tenant key.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Errors that can occur during authentication.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The presented key does not match.
    #[error("invalid API key")]
    InvalidApiKey,
    /// The request carried no `X-API-Key` header.
    #[error("missing X-API-Key header")]
    MissingHeader,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Callers learn nothing about why the key was refused.
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Invalid API key." }))).into_response()
    }
}

/// No secret was configured. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("API_KEY is not configured")]
pub struct MissingSecret;

/// Compares presented credentials with the configured secret.
#[derive(Clone)]
pub struct AuthGuard {
    secret: String,
}

impl AuthGuard {
    /// Creates a guard for the given secret.
    ///
    /// # Errors
    ///
    /// Returns [`MissingSecret`] if the secret is empty after trimming.
    pub fn new(secret: impl Into<String>) -> Result<Self, MissingSecret> {
        let secret = secret.into().trim().to_string();
        if secret.is_empty() {
            return Err(MissingSecret);
        }
        Ok(Self { secret })
    }

    /// Checks a presented key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingHeader` if no key was presented and
    /// `AuthError::InvalidApiKey` if it differs from the secret.
    pub fn verify(&self, presented: Option<&str>) -> Result<(), AuthError> {
        match presented {
            None => Err(AuthError::MissingHeader),
            Some(key) if key == self.secret => Ok(()),
            Some(_) => Err(AuthError::InvalidApiKey),
        }
    }
}

impl std::fmt::Debug for AuthGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGuard").finish_non_exhaustive()
    }
}

/// Extracts the API key from the `X-API-Key` header.
///
/// A header that is not valid visible ASCII is treated as absent.
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()).map(String::from)
}
