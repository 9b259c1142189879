//! Error types for the cache engine and its HTTP surface
//!
//! Provides unified error handling using thiserror. Only `CacheError` ever
//! reaches a caller; the other enums describe capability failures that the
//! engine absorbs and logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Error type returned by the HTTP handlers.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CacheError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            CacheError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Storage Error Enum ==
/// Failures raised by a persistent key-value capability.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The host quota would be exceeded by this write
    #[error("Storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    /// Filesystem failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Returns true when the failure is a quota condition.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

// == Codec Error Enum ==
/// Failures of the compress/decompress pipeline.
#[derive(Error, Debug)]
pub enum CodecError {
    /// No worker is reachable (channel closed or cache shut down)
    #[error("Codec worker unavailable")]
    WorkerUnavailable,

    /// The worker did not answer within the configured timeout
    #[error("Codec worker timed out after {0} ms")]
    WorkerTimeout(u64),

    /// The worker replied with an error
    #[error("Codec worker error: {0}")]
    Worker(String),

    /// The worker answered a different request id
    #[error("Codec worker replied to an unexpected request")]
    MismatchedReply,

    /// Payload bytes could not be decoded
    #[error("Corrupt payload: {0}")]
    Corrupt(String),

    /// Value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Strategy Error ==
/// Raised by a strategy predicate that cannot decide.
#[derive(Error, Debug)]
#[error("Strategy '{strategy}' failed: {reason}")]
pub struct StrategyError {
    pub strategy: String,
    pub reason: String,
}

impl StrategyError {
    pub fn new(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the HTTP surface.
pub type Result<T> = std::result::Result<T, CacheError>;
