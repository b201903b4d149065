//! Error types for the group cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the group cache.
///
/// Version conflicts on CAS writes are not represented here: they are an
/// expected outcome handled by the group tracker, see
/// [`CasOutcome`](crate::store::CasOutcome).
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store could not be reached or answered with an error
    #[error("Store transport error: {0}")]
    Transport(String),

    /// A store round trip exceeded its deadline
    #[error("Store operation on '{key}' timed out after {after:?}")]
    Timeout { key: String, after: Duration },

    /// The value cannot be represented by the configured codec
    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    /// Compression or deserialization of a stored payload failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key not found (HTTP surface)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data (HTTP surface)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Transport(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::UnsupportedValue(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Transport(_) => StatusCode::BAD_GATEWAY,
            CacheError::Codec(_) | CacheError::Config(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the group cache.
pub type Result<T> = std::result::Result<T, CacheError>;
