//! Stream Controller error types.
//!
//! All errors render the uniform `{status: 0, payload: "<message>"}` envelope
//! via the `IntoResponse` impl. The message is the error's `Display` text,
//! returned verbatim.

use crate::models::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Stream Controller error type.
///
/// Maps to HTTP status codes:
/// - EmptyBatch, Validation: 400 Bad Request
/// - Unauthorized: 401 Unauthorized
/// - NotFound, CapacityEviction, Storage, Internal: 500 Internal Server Error
///
/// `NotFound` maps to 500 like every other registry failure on a
/// single-stream endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScError {
    #[error("validation error: batch contains no streams")]
    EmptyBatch,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("stream not found: {0}")]
    NotFound(String),

    #[error("eviction failed: {0}")]
    CapacityEviction(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error")]
    Internal,
}

impl ScError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ScError::EmptyBatch | ScError::Validation(_) => 400,
            ScError::Unauthorized => 401,
            ScError::NotFound(_)
            | ScError::CapacityEviction(_)
            | ScError::Storage(_)
            | ScError::Internal => 500,
        }
    }
}

impl IntoResponse for ScError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            ScError::Storage(err) | ScError::CapacityEviction(err) => {
                tracing::error!(target: "sc.errors", error = %err, "Stream operation failed");
            }
            ScError::Internal => {
                tracing::error!(target: "sc.errors", "Internal error");
            }
            ScError::NotFound(key) => {
                tracing::debug!(target: "sc.errors", stream = %key, "Stream not found");
            }
            ScError::EmptyBatch | ScError::Validation(_) | ScError::Unauthorized => {
                tracing::debug!(target: "sc.errors", error = %self, "Request rejected");
            }
        }

        let mut response =
            (status, Json(Envelope::<String>::failure(self.to_string()))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Basic realm=\"stream-controller\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
