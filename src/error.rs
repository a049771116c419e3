//! Error types for cidgate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Client errors render as `{ "msg": ... }`. Server errors render as
/// `{ "msg": ..., "error": ... }` where `error` carries the underlying
/// description, never a backtrace.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or mismatched shared secret (401)
    #[error("Invalid or missing API key")]
    Unauthorized,

    /// Validation error (400)
    #[error("{0}")]
    Validation(String),

    /// Request body exceeds the configured upload limit (413)
    #[error("File too large: exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Object storage error (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status and metric label for this error
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.classify();

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = if status.is_server_error() {
            let detail = match &self {
                AppError::Storage(msg) | AppError::Config(msg) => msg.clone(),
                AppError::Internal(err) => err.to_string(),
                _ => self.to_string(),
            };
            tracing::error!(error = %detail, error_type, "Request failed");
            serde_json::json!({
                "msg": "Something went wrong while processing the upload",
                "error": detail,
            })
        } else {
            serde_json::json!({ "msg": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
