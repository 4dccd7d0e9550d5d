//! Error handling for the ShelfTag server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error (missing uid/title etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parse error (bad table row, bad inbound message)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error (outbound viewer messages)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (durable table read/write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tag reader unavailable
    #[error("Scan source error on {port}: {message}")]
    ScanSource { port: String, message: String },

    /// Config error
    #[error("Config error: {0}")]
    Config(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Parse(msg) => (StatusCode::BAD_REQUEST, "PARSE_ERROR", msg.clone()),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                e.to_string(),
            ),
            Error::ScanSource { port, message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SCAN_SOURCE_ERROR",
                format!("{}: {}", port, message),
            ),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request error"
            );
        } else {
            tracing::debug!(
                status = %status,
                error_code = %error_code,
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
