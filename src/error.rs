use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::db::connection::ConnectionError;
use crate::db::StoreError;
use crate::response::Envelope;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Validation(String),
    Conflict(String),
    PayloadTooLarge(String),
    Unavailable(ConnectionError),
    Storage(String),
    Internal(String),
}

/// Diagnostic text for a failed request. Attached to every error response as an
/// extension and only written into the body by `middleware::error_detail`.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::Validation(msg) => write!(f, "Validation Error: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload Too Large: {msg}"),
            AppError::Unavailable(err) => write!(f, "Unavailable: {err}"),
            AppError::Storage(msg) => write!(f, "Storage Error: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::Unavailable(err) => {
                tracing::error!("Database connection error: {err}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Database connection unavailable".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage operation failed".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let detail = match self {
            AppError::Unavailable(err) => err.to_string(),
            AppError::Storage(msg) | AppError::Internal(msg) => msg,
            other => other.to_string(),
        };

        let mut response = (status, Envelope::<()>::failure(message.clone())).into_response();
        response
            .extensions_mut()
            .insert(ErrorDetail { message, detail });
        response
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection(e) => AppError::Unavailable(e),
            StoreError::Duplicate { field, value } => {
                AppError::Conflict(format!("A record with {field} '{value}' already exists"))
            }
            StoreError::Backend(msg) => AppError::Storage(msg),
        }
    }
}

impl From<ConnectionError> for AppError {
    fn from(err: ConnectionError) -> Self {
        AppError::Unavailable(err)
    }
}
