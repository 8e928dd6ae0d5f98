use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Reasons a student's PIN login against a class share can fail.
///
/// Callers learn which gate rejected them, never how close a PIN was.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAccessError {
    #[error("Invalid access link")]
    InvalidAccessLink,

    #[error("Access has been revoked")]
    AccessRevoked,

    #[error("Access has expired")]
    AccessExpired,

    #[error("PIN must be exactly 6 digits")]
    InvalidPin,

    #[error("Wrong PIN")]
    WrongPin,

    #[error("Student not found")]
    StudentNotFound,
}

impl ShareAccessError {
    fn status(self) -> StatusCode {
        match self {
            ShareAccessError::InvalidAccessLink | ShareAccessError::StudentNotFound => {
                StatusCode::NOT_FOUND
            }
            ShareAccessError::AccessRevoked | ShareAccessError::AccessExpired => {
                StatusCode::FORBIDDEN
            }
            ShareAccessError::InvalidPin => StatusCode::BAD_REQUEST,
            ShareAccessError::WrongPin => StatusCode::UNAUTHORIZED,
        }
    }
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted store could not be read or written.
    #[error("Store error: {0}")]
    Store(String),

    /// The persisted store exists but does not parse.
    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    /// Bad credentials on login.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No valid session, or the session lost its encryption key.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// A resource not found error. Also returned when the caller does not own it.
    #[error("Resource not found")]
    NotFound,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting resource already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Ciphertext failed authentication, was malformed or was sealed with another key.
    #[error("Decryption failed")]
    Decryption,

    /// No free PIN could be drawn within the retry budget.
    #[error("PIN space exhausted")]
    PinSpaceExhausted,

    /// A share PIN login failed.
    #[error(transparent)]
    ShareAccess(#[from] ShareAccessError),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// A rate limit exceeded error.
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Validation(report.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "File system error".to_string())
            }

            AppError::Store(ref msg) | AppError::CorruptStore(ref msg) => {
                tracing::error!("Store error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::AuthenticationRequired(ref msg) => {
                tracing::debug!("Authentication required: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }

            AppError::Decryption => {
                tracing::error!("Decryption error reached a response boundary");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::PinSpaceExhausted => {
                tracing::error!("PIN space exhausted");
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not generate PINs".to_string())
            }

            AppError::ShareAccess(kind) => {
                tracing::warn!("Share access denied: {}", kind);
                (kind.status(), kind.to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::RateLimitExceeded { retry_after } => {
                tracing::warn!("Rate limit exceeded, retry after {}s", retry_after);
                let body = sonic_rs::to_string(&sonic_rs::json!({
                    "error": "Too many requests",
                    "retry_after": retry_after
                }))
                .unwrap_or_else(|_| r#"{"error":"Too many requests"}"#.to_string());

                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::CONTENT_TYPE, "application/json")],
                    body,
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                return response;
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
