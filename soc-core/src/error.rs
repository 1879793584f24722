use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SocError>;

/// Upstream integration failure classification (spec §7, AdapterError kinds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterFailure {
    Unavailable,
    RateLimited,
    AuthFailed,
    Invalid,
}

impl std::fmt::Display for AdapterFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdapterFailure::Unavailable => "unavailable",
            AdapterFailure::RateLimited => "rate_limited",
            AdapterFailure::AuthFailed => "auth_failed",
            AdapterFailure::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Error taxonomy for the ingestion-to-alert backbone (spec §7).
#[derive(Error, Debug)]
pub enum SocError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("adapter error ({kind}): {message}")]
    Adapter { kind: AdapterFailure, message: String },

    #[error("transient error: {0}")]
    Transient(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("corrupted input: {0}")]
    Corruption(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SocError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        SocError::Validation(msg.into())
    }
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        SocError::NotFound(msg.into())
    }
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        SocError::Conflict(msg.into())
    }
    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        SocError::PermissionDenied(msg.into())
    }
    pub fn adapter<S: Into<String>>(kind: AdapterFailure, msg: S) -> Self {
        SocError::Adapter { kind, message: msg.into() }
    }
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        SocError::Transient(msg.into())
    }
    pub fn parser<S: Into<String>>(msg: S) -> Self {
        SocError::Parser(msg.into())
    }
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        SocError::Corruption(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        SocError::Internal(msg.into())
    }

    /// Whether the retry helper (§7 propagation policy) should retry this error.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            SocError::Transient(_)
                | SocError::Adapter { kind: AdapterFailure::Unavailable, .. }
                | SocError::Adapter { kind: AdapterFailure::RateLimited, .. }
                | SocError::Http(_)
        )
    }
}

impl IntoResponse for SocError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            SocError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            SocError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            SocError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            SocError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
            SocError::Adapter { kind: AdapterFailure::AuthFailed, .. } => {
                (StatusCode::UNAUTHORIZED, "ADAPTER_AUTH_FAILED")
            }
            SocError::Adapter { kind: AdapterFailure::RateLimited, .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "ADAPTER_RATE_LIMITED")
            }
            SocError::Adapter { .. } => (StatusCode::BAD_GATEWAY, "ADAPTER_ERROR"),
            SocError::Transient(_) | SocError::Http(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "TRANSIENT_ERROR")
            }
            SocError::Parser(_) => (StatusCode::UNPROCESSABLE_ENTITY, "PARSER_ERROR"),
            SocError::Corruption(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CORRUPTION"),
            SocError::Serialization(_) | SocError::Io(_) | SocError::Regex(_) | SocError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}
