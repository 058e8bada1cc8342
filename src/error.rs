use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;

/// Error kinds (not full error types) per the selector loop's classification
/// policy: each kind carries just enough to decide whether to mutate pool
/// state (disable/cooldown) or advance to the next credential.
#[derive(Debug, ThisError)]
pub enum GatewayError {
    /// OAuth refresh or project discovery rejected the credential outright
    /// (HTTP 400/403). The selector disables the credential permanently.
    #[error("credential is permanently dead: {0}")]
    AuthDead(String),

    /// Upstream rejected the request for quota reasons, carrying when it
    /// resets. The selector installs a cooldown and retries the next
    /// credential.
    #[error("quota exhausted, resets at {reset_at}")]
    QuotaExhausted {
        reset_at: chrono::DateTime<chrono::Utc>,
        reason: String,
    },

    /// Network error, upstream 5xx, or timeout. The selector advances to the
    /// next credential up to the configured attempt cap.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// The client request violated the message schema. Surfaced directly,
    /// never retried.
    #[error("invalid request field `{field}`: {message}")]
    TranslationInput { field: String, message: String },

    /// No usable credential remained after one full round of the pool.
    #[error("credential pool exhausted")]
    PoolExhausted,

    #[error("upstream returned HTTP {0}")]
    UpstreamStatus(StatusCode),

    #[error("request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for GatewayError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transient(_) | GatewayError::Reqwest(_) | GatewayError::UpstreamStatus(_)
        )
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            GatewayError::TranslationInput { field, message } => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject {
                    code: "INVALID_REQUEST".to_string(),
                    message: format!("{field}: {message}"),
                    details: None,
                },
            ),
            GatewayError::PoolExhausted => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorObject {
                    code: "POOL_EXHAUSTED".to_string(),
                    message: "no usable credential after one full round".to_string(),
                    details: None,
                },
            ),
            GatewayError::AuthDead(_) => (
                StatusCode::FORBIDDEN,
                ApiErrorObject {
                    code: "AUTH_DEAD".to_string(),
                    message: "credential rejected by upstream authentication".to_string(),
                    details: None,
                },
            ),
            GatewayError::QuotaExhausted { reset_at, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorObject {
                    code: "QUOTA_EXHAUSTED".to_string(),
                    message: format!("quota resets at {reset_at}"),
                    details: None,
                },
            ),
            GatewayError::Transient(_)
            | GatewayError::Reqwest(_)
            | GatewayError::UpstreamStatus(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorObject {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: "upstream service error".to_string(),
                    details: None,
                },
            ),
            GatewayError::Json(_) | GatewayError::Io(_) | GatewayError::Unexpected(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorObject {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "an internal server error occurred".to_string(),
                    details: None,
                },
            ),
        };
        (status, Json(ApiErrorBody { inner: body })).into_response()
    }
}

#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
