//! BigQuery error types.

use thiserror::Error;

/// Result type for BigQuery operations.
pub type BigQueryResult<T> = Result<T, BigQueryError>;

/// Errors that can occur during BigQuery operations.
#[derive(Debug, Error)]
pub enum BigQueryError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error(transparent)]
    Auth(#[from] vet_gcp::AuthError),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Query did not complete: {0}")]
    QueryIncomplete(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BigQueryError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status to the matching error variant.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            404 => Self::TableNotFound(body),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, body),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }

    /// Check if error is retryable with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BigQueryError::Network(_) | BigQueryError::RateLimited(_) | BigQueryError::ServerError(..)
        )
    }

    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            BigQueryError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }
}
