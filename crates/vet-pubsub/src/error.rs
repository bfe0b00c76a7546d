//! Pub/Sub error types.

use thiserror::Error;

/// Result type for Pub/Sub operations.
pub type PubSubResult<T> = Result<T, PubSubError>;

/// Errors that can occur during Pub/Sub operations.
#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("Failed to configure publisher: {0}")]
    ConfigError(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Invalid push envelope: {0}")]
    InvalidEnvelope(String),

    #[error(transparent)]
    Auth(#[from] vet_gcp::AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PubSubError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn publish_failed(msg: impl Into<String>) -> Self {
        Self::PublishFailed(msg.into())
    }

    pub fn invalid_envelope(msg: impl Into<String>) -> Self {
        Self::InvalidEnvelope(msg.into())
    }
}
