//! Vision error types.

use thiserror::Error;

/// Result type for Vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur during Vision operations.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Failed to configure Vision client: {0}")]
    ConfigError(String),

    #[error("Annotation request failed: {0}")]
    RequestFailed(String),

    #[error("Annotation rejected by the API: {0}")]
    AnnotationError(String),

    #[error(transparent)]
    Auth(#[from] vet_gcp::AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VisionError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn annotation_error(msg: impl Into<String>) -> Self {
        Self::AnnotationError(msg.into())
    }
}
