//! Gemini error types.

use thiserror::Error;

/// Result type for Gemini operations.
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Errors that can occur during Gemini operations.
///
/// `RequestFailed` and `MalformedResponse` are kept distinct because the
/// age-evaluation processor records the error text in its failure rows and
/// the two read very differently in the warehouse.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Failed to configure Gemini client: {0}")]
    ConfigError(String),

    #[error("Gemini API request failed: {0}")]
    RequestFailed(String),

    #[error("Gemini returned an unparsable response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Auth(#[from] vet_gcp::AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl GeminiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }
}
