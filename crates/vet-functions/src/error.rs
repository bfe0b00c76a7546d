//! Function-level error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type FunctionResult<T> = Result<T, FunctionError>;

/// Errors surfaced by the function handlers.
///
/// `BadRequest` maps to HTTP 400 so Pub/Sub drops undecodable deliveries
/// instead of redelivering them forever; everything else maps to 500, which
/// makes the push subscription retry.
#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sheet read failed: {0}")]
    SheetRead(String),

    #[error("BigQuery error: {0}")]
    BigQuery(#[from] vet_bigquery::BigQueryError),

    #[error("Storage error: {0}")]
    Storage(#[from] vet_storage::StorageError),

    #[error("Pub/Sub error: {0}")]
    PubSub(#[from] vet_pubsub::PubSubError),

    #[error("Vision error: {0}")]
    Vision(#[from] vet_vision::VisionError),

    #[error("Gemini error: {0}")]
    Gemini(#[from] vet_gemini::GeminiError),

    #[error("Media error: {0}")]
    Media(#[from] vet_media::MediaError),

    #[error(transparent)]
    Auth(#[from] vet_gcp::AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FunctionError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn sheet_read(msg: impl Into<String>) -> Self {
        Self::SheetRead(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            FunctionError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    detail: String,
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            status: "Failed",
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_maps_to_400() {
        assert_eq!(
            FunctionError::bad_request("no").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_backend_errors_map_to_500() {
        let err = FunctionError::from(vet_bigquery::BigQueryError::request_failed("boom"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = FunctionError::sheet_read("range missing");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
