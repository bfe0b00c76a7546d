//! Service routes.

use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    dispatch_age_evaluation, dispatch_thumbnails, generate_cropouts, health,
    process_age_evaluation, process_thumbnails,
};
use crate::state::AppState;

/// Push deliveries carry base64 payloads only; 1 MiB is generous.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Create the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/thumbnails/dispatch", post(dispatch_thumbnails))
        .route("/thumbnails/process", post(process_thumbnails))
        .route("/thumbnails/cropouts", post(generate_cropouts))
        .route("/age-evaluation/dispatch", post(dispatch_age_evaluation))
        .route("/age-evaluation/process", post(process_age_evaluation))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
