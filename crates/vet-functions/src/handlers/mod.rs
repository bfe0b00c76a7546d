//! Request handlers, one module per pipeline stage.

pub mod age;
pub mod cropouts;
pub mod thumbnails;

use axum::Json;
use serde_json::{json, Value};

pub use age::{dispatch_age_evaluation, process_age_evaluation};
pub use cropouts::generate_cropouts;
pub use thumbnails::{dispatch_thumbnails, process_thumbnails};

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
