//! The pipeline's function entrypoints as one axum service.
//!
//! Each route corresponds to one deployed function of the pipeline: two
//! Pub/Sub-pushed thumbnail stages, the standalone cropout generator, and
//! the HTTP-triggered age-evaluation dispatcher with its pushed processor.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sheets;
pub mod state;

#[cfg(test)]
mod handler_tests;

pub use config::AppConfig;
pub use error::{FunctionError, FunctionResult};
pub use routes::create_router;
pub use sheets::{EvaluationSheetConfig, SheetsClient};
pub use state::AppState;
