//! BigQuery REST API client and the dedup gate.
//!
//! The warehouse is the pipeline's only shared mutable state. All writes are
//! append-only row inserts; reads are anti-join queries that decide what
//! still needs processing.

pub mod client;
pub mod error;
pub mod gate;
pub mod retry;


pub use client::{BigQueryClient, BigQueryConfig, InsertRowError, TableRef};
pub use error::{BigQueryError, BigQueryResult};
pub use gate::ProcessingGate;
pub use retry::RetryConfig;
