//! Cloud Storage JSON API client.
//!
//! Cropped thumbnail images are uploaded here before their records are
//! written to the warehouse, so a record never points at a blob that does
//! not exist.

pub mod client;
pub mod error;
pub mod paths;

pub use client::{StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use paths::{fuse_path, gs_uri};
