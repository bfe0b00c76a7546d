//! Cloud Vision API client and annotation extraction.
//!
//! One `images:annotate` call per thumbnail asks for faces, localized
//! objects and scene labels together; the extraction step flattens all
//! three into warehouse annotation records with coordinates normalized to
//! the 0..1 range.

pub mod client;
pub mod error;
pub mod extract;

pub use client::{AnnotateImageResponse, VisionClient, VisionConfig};
pub use error::{VisionError, VisionResult};
pub use extract::extract_annotations;
