//! Shared data models for the Video Exclusion Toolbox pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Trigger payloads carried on the message bus
//! - Annotation, cropout and age-evaluation warehouse records
//! - Bounding-box coordinates with the "no spatial extent" sentinel

pub mod annotation;
pub mod cropout;
pub mod evaluation;
pub mod message;
pub mod timestamp;
pub mod video;

// Re-export common types
pub use annotation::{AnnotationRecord, Coord};
pub use cropout::CropoutRecord;
pub use evaluation::{AgeEvaluationRecord, NO_MODEL_ID};
pub use message::{
    AgeDispatchRequest, BatchMessage, BatchVideo, CropoutObject, CropoutTrigger, DispatchTrigger,
    ProcessTrigger,
};
pub use timestamp::warehouse_timestamp;
pub use video::VideoId;
