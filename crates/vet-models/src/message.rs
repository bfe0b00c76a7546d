//! Trigger payloads carried on the message bus and the HTTP surface.
//!
//! Decoding is strict: a payload missing a required field fails the
//! invocation closed before any processing happens.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::video::VideoId;

/// Trigger for the thumbnail dispatcher: one day partition of the source
/// report table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchTrigger {
    pub date_partition: String,
}

/// Trigger for per-video thumbnail processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessTrigger {
    pub video_id: VideoId,
}

/// One object to crop out of a thumbnail, as carried on the bus.
///
/// Coordinates may be relative [0,1] or absolute pixels depending on the
/// annotation source; the cropout generator resolves the unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropoutObject {
    pub thumbnail_url: String,
    pub label: String,
    #[serde(default)]
    pub confidence: f64,
    pub top_left_x: f64,
    pub top_left_y: f64,
    pub bottom_right_x: f64,
    pub bottom_right_y: f64,
}

/// Trigger for cropout generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropoutTrigger {
    pub video_id: VideoId,
    pub objects: Vec<CropoutObject>,
}

/// HTTP request starting an age-evaluation dispatch.
///
/// `processing_limit` is a string on the wire for compatibility with the
/// scheduler that issues it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeDispatchRequest {
    pub processing_limit: String,
    pub sheet_id: String,
}

/// One video reference inside a [`BatchMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchVideo {
    pub video_id: VideoId,
}

/// One batch of videos dispatched for age evaluation.
///
/// `batch_part` and `total_batch_parts` are 1-based and stringly typed on
/// the wire. `videos` never exceeds the dispatcher's configured batch size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMessage {
    pub system_instruction: String,
    pub prompt: String,
    pub batch_id: String,
    pub batch_part: String,
    pub total_batch_parts: String,
    pub videos: Vec<BatchVideo>,
}

impl BatchMessage {
    /// Partition `videos` into consecutive chunks of at most `batch_size`,
    /// preserving order. The final chunk may be shorter.
    pub fn chunked(
        system_instruction: &str,
        prompt: &str,
        videos: Vec<BatchVideo>,
        batch_size: usize,
    ) -> Vec<BatchMessage> {
        assert!(batch_size > 0, "batch_size must be positive");

        let total_parts = videos.len().div_ceil(batch_size);
        let batch_id = Uuid::new_v4().to_string();

        videos
            .chunks(batch_size)
            .enumerate()
            .map(|(i, chunk)| BatchMessage {
                system_instruction: system_instruction.to_string(),
                prompt: prompt.to_string(),
                batch_id: batch_id.clone(),
                batch_part: (i + 1).to_string(),
                total_batch_parts: total_parts.to_string(),
                videos: chunk.to_vec(),
            })
            .collect()
    }
}
