//! Cropout metadata records written to the `YouTubeThumbnailCropouts` table.

use serde::{Deserialize, Serialize};

/// Metadata for one cropped-out image region stored in the object store.
///
/// The blob itself is owned by the object store; this record is written only
/// after the blob upload has succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropoutRecord {
    pub video_id: String,
    pub thumbnail_url: String,
    pub label: String,
    pub confidence: f64,
    pub file_name: String,
    pub gs_file_path: String,
    pub fuse_file_path: String,
    pub datetime_updated: String,
}
