//! Age-evaluation records written to the configured evaluation table.

use serde::{Deserialize, Serialize};

/// Model ID recorded on failure rows where no model produced output.
pub const NO_MODEL_ID: &str = "NONE";

/// One age-evaluation result (or failure) for a thumbnail.
///
/// Failure rows are first-class, queryable records: they carry a descriptive
/// message instead of an age, and `evaluation_model_id` is [`NO_MODEL_ID`]
/// when no model was ever invoked (e.g. no resolvable thumbnail).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeEvaluationRecord {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub datetime_updated: String,
    pub evaluation_model_id: String,
    pub evaluated_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_age: Option<i64>,
}

impl AgeEvaluationRecord {
    /// Successful evaluation of one detected person.
    pub fn evaluated(
        video_id: impl Into<String>,
        thumbnail_url: impl Into<String>,
        model_id: impl Into<String>,
        description: impl Into<String>,
        age: i64,
        datetime_updated: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            thumbnail_url: Some(thumbnail_url.into()),
            datetime_updated: datetime_updated.into(),
            evaluation_model_id: model_id.into(),
            evaluated_description: description.into(),
            evaluated_age: Some(age),
        }
    }

    /// Failure row for a video with no resolvable thumbnails.
    pub fn no_thumbnails(video_id: impl Into<String>, datetime_updated: impl Into<String>) -> Self {
        let video_id = video_id.into();
        let description = format!("No usable thumbnails found for video {video_id}.");
        Self {
            video_id,
            thumbnail_url: None,
            datetime_updated: datetime_updated.into(),
            evaluation_model_id: NO_MODEL_ID.to_string(),
            evaluated_description: description,
            evaluated_age: None,
        }
    }

    /// Failure row for a thumbnail whose evaluation failed.
    pub fn evaluation_failed(
        video_id: impl Into<String>,
        thumbnail_url: impl Into<String>,
        description: impl Into<String>,
        datetime_updated: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            thumbnail_url: Some(thumbnail_url.into()),
            datetime_updated: datetime_updated.into(),
            evaluation_model_id: NO_MODEL_ID.to_string(),
            evaluated_description: description.into(),
            evaluated_age: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.evaluated_age.is_none()
    }
}
