//! Service configuration.
//!
//! Table names for the thumbnail pipeline are fixed; the age-evaluation
//! pipeline reads its dataset and table names from the environment because
//! deployments point it at different report tables.

use vet_bigquery::TableRef;

use crate::error::{FunctionError, FunctionResult};

/// Report table the dispatcher reads video IDs from.
pub const SOURCE_TABLE: &str = "GoogleAdsReportVideo";
/// Table annotation records are appended to.
pub const ANNOTATIONS_TABLE: &str = "YouTubeThumbnailsWithAnnotations";
/// Table cropout metadata records are appended to.
pub const CROPOUTS_TABLE: &str = "YouTubeThumbnailCropouts";

/// Labels whose detections get cropped out and stored.
pub const CROP_LABELS: &[&str] = &["Face", "Person"];

const DEFAULT_BATCH_SIZE: usize = 5;

/// Configuration for the function service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    /// GCP project owning the warehouse, topics and buckets.
    pub project_id: String,
    /// Dataset holding the thumbnail pipeline tables.
    pub dataset: String,

    /// Topic the dispatcher fans per-video triggers out to.
    pub processing_topic: String,
    /// Whether the process stage crops and stores allow-listed detections.
    pub crop_and_store: bool,
    /// Bucket the cropout blobs land in. Required when cropping is on.
    pub crop_bucket: String,
    /// Optional follow-on topic: when set (and inline cropping is off) the
    /// process stage hands cropout work to the standalone cropout function.
    pub cropout_topic: Option<String>,

    /// Topic the age-evaluation dispatcher publishes batches to.
    pub age_topic: String,
    pub age_source_dataset: String,
    pub age_target_dataset: String,
    pub age_source_table: String,
    pub age_target_table: String,
    /// Videos per age-evaluation batch message.
    pub batch_size: usize,
}

fn require_env(name: &str) -> FunctionResult<String> {
    std::env::var(name).map_err(|_| FunctionError::config(format!("{name} must be set")))
}

fn env_bool(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "t"))
        .unwrap_or(false)
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FunctionResult<Self> {
        let project_id = require_env("GOOGLE_CLOUD_PROJECT")?;
        let dataset = require_env("VID_EXCL_BIGQUERY_DATASET")?;

        let crop_and_store = env_bool("VID_EXCL_CROP_AND_STORE_OBJECTS");
        let crop_bucket = std::env::var("VID_EXCL_THUMBNAIL_CROP_BUCKET").unwrap_or_default();
        if crop_and_store && crop_bucket.is_empty() {
            return Err(FunctionError::config(
                "VID_EXCL_THUMBNAIL_CROP_BUCKET must be set when \
                 VID_EXCL_CROP_AND_STORE_OBJECTS is enabled",
            ));
        }

        let age_source_dataset =
            std::env::var("VET_BIGQUERY_SOURCE_DATASET").unwrap_or_else(|_| dataset.clone());
        let age_target_dataset =
            std::env::var("VET_BIGQUERY_TARGET_DATASET").unwrap_or_else(|_| dataset.clone());
        let age_source_table = std::env::var("VET_BIGQUERY_SOURCE_TABLE")
            .unwrap_or_else(|_| SOURCE_TABLE.to_string());
        let age_target_table = require_env("VET_BIGQUERY_TARGET_TABLE")?;

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            project_id,
            dataset,
            processing_topic: require_env("VID_EXCL_THUMBNAIL_PROCESSING_TOPIC")?,
            crop_and_store,
            crop_bucket,
            cropout_topic: std::env::var("VID_EXCL_THUMBNAIL_CROPOUTS_TOPIC").ok(),
            age_topic: require_env("VET_THUMBNAIL_AGE_EVALUATION_TOPIC")?,
            age_source_dataset,
            age_target_dataset,
            age_source_table,
            age_target_table,
            batch_size: std::env::var("VET_AGE_EVALUATION_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
        })
    }

    pub fn source_table(&self) -> TableRef {
        TableRef::new(&self.project_id, &self.dataset, SOURCE_TABLE)
    }

    pub fn annotations_table(&self) -> TableRef {
        TableRef::new(&self.project_id, &self.dataset, ANNOTATIONS_TABLE)
    }

    pub fn cropouts_table(&self) -> TableRef {
        TableRef::new(&self.project_id, &self.dataset, CROPOUTS_TABLE)
    }

    pub fn age_source_table(&self) -> TableRef {
        TableRef::new(
            &self.project_id,
            &self.age_source_dataset,
            &self.age_source_table,
        )
    }

    pub fn age_target_table(&self) -> TableRef {
        TableRef::new(
            &self.project_id,
            &self.age_target_dataset,
            &self.age_target_table,
        )
    }

    /// True when a detection with this label should be cropped out.
    pub fn is_crop_label(&self, label: &str) -> bool {
        CROP_LABELS.contains(&label)
    }
}
