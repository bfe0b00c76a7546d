//! Standalone cropout generation from bus-delivered object lists.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use vet_media::{cropout_file_name, cropout_from_image, encode_jpeg};
use vet_models::{warehouse_timestamp, CropoutObject, CropoutRecord, CropoutTrigger};
use vet_pubsub::PushEnvelope;
use vet_storage::{fuse_path, gs_uri};

use crate::error::{FunctionError, FunctionResult};
use crate::state::AppState;

/// Crop every listed object out of its thumbnail and store blob + record.
///
/// Objects are grouped by thumbnail URL so each image is fetched exactly
/// once however many detections it carries.
pub async fn generate_cropouts(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> FunctionResult<Json<Value>> {
    let trigger: CropoutTrigger = envelope
        .decode_json()
        .map_err(|e| FunctionError::bad_request(e.to_string()))?;
    info!(
        "Generating {} cropouts for video {}",
        trigger.objects.len(),
        trigger.video_id
    );

    let bucket = &state.config.crop_bucket;
    if bucket.is_empty() {
        return Err(FunctionError::config(
            "VID_EXCL_THUMBNAIL_CROP_BUCKET must be set",
        ));
    }

    let mut records = Vec::new();

    for (url, objects) in group_by_url(&trigger.objects) {
        let Some(bytes) = state.fetcher.fetch_url(url).await else {
            warn!("Thumbnail {} is gone, skipping its cropouts", url);
            continue;
        };
        let image = match image::load_from_memory(&bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!("Body at {} is not a decodable image: {}", url, e);
                continue;
            }
        };

        for object in objects {
            let crop = cropout_from_image(
                &image,
                object.top_left_x,
                object.top_left_y,
                object.bottom_right_x,
                object.bottom_right_y,
            );
            let jpeg = match encode_jpeg(&crop) {
                Ok(b) => b,
                Err(e) => {
                    warn!("Could not encode cropout of {} from {}: {}", object.label, url, e);
                    continue;
                }
            };

            let file_name = cropout_file_name(&object.thumbnail_url, &object.label);
            let object_path = format!("{}/{}", trigger.video_id, file_name);

            // Blob first; an upload failure suppresses the record.
            if let Err(e) = state.storage.upload_image(bucket, &object_path, jpeg).await {
                warn!("Upload of {} failed, dropping its record: {}", object_path, e);
                continue;
            }

            records.push(CropoutRecord {
                video_id: trigger.video_id.as_str().to_string(),
                thumbnail_url: object.thumbnail_url.clone(),
                label: object.label.clone(),
                confidence: object.confidence,
                file_name,
                gs_file_path: gs_uri(bucket, &object_path),
                fuse_file_path: fuse_path(bucket, &object_path),
                datetime_updated: warehouse_timestamp(),
            });
        }
    }

    state
        .bigquery
        .insert_rows(&state.config.cropouts_table(), &records)
        .await?;

    Ok(Json(json!({ "status": "OK", "cropouts": records.len() })))
}

/// Group objects by thumbnail URL, preserving first-seen order.
fn group_by_url(objects: &[CropoutObject]) -> Vec<(&str, Vec<&CropoutObject>)> {
    let mut groups: Vec<(&str, Vec<&CropoutObject>)> = Vec::new();
    for object in objects {
        match groups
            .iter_mut()
            .find(|(url, _)| *url == object.thumbnail_url)
        {
            Some((_, members)) => members.push(object),
            None => groups.push((&object.thumbnail_url, vec![object])),
        }
    }
    groups
}
