//! Thumbnail dispatch and per-video annotation processing.

use axum::extract::State;
use axum::Json;
use image::DynamicImage;
use serde_json::{json, Value};
use tracing::{info, warn};

use vet_media::{cropout_file_name, cropout_from_image, encode_jpeg};
use vet_models::{
    warehouse_timestamp, AnnotationRecord, CropoutObject, CropoutRecord, CropoutTrigger,
    DispatchTrigger, ProcessTrigger, VideoId,
};
use vet_pubsub::PushEnvelope;
use vet_storage::{fuse_path, gs_uri};
use vet_vision::extract_annotations;

use crate::error::{FunctionError, FunctionResult};
use crate::state::AppState;

/// Fan out one processing trigger per unprocessed video in the partition.
pub async fn dispatch_thumbnails(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> FunctionResult<Json<Value>> {
    let trigger: DispatchTrigger = envelope
        .decode_json()
        .map_err(|e| FunctionError::bad_request(e.to_string()))?;
    info!(
        "Dispatching thumbnail processing for partition {}",
        trigger.date_partition
    );

    let pending = state
        .gate
        .pending_in_partition(
            &state.config.source_table(),
            &state.config.annotations_table(),
            &trigger.date_partition,
        )
        .await?;

    if pending.is_empty() {
        info!("No unprocessed videos in partition {}", trigger.date_partition);
        return Ok(Json(json!({ "status": "OK", "published": 0 })));
    }

    let triggers: Vec<ProcessTrigger> = pending
        .into_iter()
        .map(|video_id| ProcessTrigger { video_id })
        .collect();
    let published = state
        .publisher
        .publish_all(&state.config.processing_topic, triggers)
        .await?;

    Ok(Json(json!({ "status": "OK", "published": published })))
}

/// Annotate every resolvable thumbnail of one video and record the results.
pub async fn process_thumbnails(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> FunctionResult<Json<Value>> {
    let trigger: ProcessTrigger = envelope
        .decode_json()
        .map_err(|e| FunctionError::bad_request(e.to_string()))?;
    let video_id = trigger.video_id;
    info!("Processing thumbnails for video {}", video_id);

    let annotations_table = state.config.annotations_table();
    if state
        .gate
        .video_already_processed(&annotations_table, &video_id)
        .await?
    {
        info!("Video {} already has annotations, skipping", video_id);
        return Ok(Json(json!({ "status": "OK", "skipped": true })));
    }

    let thumbnails = state.thumbnails.resolve(&video_id).await;
    if thumbnails.is_empty() {
        return Ok(Json(json!({ "status": "OK", "annotations": 0 })));
    }

    let mut annotation_records = Vec::new();
    let mut cropout_records = Vec::new();
    let mut handoff_objects = Vec::new();

    for thumbnail in &thumbnails {
        let bytes = match encode_jpeg(&thumbnail.image) {
            Ok(b) => b,
            Err(e) => {
                warn!("Could not re-encode thumbnail {}: {}", thumbnail.url, e);
                continue;
            }
        };

        // One bad thumbnail must not sink the rest of the video.
        let response = match state.vision.annotate_image(&bytes).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to annotate thumbnail {}: {}", thumbnail.url, e);
                continue;
            }
        };

        let annotations = extract_annotations(
            &video_id,
            &thumbnail.url,
            &response,
            thumbnail.image.width(),
            thumbnail.image.height(),
        );

        for record in &annotations {
            let Some(bbox) = bounding_box(record) else {
                continue;
            };
            if !state.config.is_crop_label(&record.label) {
                continue;
            }

            if state.config.crop_and_store {
                match store_cropout(&state, &video_id, &thumbnail.image, record, bbox).await {
                    Ok(row) => cropout_records.push(row),
                    Err(e) => {
                        warn!("Skipping cropout of {} on {}: {}", record.label, thumbnail.url, e)
                    }
                }
            } else if state.config.cropout_topic.is_some() {
                handoff_objects.push(cropout_object(record, bbox));
            }
        }

        annotation_records.extend(annotations);
    }

    state
        .bigquery
        .insert_rows(&annotations_table, &annotation_records)
        .await?;
    if !cropout_records.is_empty() {
        state
            .bigquery
            .insert_rows(&state.config.cropouts_table(), &cropout_records)
            .await?;
    }

    if let (Some(topic), false) = (&state.config.cropout_topic, handoff_objects.is_empty()) {
        let trigger = CropoutTrigger {
            video_id: video_id.clone(),
            objects: handoff_objects,
        };
        state.publisher.publish_json(topic, &trigger).await?;
    }

    Ok(Json(json!({
        "status": "OK",
        "annotations": annotation_records.len(),
        "cropouts": cropout_records.len(),
    })))
}

fn bounding_box(record: &AnnotationRecord) -> Option<(f64, f64, f64, f64)> {
    Some((
        record.top_left_x.as_f64()?,
        record.top_left_y.as_f64()?,
        record.bottom_right_x.as_f64()?,
        record.bottom_right_y.as_f64()?,
    ))
}

fn cropout_object(record: &AnnotationRecord, bbox: (f64, f64, f64, f64)) -> CropoutObject {
    CropoutObject {
        thumbnail_url: record.thumbnail_url.clone(),
        label: record.label.clone(),
        confidence: record.confidence,
        top_left_x: bbox.0,
        top_left_y: bbox.1,
        bottom_right_x: bbox.2,
        bottom_right_y: bbox.3,
    }
}

/// Crop one detection, upload the blob, and only then build its record.
async fn store_cropout(
    state: &AppState,
    video_id: &VideoId,
    image: &DynamicImage,
    record: &AnnotationRecord,
    bbox: (f64, f64, f64, f64),
) -> FunctionResult<CropoutRecord> {
    let crop = cropout_from_image(image, bbox.0, bbox.1, bbox.2, bbox.3);
    let jpeg = encode_jpeg(&crop)?;

    let file_name = cropout_file_name(&record.thumbnail_url, &record.label);
    let object = format!("{video_id}/{file_name}");
    let bucket = &state.config.crop_bucket;
    state.storage.upload_image(bucket, &object, jpeg).await?;

    Ok(CropoutRecord {
        video_id: video_id.as_str().to_string(),
        thumbnail_url: record.thumbnail_url.clone(),
        label: record.label.clone(),
        confidence: record.confidence,
        file_name,
        gs_file_path: gs_uri(bucket, &object),
        fuse_file_path: fuse_path(bucket, &object),
        datetime_updated: warehouse_timestamp(),
    })
}
