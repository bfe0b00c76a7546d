//! Age-evaluation dispatch and batch processing.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use vet_models::{
    warehouse_timestamp, AgeDispatchRequest, AgeEvaluationRecord, BatchMessage, BatchVideo,
};
use vet_pubsub::PushEnvelope;

use crate::error::{FunctionError, FunctionResult};
use crate::state::AppState;

/// Select unevaluated videos and fan them out as prompt-carrying batches.
pub async fn dispatch_age_evaluation(
    State(state): State<AppState>,
    payload: Result<Json<AgeDispatchRequest>, JsonRejection>,
) -> FunctionResult<Json<Value>> {
    let Json(request) = payload.map_err(|e| FunctionError::bad_request(e.to_string()))?;
    let limit: u32 = request
        .processing_limit
        .parse()
        .map_err(|_| FunctionError::bad_request("processing_limit must be a positive integer"))?;

    let sheet = state.sheets.evaluation_config(&request.sheet_id).await?;
    if !sheet.age_evaluation_enabled() {
        warn!(
            "Age evaluation is turned off in the configuration sheet; \
             set use_gemini_to_evaluate_age to \"Enabled\" to activate it"
        );
        return Ok(Json(json!({
            "status": "Skipped",
            "reason": "age evaluation disabled in configuration sheet",
        })));
    }

    let pending = state
        .gate
        .pending_limited(
            &state.config.age_source_table(),
            &state.config.age_target_table(),
            limit,
        )
        .await?;
    info!("Found {} videos awaiting age evaluation", pending.len());

    if pending.is_empty() {
        return Ok(Json(json!({ "status": "OK", "batches_published": 0 })));
    }

    let videos: Vec<BatchVideo> = pending
        .into_iter()
        .map(|video_id| BatchVideo { video_id })
        .collect();
    let batches = BatchMessage::chunked(
        &sheet.system_instruction,
        &sheet.prompt,
        videos,
        state.config.batch_size,
    );

    let published = state
        .publisher
        .publish_all(&state.config.age_topic, batches)
        .await?;

    Ok(Json(json!({ "status": "OK", "batches_published": published })))
}

/// Evaluate one batch: per video, per resolvable thumbnail, one model call.
///
/// Failures are recorded as warehouse rows, not surfaced as errors: a video
/// with no thumbnails gets a single failure row, a thumbnail whose model
/// call or answer cannot be used gets one failure row with the error text.
/// The batch always runs to completion.
pub async fn process_age_evaluation(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> FunctionResult<Json<Value>> {
    let batch: BatchMessage = envelope
        .decode_json()
        .map_err(|e| FunctionError::bad_request(e.to_string()))?;
    info!(
        "Processing age-evaluation batch {} (part {}/{}) with {} videos",
        batch.batch_id,
        batch.batch_part,
        batch.total_batch_parts,
        batch.videos.len()
    );

    let target = state.config.age_target_table();
    let model_id = state.gemini.model_id().to_string();
    let mut written = 0usize;

    for video in &batch.videos {
        let video_id = &video.video_id;
        let urls = state.thumbnails.probe_urls(video_id).await;

        if urls.is_empty() {
            let row = AgeEvaluationRecord::no_thumbnails(video_id.as_str(), warehouse_timestamp());
            state
                .bigquery
                .insert_rows(&target, std::slice::from_ref(&row))
                .await?;
            written += 1;
            continue;
        }

        for url in urls {
            let now = warehouse_timestamp();
            let rows = match state
                .gemini
                .evaluate_ages(&url, &batch.system_instruction, &batch.prompt)
                .await
            {
                Ok(people) => people
                    .into_iter()
                    .map(|person| {
                        AgeEvaluationRecord::evaluated(
                            video_id.as_str(),
                            &url,
                            &model_id,
                            person.evaluated_description,
                            person.evaluated_age,
                            now.clone(),
                        )
                    })
                    .collect::<Vec<_>>(),
                Err(e) => {
                    warn!("Failed to evaluate thumbnail {} of video {}: {}", url, video_id, e);
                    vec![AgeEvaluationRecord::evaluation_failed(
                        video_id.as_str(),
                        &url,
                        format!("Failed to evaluate thumbnail: {e}"),
                        now,
                    )]
                }
            };

            state.bigquery.insert_rows(&target, &rows).await?;
            written += rows.len();
        }
    }

    Ok(Json(json!({ "status": "OK", "rows_written": written })))
}
