//! Route-level tests with every GCP backend mocked behind one wiremock
//! server (the APIs have disjoint path prefixes).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vet_bigquery::{BigQueryClient, BigQueryConfig, ProcessingGate, RetryConfig};
use vet_gemini::{GeminiClient, GeminiConfig};
use vet_media::{HttpThumbnailFetcher, ThumbnailResolver};
use vet_pubsub::{Publisher, PublisherConfig};
use vet_storage::{StorageClient, StorageConfig};
use vet_vision::{VisionClient, VisionConfig};

use crate::config::AppConfig;
use crate::routes::create_router;
use crate::sheets::SheetsClient;
use crate::state::AppState;

// ==== Test fixtures ====

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        project_id: "test-project".to_string(),
        dataset: "video_exclusion".to_string(),
        processing_topic: "thumbnail-processing".to_string(),
        crop_and_store: false,
        crop_bucket: "crop-bucket".to_string(),
        cropout_topic: None,
        age_topic: "age-evaluation".to_string(),
        age_source_dataset: "video_exclusion".to_string(),
        age_target_dataset: "video_exclusion".to_string(),
        age_source_table: "GoogleAdsReportVideo".to_string(),
        age_target_table: "AgeEvaluations".to_string(),
        batch_size: 5,
    }
}

fn test_state(server: &MockServer) -> AppState {
    let base = server.uri();

    let bigquery = BigQueryClient::with_static_token(
        BigQueryConfig {
            project_id: "test-project".to_string(),
            api_base_url: base.clone(),
            timeout: Duration::from_secs(5),
            retry: RetryConfig {
                max_retries: 0,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
        },
        "test-token",
    )
    .unwrap();

    let fetcher = HttpThumbnailFetcher::new();

    AppState {
        config: Arc::new(test_config()),
        gate: ProcessingGate::new(bigquery.clone()),
        bigquery,
        storage: StorageClient::with_static_token(
            StorageConfig {
                api_base_url: base.clone(),
                timeout: Duration::from_secs(5),
            },
            "test-token",
        )
        .unwrap(),
        publisher: Publisher::with_static_token(
            PublisherConfig {
                project_id: "test-project".to_string(),
                api_base_url: base.clone(),
                timeout: Duration::from_secs(5),
            },
            "test-token",
        )
        .unwrap(),
        vision: VisionClient::with_static_token(
            VisionConfig {
                api_base_url: base.clone(),
                timeout: Duration::from_secs(5),
                max_results: 50,
            },
            "test-token",
        )
        .unwrap(),
        gemini: GeminiClient::with_static_token(
            GeminiConfig {
                project_id: "test-project".to_string(),
                location: "us-central1".to_string(),
                model: "gemini-1.5-flash".to_string(),
                api_base_url: base.clone(),
                timeout: Duration::from_secs(5),
            },
            "test-token",
        )
        .unwrap(),
        sheets: SheetsClient::with_static_token(base.clone(), "test-token").unwrap(),
        thumbnails: Arc::new(ThumbnailResolver::with_base_url(fetcher.clone(), base)),
        fetcher,
    }
}

fn push_body(payload: &Value) -> Value {
    json!({
        "message": {
            "data": BASE64.encode(payload.to_string()),
            "messageId": "1"
        },
        "subscription": "projects/test-project/subscriptions/test"
    })
}

async fn post_json(server: &MockServer, route: &str, body: Value) -> (StatusCode, Value) {
    let app = create_router(test_state(server));
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(route)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn query_result(ids: &[&str]) -> Value {
    json!({
        "jobComplete": true,
        "schema": { "fields": [ { "name": "video_id" } ] },
        "rows": ids.iter().map(|id| json!({ "f": [ { "v": id } ] })).collect::<Vec<_>>()
    })
}

async fn mount_sheet_range(server: &MockServer, range: &str, values: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/sheet-1/values/{range}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": values })))
        .mount(server)
        .await;
}

async fn mount_sheet_config(server: &MockServer, switch_value: &str) {
    mount_sheet_range(server, "thumbnail_age_system_instruction", json!([["sys"]])).await;
    mount_sheet_range(server, "thumbnail_age_evaluation_prompt", json!([["prompt"]])).await;
    mount_sheet_range(
        server,
        "configuration",
        json!([["use_gemini_to_evaluate_age", switch_value]]),
    )
    .await;
}

// ==== Thumbnail dispatch ====

#[tokio::test]
async fn test_dispatch_publishes_one_trigger_per_pending_video() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_result(&["vid1", "vid2"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/projects/test-project/topics/thumbnail-processing:publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageIds": ["1"] })))
        .expect(2)
        .mount(&server)
        .await;

    let (status, body) = post_json(
        &server,
        "/thumbnails/dispatch",
        push_body(&json!({ "date_partition": "2024-05-01" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["published"], 2);
}

#[tokio::test]
async fn test_dispatch_with_nothing_pending_publishes_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/test-project/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_result(&[])))
        .mount(&server)
        .await;

    let (status, body) = post_json(
        &server,
        "/thumbnails/dispatch",
        push_body(&json!({ "date_partition": "2024-05-01" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["published"], 0);
    // Only the query hit the backend.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_dispatch_rejects_malformed_payload() {
    let server = MockServer::start().await;

    // Valid envelope, wrong payload shape.
    let (status, body) = post_json(
        &server,
        "/thumbnails/dispatch",
        push_body(&json!({ "wrong_field": true })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "Failed");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dispatch_rejects_bad_base64() {
    let server = MockServer::start().await;

    let (status, _) = post_json(
        &server,
        "/thumbnails/dispatch",
        json!({ "message": { "data": "!!not base64!!" } }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ==== Thumbnail process ====

#[tokio::test]
async fn test_process_skips_already_processed_video() {
    let server = MockServer::start().await;

    // Existence check comes back non-empty.
    Mock::given(method("POST"))
        .and(path("/projects/test-project/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_result(&["vid1"])))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = post_json(
        &server,
        "/thumbnails/process",
        push_body(&json!({ "video_id": "vid1" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skipped"], true);
}

// ==== Age-evaluation dispatch ====

#[tokio::test]
async fn test_age_dispatch_batches_and_publishes() {
    let server = MockServer::start().await;
    mount_sheet_config(&server, "Enabled").await;

    // 7 pending videos with batch size 5 means 2 batches.
    let ids: Vec<String> = (0..7).map(|i| format!("vid{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    Mock::given(method("POST"))
        .and(path("/projects/test-project/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_result(&id_refs)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/projects/test-project/topics/age-evaluation:publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageIds": ["1"] })))
        .expect(2)
        .mount(&server)
        .await;

    let (status, body) = post_json(
        &server,
        "/age-evaluation/dispatch",
        json!({ "processing_limit": "100", "sheet_id": "sheet-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["batches_published"], 2);
}

#[tokio::test]
async fn test_age_dispatch_kill_switch_short_circuits() {
    let server = MockServer::start().await;
    mount_sheet_config(&server, "Disabled").await;

    let (status, body) = post_json(
        &server,
        "/age-evaluation/dispatch",
        json!({ "processing_limit": "100", "sheet_id": "sheet-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Skipped");

    // Only the three sheet ranges were read; no query, no publish.
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_age_dispatch_validation_failure_is_400() {
    let server = MockServer::start().await;

    let (status, body) = post_json(
        &server,
        "/age-evaluation/dispatch",
        json!({ "sheet_id": "sheet-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "Failed");

    let (status, body) = post_json(
        &server,
        "/age-evaluation/dispatch",
        json!({ "processing_limit": "lots", "sheet_id": "sheet-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "Failed");
}

// ==== Cropouts ====

#[tokio::test]
async fn test_cropouts_empty_object_list_writes_nothing() {
    let server = MockServer::start().await;

    let (status, body) = post_json(
        &server,
        "/thumbnails/cropouts",
        push_body(&json!({ "video_id": "vid1", "objects": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cropouts"], 0);
    // Empty insert is a no-op; nothing hit the backend.
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ==== Age-evaluation process ====

fn batch_body(videos: &[&str]) -> Value {
    json!({
        "system_instruction": "sys",
        "prompt": "p",
        "batch_id": "b-1",
        "batch_part": "1",
        "total_batch_parts": "1",
        "videos": videos.iter().map(|id| json!({ "video_id": id })).collect::<Vec<_>>()
    })
}

const AGE_INSERT_PATH: &str =
    "/projects/test-project/datasets/video_exclusion/tables/AgeEvaluations/insertAll";

#[tokio::test]
async fn test_age_process_empty_batch() {
    let server = MockServer::start().await;

    let (status, body) =
        post_json(&server, "/age-evaluation/process", push_body(&batch_body(&[]))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_written"], 0);
}

#[tokio::test]
async fn test_age_process_no_thumbnails_writes_one_failure_row() {
    let server = MockServer::start().await;

    // Every thumbnail probe misses (unmatched HEADs 404); the video still
    // gets exactly one row, the model-less failure marker.
    Mock::given(method("POST"))
        .and(path(AGE_INSERT_PATH))
        .and(body_partial_json(json!({
            "rows": [ { "json": { "video_id": "vid1", "evaluation_model_id": "NONE" } } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) =
        post_json(&server, "/age-evaluation/process", push_body(&batch_body(&["vid1"]))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_written"], 1);
}

#[tokio::test]
async fn test_age_process_fans_out_one_row_per_person() {
    let server = MockServer::start().await;

    // One resolvable thumbnail.
    Mock::given(method("HEAD"))
        .and(path("/vid1/maxresdefault.jpg"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/jpeg"))
        .mount(&server)
        .await;

    // The model sees two people on it.
    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/test-project/locations/us-central1/publishers/google/models/gemini-1.5-flash:generateContent",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text":
                r#"{"items":[{"evaluated_description":"adult","evaluated_age":35},{"evaluated_description":"child","evaluated_age":9}]}"#
            }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(AGE_INSERT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) =
        post_json(&server, "/age-evaluation/process", push_body(&batch_body(&["vid1"]))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows_written"], 2);

    // Both rows share the thumbnail URL, timestamp and model ID.
    let requests = server.received_requests().await.unwrap();
    let insert = requests
        .iter()
        .find(|r| r.url.path() == AGE_INSERT_PATH)
        .unwrap();
    let insert_body: Value = serde_json::from_slice(&insert.body).unwrap();
    let rows = insert_body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let (a, b) = (&rows[0]["json"], &rows[1]["json"]);
    assert_eq!(a["thumbnail_url"], b["thumbnail_url"]);
    assert_eq!(a["thumbnail_url"].as_str().unwrap(), format!("{}/vid1/maxresdefault.jpg", server.uri()));
    assert_eq!(a["datetime_updated"], b["datetime_updated"]);
    assert_eq!(a["evaluation_model_id"], "gemini-1.5-flash");
    assert_eq!(a["evaluated_age"], 35);
    assert_eq!(b["evaluated_age"], 9);
}

// ==== Health ====

#[tokio::test]
async fn test_health_route() {
    let server = MockServer::start().await;
    let app = create_router(test_state(&server));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
