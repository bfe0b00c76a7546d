//! Cloud Vision REST client.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use vet_gcp::TokenSource;

use crate::error::{VisionError, VisionResult};

const DEFAULT_API_BASE: &str = "https://vision.googleapis.com";

/// Vision client configuration.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// API base URL (overridable for tests).
    pub api_base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Cap on faces/objects/labels returned per feature.
    pub max_results: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            max_results: 50,
        }
    }
}

impl VisionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var("VISION_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            max_results: std::env::var("VISION_MAX_RESULTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
struct AnnotateRequest {
    requests: Vec<ImageRequest>,
}

#[derive(Serialize)]
struct ImageRequest {
    image: ImageContent,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
    #[serde(rename = "maxResults")]
    max_results: u32,
}

#[derive(Deserialize)]
struct AnnotateResponseBody {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

/// The per-image annotation results, straight off the wire.
#[derive(Debug, Default, Deserialize)]
pub struct AnnotateImageResponse {
    #[serde(rename = "faceAnnotations", default)]
    pub face_annotations: Vec<FaceAnnotation>,
    #[serde(rename = "localizedObjectAnnotations", default)]
    pub localized_object_annotations: Vec<ObjectAnnotation>,
    #[serde(rename = "labelAnnotations", default)]
    pub label_annotations: Vec<LabelAnnotation>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FaceAnnotation {
    #[serde(rename = "boundingPoly")]
    pub bounding_poly: BoundingPoly,
    #[serde(rename = "detectionConfidence", default)]
    pub detection_confidence: f64,
}

#[derive(Debug, Deserialize)]
pub struct ObjectAnnotation {
    pub name: String,
    #[serde(default)]
    pub score: f64,
    #[serde(rename = "boundingPoly")]
    pub bounding_poly: NormalizedBoundingPoly,
}

#[derive(Debug, Deserialize)]
pub struct LabelAnnotation {
    pub description: String,
    #[serde(default)]
    pub score: f64,
}

/// Polygon with absolute pixel vertices (faces).
#[derive(Debug, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Polygon with vertices already normalized to 0..1 (objects).
#[derive(Debug, Deserialize)]
pub struct NormalizedBoundingPoly {
    #[serde(rename = "normalizedVertices", default)]
    pub normalized_vertices: Vec<Vertex>,
}

/// Cloud Vision API client.
pub struct VisionClient {
    http: Client,
    config: VisionConfig,
    token: Arc<TokenSource>,
}

impl Clone for VisionClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            token: Arc::clone(&self.token),
        }
    }
}

impl VisionClient {
    /// Create a new client with GCP service-account authentication.
    pub fn new(config: VisionConfig) -> VisionResult<Self> {
        let token = TokenSource::from_env()?;
        Self::with_token_source(config, token)
    }

    /// Create a client with a fixed bearer token (tests).
    pub fn with_static_token(
        config: VisionConfig,
        token: impl Into<String>,
    ) -> VisionResult<Self> {
        Self::with_token_source(config, TokenSource::fixed(token))
    }

    fn with_token_source(config: VisionConfig, token: TokenSource) -> VisionResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vet-vision/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(VisionError::Network)?;

        Ok(Self {
            http,
            config,
            token: Arc::new(token),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> VisionResult<Self> {
        Self::new(VisionConfig::from_env())
    }

    /// Annotate one image: faces, localized objects and scene labels in a
    /// single request.
    pub async fn annotate_image(&self, image: &[u8]) -> VisionResult<AnnotateImageResponse> {
        let url = format!("{}/v1/images:annotate", self.config.api_base_url);
        debug!("Annotating {} byte image", image.len());

        let body = AnnotateRequest {
            requests: vec![ImageRequest {
                image: ImageContent {
                    content: BASE64.encode(image),
                },
                features: vec![
                    Feature {
                        feature_type: "FACE_DETECTION",
                        max_results: self.config.max_results,
                    },
                    Feature {
                        feature_type: "OBJECT_LOCALIZATION",
                        max_results: self.config.max_results,
                    },
                    Feature {
                        feature_type: "LABEL_DETECTION",
                        max_results: self.config.max_results,
                    },
                ],
            }],
        };

        let token = self.token.get_token().await?;
        let resp = self.http.post(&url).bearer_auth(&token).json(&body).send().await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(VisionError::request_failed(format!("HTTP {status}: {text}")));
        }

        let mut parsed: AnnotateResponseBody = resp.json().await?;
        if parsed.responses.is_empty() {
            return Err(VisionError::request_failed("response carried no annotations"));
        }
        let response = parsed.responses.swap_remove(0);

        if let Some(err) = &response.error {
            return Err(VisionError::annotation_error(err.to_string()));
        }

        Ok(response)
    }
}
