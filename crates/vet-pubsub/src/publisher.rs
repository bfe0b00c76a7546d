//! Pub/Sub REST publisher.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use vet_gcp::TokenSource;

use crate::error::{PubSubError, PubSubResult};

const DEFAULT_API_BASE: &str = "https://pubsub.googleapis.com";

/// Publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// GCP project that owns the topics.
    pub project_id: String,
    /// API base URL (overridable for tests/emulators).
    pub api_base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl PublisherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> PubSubResult<Self> {
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
            .map_err(|_| PubSubError::config_error("GOOGLE_CLOUD_PROJECT must be set"))?;

        Ok(Self {
            project_id,
            api_base_url: std::env::var("PUBSUB_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            timeout: Duration::from_secs(30),
        })
    }
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<PublishMessage>,
}

#[derive(Serialize)]
struct PublishMessage {
    data: String,
}

#[derive(Deserialize)]
struct PublishResponse {
    #[serde(rename = "messageIds", default)]
    message_ids: Vec<String>,
}

/// Pub/Sub topic publisher.
#[derive(Clone)]
pub struct Publisher {
    http: Client,
    config: PublisherConfig,
    token: Arc<TokenSource>,
}

impl Publisher {
    /// Create a new publisher with GCP service-account authentication.
    pub fn new(config: PublisherConfig) -> PubSubResult<Self> {
        let token = TokenSource::from_env()?;
        Self::with_token_source(config, token)
    }

    /// Create a publisher with a fixed bearer token (tests, emulators).
    pub fn with_static_token(
        config: PublisherConfig,
        token: impl Into<String>,
    ) -> PubSubResult<Self> {
        Self::with_token_source(config, TokenSource::fixed(token))
    }

    fn with_token_source(config: PublisherConfig, token: TokenSource) -> PubSubResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vet-pubsub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PubSubError::Network)?;

        Ok(Self {
            http,
            config,
            token: Arc::new(token),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> PubSubResult<Self> {
        Self::new(PublisherConfig::from_env()?)
    }

    fn topic_path(&self, topic: &str) -> String {
        format!("projects/{}/topics/{}", self.config.project_id, topic)
    }

    /// Publish one JSON message to a topic. Returns the server-assigned
    /// message ID.
    pub async fn publish_json<T: Serialize>(&self, topic: &str, payload: &T) -> PubSubResult<String> {
        let data = serde_json::to_vec(payload)?;
        self.publish_bytes(topic, data).await
    }

    /// Publish raw bytes to a topic.
    pub async fn publish_bytes(&self, topic: &str, data: Vec<u8>) -> PubSubResult<String> {
        let url = format!(
            "{}/v1/{}:publish",
            self.config.api_base_url,
            self.topic_path(topic),
        );

        let body = PublishRequest {
            messages: vec![PublishMessage {
                data: BASE64.encode(data),
            }],
        };

        let token = self.token.get_token().await?;
        let resp = self.http.post(&url).bearer_auth(&token).json(&body).send().await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(PubSubError::publish_failed(format!("HTTP {status}: {text}")));
        }

        let response: PublishResponse = resp.json().await?;
        let id = response
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| PubSubError::publish_failed("response carried no message ID"))?;

        debug!("Published message {} to {}", id, topic);
        Ok(id)
    }

    /// Publish a batch of JSON messages concurrently and wait for all of
    /// them to settle.
    ///
    /// Individual failures are logged and counted rather than aborting the
    /// batch; the caller gets the number of messages that actually made it
    /// onto the topic.
    pub async fn publish_all<T: Serialize + Send + Sync + 'static>(
        &self,
        topic: &str,
        payloads: Vec<T>,
    ) -> PubSubResult<usize> {
        let total = payloads.len();
        if total == 0 {
            info!("No messages to publish to {}.", topic);
            return Ok(0);
        }

        let handles: Vec<_> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| {
                let publisher = self.clone();
                let topic = topic.to_string();
                tokio::spawn(async move {
                    match publisher.publish_json(&topic, &payload).await {
                        Ok(id) => {
                            info!("Published message ({}/{}) to {}: {}", i + 1, total, topic, id);
                            true
                        }
                        Err(e) => {
                            error!("Failed to publish message ({}/{}) to {}: {}", i + 1, total, topic, e);
                            false
                        }
                    }
                })
            })
            .collect();

        let published = join_all(handles)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();

        info!("Published {}/{} messages to {}.", published, total, topic);
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_publisher(server: &MockServer) -> Publisher {
        let config = PublisherConfig {
            project_id: "test-project".to_string(),
            api_base_url: server.uri(),
            timeout: Duration::from_secs(5),
        };
        Publisher::with_static_token(config, "test-token").unwrap()
    }

    #[tokio::test]
    async fn test_publish_json_encodes_payload() {
        let server = MockServer::start().await;
        let expected_data = BASE64.encode(serde_json::to_vec(&json!({"video_id": "abc"})).unwrap());
        Mock::given(method("POST"))
            .and(path("/v1/projects/test-project/topics/video-processing:publish"))
            .and(body_partial_json(json!({
                "messages": [ { "data": expected_data } ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messageIds": ["123"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = test_publisher(&server)
            .publish_json("video-processing", &json!({"video_id": "abc"}))
            .await
            .unwrap();
        assert_eq!(id, "123");
    }

    #[tokio::test]
    async fn test_publish_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let result = test_publisher(&server)
            .publish_json("topic", &json!({"a": 1}))
            .await;
        assert!(matches!(result, Err(PubSubError::PublishFailed(_))));
    }

    #[tokio::test]
    async fn test_publish_all_counts_successes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/test-project/topics/batch:publish"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messageIds": ["1"]
            })))
            .expect(3)
            .mount(&server)
            .await;

        let published = test_publisher(&server)
            .publish_all(
                "batch",
                vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})],
            )
            .await
            .unwrap();
        assert_eq!(published, 3);
    }

    #[tokio::test]
    async fn test_publish_all_empty_batch() {
        let server = MockServer::start().await;
        let published = test_publisher(&server)
            .publish_all::<serde_json::Value>("batch", Vec::new())
            .await
            .unwrap();
        assert_eq!(published, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
