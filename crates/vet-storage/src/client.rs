//! Cloud Storage client implementation.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info};
use vet_gcp::TokenSource;

use crate::error::{StorageError, StorageResult};

const DEFAULT_API_BASE: &str = "https://storage.googleapis.com";

/// Configuration for the storage client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// API base URL (overridable for tests/emulators).
    pub api_base_url: String,
    /// Request timeout. Uploads carry image payloads, so this is generous.
    pub timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var("GCS_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            ..Self::default()
        }
    }
}

/// Cloud Storage JSON API client.
pub struct StorageClient {
    http: Client,
    config: StorageConfig,
    token: std::sync::Arc<TokenSource>,
}

impl Clone for StorageClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            token: std::sync::Arc::clone(&self.token),
        }
    }
}

impl StorageClient {
    /// Create a new client with GCP service-account authentication.
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let token = TokenSource::from_env()?;
        Self::with_token_source(config, token)
    }

    /// Create a client with a fixed bearer token (tests, emulators).
    pub fn with_static_token(
        config: StorageConfig,
        token: impl Into<String>,
    ) -> StorageResult<Self> {
        Self::with_token_source(config, TokenSource::fixed(token))
    }

    fn with_token_source(config: StorageConfig, token: TokenSource) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vet-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StorageError::Network)?;

        Ok(Self {
            http,
            config,
            token: std::sync::Arc::new(token),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(StorageConfig::from_env())
    }

    /// Upload bytes as an object via the media upload endpoint.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.config.api_base_url,
            bucket,
            urlencoding::encode(object),
        );
        debug!("Uploading {} bytes to gs://{}/{}", data.len(), bucket, object);

        let token = self.token.get_token().await?;
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::upload_failed(format!(
                "HTTP {status}: {body}"
            )));
        }

        info!("Uploaded gs://{}/{}", bucket, object);
        Ok(())
    }

    /// Upload a JPEG image.
    pub async fn upload_image(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
    ) -> StorageResult<()> {
        self.upload_object(bucket, object, data, "image/jpeg").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> StorageClient {
        let config = StorageConfig {
            api_base_url: server.uri(),
            timeout: Duration::from_secs(5),
        };
        StorageClient::with_static_token(config, "test-token").unwrap()
    }

    #[tokio::test]
    async fn test_upload_image_hits_media_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/crops/o"))
            .and(query_param("uploadType", "media"))
            .and(query_param("name", "abc/Face-1a2b3c-url.jpg"))
            .and(header("content-type", "image/jpeg"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "abc/Face-1a2b3c-url.jpg"
            })))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server)
            .upload_image("crops", "abc/Face-1a2b3c-url.jpg", vec![0xFF, 0xD8, 0xFF])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let result = test_client(&server)
            .upload_image("crops", "x.jpg", vec![1, 2, 3])
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
    }
}
