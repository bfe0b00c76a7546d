//! Vertex AI Gemini REST client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use vet_gcp::TokenSource;

use crate::error::{GeminiError, GeminiResult};

/// One person the model saw on the thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonEvaluation {
    pub evaluated_description: String,
    pub evaluated_age: i64,
}

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// GCP project the model is invoked in.
    pub project_id: String,
    /// Vertex AI location, e.g. `us-central1`.
    pub location: String,
    /// Model identifier, e.g. `gemini-1.5-flash`.
    pub model: String,
    /// API base URL (overridable for tests).
    pub api_base_url: String,
    /// Request timeout. Model calls are slow.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
            .map_err(|_| GeminiError::config_error("GOOGLE_CLOUD_PROJECT must be set"))?;
        let location = std::env::var("GEMINI_LOCATION")
            .unwrap_or_else(|_| "us-central1".to_string());
        let model = std::env::var("GEMINI_MODEL")
            .map_err(|_| GeminiError::config_error("GEMINI_MODEL must be set"))?;

        let api_base_url = std::env::var("GEMINI_API_BASE_URL")
            .unwrap_or_else(|_| format!("https://{location}-aiplatform.googleapis.com"));

        Ok(Self {
            project_id,
            location,
            model,
            api_base_url,
            timeout: Duration::from_secs(120),
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Serialize)]
struct FileData {
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
    #[serde(rename = "fileUri")]
    file_uri: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// The answer the model is pinned to: a list of people, each with a
/// description and an integer age estimate.
#[derive(Deserialize)]
struct AgeEvaluationResponse {
    items: Vec<PersonEvaluation>,
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "evaluated_description": { "type": "STRING" },
                        "evaluated_age": { "type": "INTEGER" }
                    },
                    "required": ["evaluated_description", "evaluated_age"]
                }
            }
        },
        "required": ["items"]
    })
}

/// Vertex AI Gemini client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
    token: Arc<TokenSource>,
}

impl Clone for GeminiClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            token: Arc::clone(&self.token),
        }
    }
}

impl GeminiClient {
    /// Create a new client with GCP service-account authentication.
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        let token = TokenSource::from_env()?;
        Self::with_token_source(config, token)
    }

    /// Create a client with a fixed bearer token (tests).
    pub fn with_static_token(
        config: GeminiConfig,
        token: impl Into<String>,
    ) -> GeminiResult<Self> {
        Self::with_token_source(config, TokenSource::fixed(token))
    }

    fn with_token_source(config: GeminiConfig, token: TokenSource) -> GeminiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vet-gemini/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GeminiError::Network)?;

        Ok(Self {
            http,
            config,
            token: Arc::new(token),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    /// The model identifier recorded alongside every evaluation row.
    pub fn model_id(&self) -> &str {
        &self.config.model
    }

    /// Evaluate the ages of the people visible on one thumbnail.
    pub async fn evaluate_ages(
        &self,
        thumbnail_url: &str,
        system_instruction: &str,
        prompt: &str,
    ) -> GeminiResult<Vec<PersonEvaluation>> {
        let url = format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.config.api_base_url, self.config.project_id, self.config.location, self.config.model,
        );
        debug!("Evaluating thumbnail {} with {}", thumbnail_url, self.config.model);

        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![
                    Part::File {
                        file_data: FileData {
                            mime_type: "image/jpeg",
                            file_uri: thumbnail_url.to_string(),
                        },
                    },
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: system_instruction.to_string(),
                }],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        };

        let token = self.token.get_token().await?;
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(GeminiError::request_failed(format!("HTTP {status}: {text}")));
        }

        let response: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| GeminiError::malformed_response(e.to_string()))?;

        let text = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| GeminiError::malformed_response("no content in response"))?;

        parse_evaluations(text)
    }
}

/// Parse the model's JSON answer, tolerating a markdown code fence around
/// it.
fn parse_evaluations(text: &str) -> GeminiResult<Vec<PersonEvaluation>> {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);

    let response: AgeEvaluationResponse = serde_json::from_str(text.trim())
        .map_err(|e| GeminiError::malformed_response(e.to_string()))?;
    Ok(response.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig {
            project_id: "test-project".to_string(),
            location: "us-central1".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_base_url: server.uri(),
            timeout: Duration::from_secs(5),
        };
        GeminiClient::with_static_token(config, "test-token").unwrap()
    }

    fn model_answer(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] }
            }]
        })
    }

    #[tokio::test]
    async fn test_evaluate_ages_parses_structured_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/test-project/locations/us-central1/publishers/google/models/gemini-1.5-flash:generateContent",
            ))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_answer(
                r#"{"items":[{"evaluated_description":"adult man in a suit","evaluated_age":35}]}"#,
            )))
            .mount(&server)
            .await;

        let people = test_client(&server)
            .evaluate_ages("https://i.ytimg.com/vi/abc/hq720.jpg", "sys", "prompt")
            .await
            .unwrap();
        assert_eq!(
            people,
            vec![PersonEvaluation {
                evaluated_description: "adult man in a suit".to_string(),
                evaluated_age: 35,
            }]
        );
    }

    #[tokio::test]
    async fn test_markdown_fenced_answer_is_tolerated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_answer(
                "```json\n{\"items\":[{\"evaluated_description\":\"child\",\"evaluated_age\":9}]}\n```",
            )))
            .mount(&server)
            .await;

        let people = test_client(&server)
            .evaluate_ages("url", "sys", "prompt")
            .await
            .unwrap();
        assert_eq!(people[0].evaluated_age, 9);
    }

    #[tokio::test]
    async fn test_api_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
            .mount(&server)
            .await;

        let result = test_client(&server).evaluate_ages("url", "sys", "prompt").await;
        assert!(matches!(result, Err(GeminiError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_non_json_answer_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_answer(
                "I see two people of indeterminate age.",
            )))
            .mount(&server)
            .await;

        let result = test_client(&server).evaluate_ages("url", "sys", "prompt").await;
        assert!(matches!(result, Err(GeminiError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        let people = parse_evaluations("  {\"items\": []}  ").unwrap();
        assert!(people.is_empty());
    }
}
