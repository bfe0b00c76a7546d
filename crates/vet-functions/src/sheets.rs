//! Google Sheets reader for the age-evaluation prompt configuration.
//!
//! The operating team edits the system instruction, the prompt and a
//! key/value settings block in a spreadsheet; the dispatcher reads all
//! three by named range at dispatch time so prompt changes take effect
//! without a redeploy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use vet_gcp::TokenSource;

use crate::error::{FunctionError, FunctionResult};

const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

const SYSTEM_INSTRUCTION_RANGE: &str = "thumbnail_age_system_instruction";
const PROMPT_RANGE: &str = "thumbnail_age_evaluation_prompt";
const SETTINGS_RANGE: &str = "configuration";

const KILL_SWITCH_KEY: &str = "use_gemini_to_evaluate_age";

/// Prompt configuration pulled from the sheet.
#[derive(Debug, Clone)]
pub struct EvaluationSheetConfig {
    pub system_instruction: String,
    pub prompt: String,
    pub settings: HashMap<String, String>,
}

impl EvaluationSheetConfig {
    /// The sheet-side kill switch. Anything other than the literal value
    /// `Enabled` keeps the dispatcher from publishing batches.
    pub fn age_evaluation_enabled(&self) -> bool {
        self.settings
            .get(KILL_SWITCH_KEY)
            .map(|v| v == "Enabled")
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Sheets API v4 read-only client.
pub struct SheetsClient {
    http: Client,
    api_base_url: String,
    token: Arc<TokenSource>,
}

impl Clone for SheetsClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            api_base_url: self.api_base_url.clone(),
            token: Arc::clone(&self.token),
        }
    }
}

impl SheetsClient {
    /// Create a new client with GCP service-account authentication.
    pub fn new(api_base_url: impl Into<String>) -> FunctionResult<Self> {
        let token = TokenSource::from_env()?;
        Self::with_token_source(api_base_url, token)
    }

    /// Create a client with a fixed bearer token (tests).
    pub fn with_static_token(
        api_base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> FunctionResult<Self> {
        Self::with_token_source(api_base_url, TokenSource::fixed(token))
    }

    fn with_token_source(
        api_base_url: impl Into<String>,
        token: TokenSource,
    ) -> FunctionResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("vet-functions/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FunctionError::Network)?;

        Ok(Self {
            http,
            api_base_url: api_base_url.into(),
            token: Arc::new(token),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> FunctionResult<Self> {
        let api_base_url = std::env::var("SHEETS_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self::new(api_base_url)
    }

    async fn value_range(&self, sheet_id: &str, range: &str) -> FunctionResult<Vec<Vec<String>>> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base_url, sheet_id, range,
        );
        debug!("Reading sheet {} range {}", sheet_id, range);

        let token = self.token.get_token().await?;
        let resp = self.http.get(&url).bearer_auth(&token).send().await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(FunctionError::sheet_read(format!(
                "range {range}: HTTP {status}: {body}"
            )));
        }

        let range: ValueRange = resp
            .json()
            .await
            .map_err(|e| FunctionError::sheet_read(e.to_string()))?;
        Ok(range.values)
    }

    async fn single_value(&self, sheet_id: &str, range: &str) -> FunctionResult<String> {
        let values = self.value_range(sheet_id, range).await?;
        values
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| FunctionError::sheet_read(format!("range {range} is empty")))
    }

    /// Read the full age-evaluation configuration from one sheet.
    pub async fn evaluation_config(&self, sheet_id: &str) -> FunctionResult<EvaluationSheetConfig> {
        info!("Getting config from sheet: {}", sheet_id);

        let system_instruction = self.single_value(sheet_id, SYSTEM_INSTRUCTION_RANGE).await?;
        let prompt = self.single_value(sheet_id, PROMPT_RANGE).await?;

        let settings = self
            .value_range(sheet_id, SETTINGS_RANGE)
            .await?
            .into_iter()
            .filter(|row| row.len() >= 2)
            .map(|mut row| (row.remove(0), row.remove(0)))
            .collect();

        Ok(EvaluationSheetConfig {
            system_instruction,
            prompt,
            settings,
        })
    }
}
