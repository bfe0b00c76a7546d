//! Shared application state.

use std::sync::Arc;

use vet_bigquery::{BigQueryClient, ProcessingGate};
use vet_gemini::GeminiClient;
use vet_media::{HttpThumbnailFetcher, ThumbnailResolver};
use vet_pubsub::Publisher;
use vet_storage::StorageClient;
use vet_vision::VisionClient;

use crate::config::AppConfig;
use crate::error::FunctionResult;
use crate::sheets::SheetsClient;

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub bigquery: BigQueryClient,
    pub gate: ProcessingGate,
    pub storage: StorageClient,
    pub publisher: Publisher,
    pub vision: VisionClient,
    pub gemini: GeminiClient,
    pub sheets: SheetsClient,
    pub fetcher: HttpThumbnailFetcher,
    pub thumbnails: Arc<ThumbnailResolver<HttpThumbnailFetcher>>,
}

impl AppState {
    /// Build all backend clients from the environment.
    pub fn new(config: AppConfig) -> FunctionResult<Self> {
        let bigquery = BigQueryClient::from_env()?;
        let gate = ProcessingGate::new(bigquery.clone());
        let fetcher = HttpThumbnailFetcher::new();
        let thumbnails = match std::env::var("THUMBNAIL_API_BASE_URL") {
            Ok(base) => ThumbnailResolver::with_base_url(fetcher.clone(), base),
            Err(_) => ThumbnailResolver::new(fetcher.clone()),
        };

        Ok(Self {
            config: Arc::new(config),
            gate,
            bigquery,
            storage: StorageClient::from_env()?,
            publisher: Publisher::from_env()?,
            vision: VisionClient::from_env()?,
            gemini: GeminiClient::from_env()?,
            sheets: SheetsClient::from_env()?,
            thumbnails: Arc::new(thumbnails),
            fetcher,
        })
    }
}
