//! BigQuery REST API client.
//!
//! Covers the two operations the pipeline needs: synchronous queries
//! (`jobs.query`) and streaming row inserts (`tabledata.insertAll`).

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use vet_gcp::TokenSource;

use crate::error::{BigQueryError, BigQueryResult};
use crate::retry::{with_retry, RetryConfig, METADATA_PROPAGATION_DELAY};

const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Fully qualified table reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project_id: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Backtick-quoted form for use inside SQL.
    pub fn sql_name(&self) -> String {
        format!("`{}.{}.{}`", self.project_id, self.dataset, self.table)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset, self.table)
    }
}

/// BigQuery client configuration.
#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    /// GCP project ID the jobs run in.
    pub project_id: String,
    /// API base URL (overridable for tests/emulators).
    pub api_base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl BigQueryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> BigQueryResult<Self> {
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
            .map_err(|_| BigQueryError::auth_error("GOOGLE_CLOUD_PROJECT must be set"))?;

        Ok(Self {
            project_id,
            api_base_url: std::env::var("BQ_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::from_env(),
        })
    }
}

/// One per-row insert error reported by `tabledata.insertAll`.
#[derive(Debug, Clone, Deserialize)]
pub struct InsertRowError {
    pub index: Option<usize>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(rename = "useLegacySql")]
    use_legacy_sql: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "jobComplete", default)]
    job_complete: bool,
    #[serde(default)]
    schema: Option<QuerySchema>,
    #[serde(default)]
    rows: Option<Vec<QueryRow>>,
}

#[derive(Deserialize)]
struct QuerySchema {
    fields: Vec<QueryField>,
}

#[derive(Deserialize)]
struct QueryField {
    name: String,
}

#[derive(Deserialize)]
struct QueryRow {
    f: Vec<QueryCell>,
}

#[derive(Deserialize)]
struct QueryCell {
    v: Value,
}

#[derive(Serialize)]
struct InsertAllRequest {
    rows: Vec<InsertAllRow>,
}

#[derive(Serialize)]
struct InsertAllRow {
    json: Value,
}

#[derive(Deserialize)]
struct InsertAllResponse {
    #[serde(rename = "insertErrors", default)]
    insert_errors: Vec<InsertRowError>,
}

/// BigQuery REST API client.
pub struct BigQueryClient {
    http: Client,
    config: BigQueryConfig,
    token: Arc<TokenSource>,
}

impl Clone for BigQueryClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            token: Arc::clone(&self.token),
        }
    }
}

impl BigQueryClient {
    /// Create a new client with GCP service-account authentication.
    pub fn new(config: BigQueryConfig) -> BigQueryResult<Self> {
        let token = TokenSource::from_env()?;
        Self::with_token_source(config, token)
    }

    /// Create a client with a fixed bearer token (tests, emulators).
    pub fn with_static_token(
        config: BigQueryConfig,
        token: impl Into<String>,
    ) -> BigQueryResult<Self> {
        Self::with_token_source(config, TokenSource::fixed(token))
    }

    fn with_token_source(config: BigQueryConfig, token: TokenSource) -> BigQueryResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vet-bigquery/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(BigQueryError::Network)?;

        Ok(Self {
            http,
            config,
            token: Arc::new(token),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> BigQueryResult<Self> {
        Self::new(BigQueryConfig::from_env()?)
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    /// Run a SQL query and return rows as name -> value maps.
    ///
    /// BigQuery serializes every scalar cell as a JSON string; callers that
    /// want typed values convert at the call site.
    pub async fn query(&self, sql: &str) -> BigQueryResult<Vec<serde_json::Map<String, Value>>> {
        let url = format!(
            "{}/projects/{}/queries",
            self.config.api_base_url, self.config.project_id
        );
        debug!("BigQuery query: {}", sql);

        let response: QueryResponse = with_retry(&self.config.retry, "query", || async {
            let token = self.token.get_token().await?;
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&QueryRequest {
                    query: sql,
                    use_legacy_sql: false,
                })
                .send()
                .await?;

            let status = resp.status();
            if status != StatusCode::OK {
                let body = resp.text().await.unwrap_or_default();
                return Err(BigQueryError::from_http_status(status.as_u16(), body));
            }
            Ok(resp.json::<QueryResponse>().await?)
        })
        .await?;

        if !response.job_complete {
            return Err(BigQueryError::QueryIncomplete(
                "query did not complete within the synchronous window".to_string(),
            ));
        }

        let field_names: Vec<String> = response
            .schema
            .map(|s| s.fields.into_iter().map(|f| f.name).collect())
            .unwrap_or_default();

        let rows = response
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                field_names
                    .iter()
                    .cloned()
                    .zip(row.f.into_iter().map(|cell| cell.v))
                    .collect()
            })
            .collect();

        Ok(rows)
    }

    /// Run a query and pull one string column out of every row.
    pub async fn query_column(&self, sql: &str, column: &str) -> BigQueryResult<Vec<String>> {
        let rows = self.query(sql).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get(column).and_then(|v| v.as_str().map(str::to_string)))
            .collect())
    }

    /// Append rows to a table via the streaming insert API.
    ///
    /// Returns per-row errors the way the API reports them; callers log
    /// them, they are not retried. Serialization of each row must not fail
    /// (records are plain data), so a serde error here is a bug and is
    /// surfaced as `Json`.
    pub async fn insert_rows<T: Serialize>(
        &self,
        table: &TableRef,
        rows: &[T],
    ) -> BigQueryResult<Vec<InsertRowError>> {
        if rows.is_empty() {
            info!("Nothing to write to BigQuery.");
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.config.api_base_url, table.project_id, table.dataset, table.table
        );

        let body = InsertAllRequest {
            rows: rows
                .iter()
                .map(|r| {
                    serde_json::to_value(r).map(|json| InsertAllRow { json })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let result = self.insert_once(&url, &body).await;

        // A table that was just created can briefly 404 while its metadata
        // propagates; back off once with a fixed delay before giving up.
        let response = match result {
            Err(BigQueryError::TableNotFound(msg)) => {
                warn!(
                    "Table {} not visible yet ({}), retrying once in {:?}",
                    table, msg, METADATA_PROPAGATION_DELAY
                );
                tokio::time::sleep(METADATA_PROPAGATION_DELAY).await;
                self.insert_once(&url, &body).await?
            }
            other => other?,
        };

        if response.insert_errors.is_empty() {
            info!("{} records written to BigQuery: {}.", rows.len(), table);
        } else {
            error!(
                "Encountered errors while inserting rows to {}: {:?}",
                table, response.insert_errors
            );
        }

        Ok(response.insert_errors)
    }

    async fn insert_once(
        &self,
        url: &str,
        body: &InsertAllRequest,
    ) -> BigQueryResult<InsertAllResponse> {
        let token = self.token.get_token().await?;
        let resp = self.http.post(url).bearer_auth(&token).json(body).send().await?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(BigQueryError::from_http_status(status.as_u16(), text));
        }
        Ok(resp.json::<InsertAllResponse>().await?)
    }
}
