//! Token caching for GCP authentication.
//!
//! Thread-safe, async-aware token cache with a refresh margin and
//! single-flight refresh, falling back to a still-usable token when a
//! refresh fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Refresh margin: refresh the token 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when expiry is unknown. OAuth tokens are
/// typically valid for 60 minutes.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope covering BigQuery, Cloud Storage, Pub/Sub and the ML APIs.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to load service account: {0}")]
    ServiceAccount(String),

    #[error("Failed to obtain auth token: {0}")]
    TokenFetch(String),
}

/// Load the service account named by `GOOGLE_APPLICATION_CREDENTIALS`.
pub fn default_provider() -> Result<Arc<dyn TokenProvider>, AuthError> {
    let service_account = CustomServiceAccount::from_env()
        .map_err(|e| AuthError::ServiceAccount(e.to_string()))?;

    match service_account {
        Some(sa) => Ok(Arc::new(sa)),
        None => Err(AuthError::ServiceAccount(
            "GOOGLE_APPLICATION_CREDENTIALS not set. \
             Set it to the path of your service account JSON file."
                .to_string(),
        )),
    }
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Access-token source: a caching GCP provider, or a fixed token for tests
/// and emulators.
pub struct TokenSource {
    inner: Inner,
}

enum Inner {
    Cached {
        auth: Arc<dyn TokenProvider>,
        cache: RwLock<Option<CachedToken>>,
    },
    Fixed(String),
}

impl TokenSource {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            inner: Inner::Cached {
                auth,
                cache: RwLock::new(None),
            },
        }
    }

    /// Build from the ambient service account credentials.
    pub fn from_env() -> Result<Self, AuthError> {
        Ok(Self::new(default_provider()?))
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            inner: Inner::Fixed(token.into()),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        let (auth, cache) = match &self.inner {
            Inner::Fixed(token) => return Ok(token.clone()),
            Inner::Cached { auth, cache } => (auth, cache),
        };

        // Fast path
        {
            let cache = cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        // Slow path: single-flight refresh behind the write lock.
        let mut cache = cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        match auth.token(&[CLOUD_PLATFORM_SCOPE]).await {
            Ok(token) => {
                let access_token = token.as_str().to_string();

                let expires_at = {
                    let now = Utc::now();
                    let exp = token.expires_at();
                    if exp > now {
                        match (exp - now).to_std() {
                            Ok(ttl) => Instant::now() + ttl,
                            Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
                        }
                    } else {
                        Instant::now()
                    }
                };

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed GCP auth token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }
                Err(AuthError::TokenFetch(e.to_string()))
            }
        }
    }
}
