//! Best-effort thumbnail resolution over the public thumbnail host.
//!
//! Two probing strategies exist, matching the two consumers:
//! - [`ThumbnailResolver::resolve`]: GET-based, fixed resolution tiers,
//!   returns decoded images for the annotation pipeline.
//! - [`ThumbnailResolver::probe_urls`]: HEAD-based, prefix x suffix cross
//!   product, returns URLs only for the age-evaluation pipeline.
//!
//! Both are best-effort probes, not authoritative lookups: a 404, timeout or
//! wrong content-type is a silent skip, never an error.

use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, info, warn};

use vet_models::VideoId;

/// Public thumbnail host. Overridable per resolver for tests.
pub const DEFAULT_THUMBNAIL_URL_BASE: &str = "https://i.ytimg.com/vi";

/// Resolution tiers, highest quality first within each tier. The first
/// filename that resolves wins the tier; remaining names are not tried.
pub const TIER_DEFAULT: &[&str] = &[
    "maxresdefault",
    "hq720",
    "sddefault",
    "hqdefault",
    "0",
    "mqdefault",
    "default",
];
pub const TIER_SUB_1: &[&str] = &["sd1", "hq1", "mq1", "1"];
pub const TIER_SUB_2: &[&str] = &["sd2", "hq2", "mq2", "2"];
pub const TIER_SUB_3: &[&str] = &["sd3", "hq3", "mq3", "3"];

/// All tiers in probe order.
pub fn resolution_tiers() -> [&'static [&'static str]; 4] {
    [TIER_DEFAULT, TIER_SUB_1, TIER_SUB_2, TIER_SUB_3]
}

// HEAD-probe cross product: best quality prefix first, one hit per suffix.
const PROBE_PREFIXES: &[&str] = &["maxres", "sd", "hq", "mq", ""];
const PROBE_SUFFIXES: &[&str] = &["default", "1", "2", "3"];

/// Injected network capability for thumbnail probing.
pub trait ThumbnailFetcher {
    /// GET the URL. `Some(bytes)` on HTTP 200, `None` otherwise.
    fn fetch(&self, url: &str) -> impl std::future::Future<Output = Option<Vec<u8>>> + Send;

    /// HEAD the URL. `true` on HTTP 200 with an `image/*` content type.
    fn probe(&self, url: &str) -> impl std::future::Future<Output = bool> + Send;
}

/// A thumbnail that resolved to an actual image.
pub struct ResolvedThumbnail {
    pub url: String,
    pub image: DynamicImage,
}

/// Resolves the best available thumbnail per resolution tier.
pub struct ThumbnailResolver<F> {
    fetcher: F,
    base_url: String,
}

impl<F: ThumbnailFetcher> ThumbnailResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_base_url(fetcher, DEFAULT_THUMBNAIL_URL_BASE)
    }

    /// Resolver probing an alternative host (tests, mirrors).
    pub fn with_base_url(fetcher: F, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    fn thumbnail_url(&self, video_id: &VideoId, name: &str) -> String {
        format!("{}/{video_id}/{name}.jpg", self.base_url)
    }

    /// Resolve the best available thumbnail image for each tier.
    ///
    /// Tiers with no hit contribute nothing; the result is ordered by tier
    /// and deduplicated by URL. An empty result means no thumbnail exists at
    /// any tier.
    pub async fn resolve(&self, video_id: &VideoId) -> Vec<ResolvedThumbnail> {
        let mut resolved: Vec<ResolvedThumbnail> = Vec::new();

        for tier in resolution_tiers() {
            debug!("Probing tier {:?} for video {}", tier, video_id);

            for name in tier {
                let url = self.thumbnail_url(video_id, name);
                if resolved.iter().any(|t| t.url == url) {
                    continue;
                }

                let Some(bytes) = self.fetcher.fetch(&url).await else {
                    continue;
                };

                match image::load_from_memory(&bytes) {
                    Ok(img) => {
                        info!("Best resolution for video {} found at {}", video_id, url);
                        resolved.push(ResolvedThumbnail { url, image: img });
                        break;
                    }
                    Err(e) => {
                        warn!("Body at {} is not a decodable image: {}", url, e);
                    }
                }
            }
        }

        if resolved.is_empty() {
            info!("Did not find a usable thumbnail for video {}", video_id);
        }
        resolved
    }

    /// Probe for available thumbnail URLs, best quality first per suffix
    /// group, without downloading the images.
    pub async fn probe_urls(&self, video_id: &VideoId) -> Vec<String> {
        let base = format!("{}/{video_id}", self.base_url);
        let mut urls = Vec::new();

        for suffix in PROBE_SUFFIXES {
            for prefix in PROBE_PREFIXES {
                let url = format!("{base}/{prefix}{suffix}.jpg");
                if self.fetcher.probe(&url).await {
                    debug!("Found available thumbnail: {}", url);
                    urls.push(url);
                    break;
                }
            }
        }

        if urls.is_empty() {
            warn!("No usable thumbnails found for video {}", video_id);
        }
        urls
    }
}

/// Production fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpThumbnailFetcher {
    client: reqwest::Client,
}

impl HttpThumbnailFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Fetch an arbitrary image URL (used by the cropout stage, which
    /// receives thumbnail URLs on the bus rather than probing for them).
    pub async fn fetch_url(&self, url: &str) -> Option<Vec<u8>> {
        self.fetch(url).await
    }
}

impl Default for HttpThumbnailFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailFetcher for HttpThumbnailFetcher {
    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        match self.client.get(url).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                resp.bytes().await.ok().map(|b| b.to_vec())
            }
            Ok(resp) => {
                if resp.status() != reqwest::StatusCode::NOT_FOUND {
                    warn!("Checked {}: status {}", url, resp.status());
                }
                None
            }
            Err(e) => {
                warn!("Error looking up {}: {}", url, e);
                None
            }
        }
    }

    async fn probe(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|ct| ct.starts_with("image/"))
                .unwrap_or(false),
            Ok(resp) => {
                if resp.status() != reqwest::StatusCode::NOT_FOUND {
                    warn!("Checked {}: status {}", url, resp.status());
                }
                false
            }
            Err(e) => {
                warn!("Error looking up {}: {}", url, e);
                false
            }
        }
    }
}
