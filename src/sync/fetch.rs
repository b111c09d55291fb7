//! Bucket fetching.
//!
//! [`BucketFetcher`] is the seam between the engine and the network.
//! [`HttpBucketFetcher`] is the production implementation: a `reqwest`
//! client against the feed's raw log directory, gunzipping `.gz` resources.

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{FetchMode, ProviderSpec, TimeBucket};

use super::types::FetchOutcome;

/// Base URL of the public raw log directory.
pub const DEFAULT_BASE_URL: &str = "https://tenhou.net/sc/raw/";

/// Per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Retrieves the raw text of one bucket.
///
/// Implementations return [`FetchOutcome::NotFound`] for a resource that
/// does not exist and an error for every other failure, including timeouts.
pub trait BucketFetcher: Send + Sync {
    fn fetch(
        &self,
        provider: &ProviderSpec,
        bucket: &TimeBucket,
        mode: FetchMode,
    ) -> impl std::future::Future<Output = Result<FetchOutcome>> + Send;
}

/// Fetches buckets over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBucketFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBucketFetcher {
    /// Create a fetcher for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(DEFAULT_BASE_URL));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        Ok(Self { client, base_url })
    }

    /// Full URL of a bucket's resource.
    #[must_use]
    pub fn url_for(&self, provider: &ProviderSpec, bucket: &TimeBucket, mode: FetchMode) -> String {
        format!("{}{}", self.base_url, provider.path_for(bucket, mode))
    }
}

impl BucketFetcher for HttpBucketFetcher {
    async fn fetch(
        &self,
        provider: &ProviderSpec,
        bucket: &TimeBucket,
        mode: FetchMode,
    ) -> Result<FetchOutcome> {
        let url = self.url_for(provider, bucket, mode);
        debug!(provider = %provider.tag, bucket = %bucket, %mode, %url, "Fetching bucket");

        let response = self.client.get(&url).send().await.map_err(|e| Error::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(Error::Transport {
                url,
                message: format!("HTTP {status}"),
            });
        }

        let body = response.bytes().await.map_err(|e| Error::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        decode_body(&url, &body).map(FetchOutcome::Found)
    }
}

/// Turn a response body into text, gunzipping `.gz` resources.
///
/// # Errors
///
/// Returns `Error::Decode` for corrupt gzip data or non-UTF-8 text.
pub fn decode_body(url: &str, body: &[u8]) -> Result<String> {
    let bytes = if url.ends_with(".gz") {
        let mut out = Vec::new();
        GzDecoder::new(body)
            .read_to_end(&mut out)
            .map_err(|e| Error::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        out
    } else {
        body.to_vec()
    };

    String::from_utf8(bytes).map_err(|e| Error::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
