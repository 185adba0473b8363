//! HTTP byte source.
//!
//! One request per call; retries, the per-request timeout and the content
//! type check live in [`super::Acquirer`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{redirect, Client, StatusCode};
use tracing::{debug, warn};

use super::{ByteSource, FetchError, FetchedImage, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{LookalikeError, Result};

/// Browser-like agent; some image hosts refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_redirects: usize,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_redirects: MAX_REDIRECTS,
        }
    }
}

impl HttpSourceConfig {
    /// Defaults with `LOOKALIKE_USER_AGENT` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(agent) = std::env::var("LOOKALIKE_USER_AGENT") {
            if !agent.trim().is_empty() {
                config.user_agent = agent;
            }
        }
        config
    }
}

pub struct HttpByteSource {
    client: Client,
}

impl HttpByteSource {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpSourceConfig::from_env())
    }

    pub fn with_config(config: HttpSourceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/*"));

        let client = Client::builder()
            .user_agent(config.user_agent)
            .default_headers(headers)
            .timeout(config.timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| LookalikeError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedImage, FetchError> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                FetchError::Transient(e.to_string())
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                FetchError::Permanent(e.to_string())
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let cause = format!("Image host returned status: {status}");
            return if is_transient_status(status) {
                Err(FetchError::Transient(cause))
            } else {
                Err(FetchError::Permanent(cause))
            };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(format!("Failed to read body: {e}")))?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "Request completed"
        );

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Connection failures and timeouts are worth retrying.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
