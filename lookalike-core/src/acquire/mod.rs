//! Image acquisition.
//!
//! An [`Acquirer`] pulls raw bytes from a [`ByteSource`], retrying transient
//! failures under a [`RetryPolicy`], and hands successful downloads to
//! [`crate::normalize`]. The byte source is a trait so the retry logic runs
//! unchanged against the network ([`HttpByteSource`], `network` feature) or
//! an in-memory [`MockByteSource`] in tests.
//!
//! ## Example
//!
//! ```no_run
//! use lookalike_core::acquire::{Acquirer, HttpByteSource, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let acquirer = Acquirer::new(HttpByteSource::new()?, RetryPolicy::default());
//! let acquired = acquirer.acquire("https://example.com/photo.jpg").await?;
//! println!("{} canonical bytes after {} attempt(s)", acquired.bytes.len(), acquired.attempts);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "network")]
mod http;
mod mock;
mod retry;

#[cfg(feature = "network")]
pub use http::{HttpByteSource, HttpSourceConfig};
pub use mock::MockByteSource;
pub use retry::{
    RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, DEFAULT_MULTIPLIER,
    DEFAULT_REQUEST_TIMEOUT,
};

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry_notify;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{LookalikeError, Result};
use crate::normalize::normalize_blocking;

/// Raw response from a byte source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// Declared media type, if the source reported one.
    pub content_type: Option<String>,
}

impl FetchedImage {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: Some(content_type.into()),
        }
    }
}

/// A failed fetch, classified for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Worth retrying: connection failures, timeouts, 429/502/503/504.
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot help.
    #[error("{0}")]
    Permanent(String),
}

/// Where image bytes come from.
///
/// Implementations must be thread-safe (`Send + Sync`). A single call is a
/// single attempt: retries and timeouts are applied by [`Acquirer`].
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedImage, FetchError>;
}

#[async_trait]
impl<S: ByteSource + ?Sized> ByteSource for std::sync::Arc<S> {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedImage, FetchError> {
        (**self).fetch(url).await
    }
}

/// Whether a declared content type names an image.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Raw bytes of a successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub attempts: u32,
}

/// Canonical bytes of a successful acquisition.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub bytes: Vec<u8>,
    pub attempts: u32,
}

/// Per-batch download counters.
///
/// A plain value: callers fold each outcome in with the `record_*`
/// methods and merge batches with [`DownloadStats::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStats {
    pub requests: u32,
    pub successful: u32,
    pub failed: u32,
    pub total_attempts: u32,
}

impl DownloadStats {
    pub fn record_success(&mut self, attempts: u32) {
        self.requests += 1;
        self.successful += 1;
        self.total_attempts += attempts;
    }

    pub fn record_failure(&mut self, attempts: u32) {
        self.requests += 1;
        self.failed += 1;
        self.total_attempts += attempts;
    }

    /// Fold one acquisition outcome in.
    pub fn record<T>(&mut self, outcome: &Result<T>)
    where
        T: HasAttempts,
    {
        match outcome {
            Ok(value) => self.record_success(value.attempts()),
            Err(e) => self.record_failure(e.attempts().unwrap_or(0)),
        }
    }

    pub fn merge(&mut self, other: &DownloadStats) {
        self.requests += other.requests;
        self.successful += other.successful;
        self.failed += other.failed;
        self.total_attempts += other.total_attempts;
    }

    /// Fraction of requests that succeeded, 0 when nothing was requested.
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.successful as f64 / self.requests as f64
        }
    }
}

/// Outcomes that know how many attempts they took.
pub trait HasAttempts {
    fn attempts(&self) -> u32;
}

impl HasAttempts for Fetched {
    fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl HasAttempts for Acquired {
    fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Fetches images with retries and normalizes them.
pub struct Acquirer<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: ByteSource> Acquirer<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch raw image bytes, retrying transient failures.
    pub async fn fetch(&self, url: &str) -> Result<Fetched> {
        self.fetch_within(url, None).await
    }

    /// [`Acquirer::fetch`] bounded by an overall deadline covering every
    /// attempt and every backoff sleep.
    #[instrument(skip(self), fields(max_attempts = self.policy.max_attempts()))]
    pub async fn fetch_within(&self, url: &str, deadline: Option<Duration>) -> Result<Fetched> {
        let attempts = AtomicU32::new(0);
        let retried = self.fetch_with_retry(url, &attempts);

        let outcome = match deadline {
            None => retried.await,
            Some(limit) => match tokio::time::timeout(limit, retried).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let made = attempts.load(Ordering::SeqCst);
                    warn!(
                        attempts = made,
                        deadline_ms = limit.as_millis() as u64,
                        "Acquisition deadline exceeded"
                    );
                    return Err(LookalikeError::AcquisitionTimeout {
                        url: url.to_string(),
                        attempts: made,
                        deadline_ms: limit.as_millis() as u64,
                    });
                }
            },
        };

        let made = attempts.load(Ordering::SeqCst);
        match outcome {
            Ok(bytes) => {
                debug!(attempts = made, bytes = bytes.len(), "Fetched image");
                Ok(Fetched {
                    bytes,
                    attempts: made,
                })
            }
            Err(cause) => {
                warn!(attempts = made, cause = %cause, "Acquisition failed");
                Err(LookalikeError::Acquisition {
                    url: url.to_string(),
                    attempts: made,
                    cause: cause.to_string(),
                })
            }
        }
    }

    /// Fetch and normalize an image into canonical bytes.
    pub async fn acquire(&self, url: &str) -> Result<Acquired> {
        self.acquire_within(url, None).await
    }

    /// [`Acquirer::acquire`] with an overall deadline on the fetch.
    pub async fn acquire_within(&self, url: &str, deadline: Option<Duration>) -> Result<Acquired> {
        let fetched = self.fetch_within(url, deadline).await?;
        let bytes = normalize_blocking(fetched.bytes).await?;
        Ok(Acquired {
            bytes,
            attempts: fetched.attempts,
        })
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        attempts: &AtomicU32,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let max_attempts = self.policy.max_attempts();
        let source = &self.source;
        let request_timeout = self.policy.request_timeout;

        retry_notify(
            self.policy.build_backoff(),
            move || async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(attempt, "Fetching image");

                match fetch_once(source, url, request_timeout).await {
                    Ok(bytes) => Ok(bytes),
                    Err(e @ FetchError::Transient(_)) if attempt < max_attempts => {
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            },
            |err: FetchError, delay: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = delay.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }
}

/// One attempt: bounded by the request timeout, content type checked.
async fn fetch_once<S: ByteSource + ?Sized>(
    source: &S,
    url: &str,
    request_timeout: Duration,
) -> std::result::Result<Vec<u8>, FetchError> {
    let fetched = tokio::time::timeout(request_timeout, source.fetch(url))
        .await
        .map_err(|_| {
            FetchError::Transient(format!(
                "Request timed out after {}ms",
                request_timeout.as_millis()
            ))
        })??;

    match fetched.content_type.as_deref() {
        Some(content_type) if is_image_content_type(content_type) => Ok(fetched.bytes),
        Some(content_type) => Err(FetchError::Permanent(format!(
            "Not an image: content type {content_type}"
        ))),
        None => Err(FetchError::Permanent(
            "Not an image: no content type".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_content_type() {
        assert!(is_image_content_type("image/jpeg"));
        assert!(is_image_content_type("Image/PNG; charset=binary"));
        assert!(!is_image_content_type("text/html"));
        assert!(!is_image_content_type("application/octet-stream"));
        assert!(!is_image_content_type(""));
    }

    #[test]
    fn test_download_stats() {
        let mut stats = DownloadStats::default();
        assert_eq!(stats.success_rate(), 0.0);

        stats.record_success(1);
        stats.record_success(2);
        stats.record_failure(3);
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_attempts, 6);
        assert!((stats.success_rate() - 2.0 / 3.0).abs() < 1e-12);

        let mut total = DownloadStats::default();
        total.merge(&stats);
        total.merge(&stats);
        assert_eq!(total.requests, 6);
        assert_eq!(total.total_attempts, 12);
    }

    #[test]
    fn test_stats_record_outcome() {
        let mut stats = DownloadStats::default();
        stats.record(&Ok(Fetched {
            bytes: vec![],
            attempts: 2,
        }));
        stats.record::<Fetched>(&Err(LookalikeError::Acquisition {
            url: "u".into(),
            attempts: 3,
            cause: "refused".into(),
        }));
        stats.record::<Fetched>(&Err(LookalikeError::Decode("bad".into())));
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.total_attempts, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let source = MockByteSource::scripted(vec![
            Err(FetchError::Transient("503 Service Unavailable".into())),
            Ok(FetchedImage::new(vec![1, 2, 3], "image/png")),
        ]);
        let acquirer = Acquirer::new(source, RetryPolicy::default());

        let fetched = acquirer.fetch("https://img/1").await.unwrap();
        assert_eq!(fetched.bytes, vec![1, 2, 3]);
        assert_eq!(fetched.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_stops_immediately() {
        let source = MockByteSource::scripted(vec![Err(FetchError::Permanent(
            "404 Not Found".into(),
        ))]);
        let acquirer = Acquirer::new(source, RetryPolicy::default());

        let err = acquirer.fetch("https://img/1").await.unwrap_err();
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(acquirer.source().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_image_content_type_rejected() {
        let source = MockByteSource::serving(b"<html></html>".to_vec(), "text/html");
        let acquirer = Acquirer::new(source, RetryPolicy::default());

        let err = acquirer.fetch("https://img/1").await.unwrap_err();
        assert!(matches!(err, LookalikeError::Acquisition { attempts: 1, .. }));
    }
}
