//! In-memory byte source for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{ByteSource, FetchError, FetchedImage};

type Response = std::result::Result<FetchedImage, FetchError>;

enum Behavior {
    /// Every call fails with a connection error.
    Unreachable,
    /// Every call returns the same response.
    Serving(FetchedImage),
    /// Calls consume responses in order; an exhausted script is unreachable.
    Scripted(VecDeque<Response>),
}

/// Byte source answering from memory and recording when it was called.
///
/// Call times come from the tokio clock, so tests running with paused time
/// observe the exact backoff schedule.
pub struct MockByteSource {
    behavior: Mutex<Behavior>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl MockByteSource {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self::with_behavior(Behavior::Unreachable)
    }

    pub fn serving(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Serving(FetchedImage::new(bytes, content_type)))
    }

    pub fn scripted(responses: Vec<Response>) -> Self {
        Self::with_behavior(Behavior::Scripted(responses.into()))
    }

    /// Number of fetches made so far.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// When each fetch was made, in call order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    /// URLs requested, in call order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

fn connection_refused(url: &str) -> Response {
    Err(FetchError::Transient(format!(
        "error sending request for url ({url}): connection refused"
    )))
}

#[async_trait]
impl ByteSource for MockByteSource {
    async fn fetch(&self, url: &str) -> Response {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.to_string(), Instant::now()));

        let mut behavior = self.behavior.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *behavior {
            Behavior::Unreachable => connection_refused(url),
            Behavior::Serving(response) => Ok(response.clone()),
            Behavior::Scripted(script) => script.pop_front().unwrap_or_else(|| connection_refused(url)),
        }
    }
}
