//! Byte source accepting local paths as well as URLs.

use async_trait::async_trait;
use lookalike_core::{ByteSource, FetchError, FetchedImage, HttpByteSource};
use tracing::debug;

pub struct InputSource {
    http: HttpByteSource,
}

impl InputSource {
    pub fn new(http: HttpByteSource) -> Self {
        Self { http }
    }
}

pub fn is_remote(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

#[async_trait]
impl ByteSource for InputSource {
    async fn fetch(&self, input: &str) -> Result<FetchedImage, FetchError> {
        if is_remote(input) {
            return self.http.fetch(input).await;
        }

        let bytes = tokio::fs::read(input)
            .await
            .map_err(|e| FetchError::Permanent(format!("Failed to read {input}: {e}")))?;

        // Local files carry no declared type; sniff it the way a server would.
        let content_type = image::guess_format(&bytes)
            .ok()
            .map(|format| format.to_mime_type().to_string());
        debug!(path = input, bytes = bytes.len(), content_type = ?content_type, "Read local image");

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}
