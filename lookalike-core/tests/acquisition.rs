//! Acquisition pipeline tests.
//!
//! These run on paused tokio time, so backoff sleeps and timeouts complete
//! instantly and call times are exact.

use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use lookalike_core::{
    Acquirer, ByteSource, FetchError, FetchedImage, LookalikeError, MockByteSource, RetryPolicy,
};

fn photo_jpeg() -> Vec<u8> {
    let img: RgbImage = ImageBuffer::from_fn(300, 200, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90);
    DynamicImage::ImageRgb8(img)
        .write_with_encoder(encoder)
        .unwrap();
    out
}

/// A source that never answers.
struct Hanging;

#[async_trait]
impl ByteSource for Hanging {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage, FetchError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_url_exhausts_retries_with_growing_backoff() {
    let acquirer = Acquirer::new(MockByteSource::unreachable(), RetryPolicy::default());

    let err = acquirer.fetch("https://unreachable.invalid/a.jpg").await.unwrap_err();
    assert!(matches!(err, LookalikeError::Acquisition { .. }));
    assert_eq!(err.attempts(), Some(3));

    let times = acquirer.source().call_times();
    assert_eq!(times.len(), 3);
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    assert!(gaps[1] > gaps[0]);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_backoff() {
    let acquirer = Acquirer::new(MockByteSource::unreachable(), RetryPolicy::default());

    let err = acquirer
        .fetch_within("https://unreachable.invalid/a.jpg", Some(Duration::from_millis(1500)))
        .await
        .unwrap_err();

    match err {
        LookalikeError::AcquisitionTimeout {
            attempts,
            deadline_ms,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(deadline_ms, 1500);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout_counts_as_transient() {
    let acquirer = Acquirer::new(Hanging, RetryPolicy::default());

    let err = acquirer.fetch("https://slow.example/a.jpg").await.unwrap_err();
    assert_eq!(err.attempts(), Some(3));
    assert!(err.to_string().contains("timed out"), "{err}");
}

#[tokio::test(start_paused = true)]
async fn test_html_response_is_rejected_without_retry() {
    let source = MockByteSource::serving(b"<html>not found</html>".to_vec(), "text/html");
    let acquirer = Acquirer::new(source, RetryPolicy::default());

    let err = acquirer.acquire("https://img/page").await.unwrap_err();
    assert_eq!(err.attempts(), Some(1));
    assert_eq!(acquirer.source().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovered_download_is_normalized() {
    let source = MockByteSource::scripted(vec![
        Err(FetchError::Transient("429 Too Many Requests".into())),
        Ok(FetchedImage::new(photo_jpeg(), "image/jpeg")),
    ]);
    let acquirer = Acquirer::new(source, RetryPolicy::default());

    let acquired = acquirer.acquire("https://img/ok").await.unwrap();
    assert_eq!(acquired.attempts, 2);

    let canonical = image::load_from_memory(&acquired.bytes).unwrap();
    assert_eq!((canonical.width(), canonical.height()), (512, 512));
}

#[tokio::test(start_paused = true)]
async fn test_undecodable_download_is_decode_error() {
    let source = MockByteSource::serving(vec![0u8; 32], "image/jpeg");
    let acquirer = Acquirer::new(source, RetryPolicy::default());

    let err = acquirer.acquire("https://img/tiny").await.unwrap_err();
    assert!(matches!(err, LookalikeError::Decode(_)));
}

#[tokio::test(start_paused = true)]
async fn test_no_retry_policy_makes_one_attempt() {
    let acquirer = Acquirer::new(MockByteSource::unreachable(), RetryPolicy::no_retry());
    let err = acquirer.fetch("https://img/x").await.unwrap_err();
    assert_eq!(err.attempts(), Some(1));
}
