//! Canonical image form.
//!
//! Every image is brought to the same shape before it is signed, so that
//! two copies of one photo (different sizes, crops, compression or
//! orientation flags) produce comparable signatures:
//!
//! 1. EXIF orientation applied
//! 2. 512×512 center-crop fill
//! 3. tonal range stretched between the 1st and 99th luminance percentiles
//! 4. unsharp mask
//! 5. JPEG at quality 85

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use tracing::{debug, instrument, Span};

use crate::error::{LookalikeError, Result};

/// Inputs shorter than this are rejected before decoding.
pub const MIN_INPUT_BYTES: usize = 256;

/// Side of the canonical square, in pixels.
pub const CANONICAL_SIZE: u32 = 512;

pub const JPEG_QUALITY: u8 = 85;

const LOW_PERCENTILE: f64 = 0.01;
const HIGH_PERCENTILE: f64 = 0.99;

const SHARPEN_SIGMA: f32 = 1.0;
const SHARPEN_THRESHOLD: i32 = 2;

/// Convert encoded image bytes to canonical JPEG bytes.
#[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
pub fn normalize(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() < MIN_INPUT_BYTES {
        return Err(LookalikeError::Decode(format!(
            "Input too small to be an image: {} bytes",
            bytes.len()
        )));
    }

    let image = decode_oriented(bytes)?;
    debug!(width = image.width(), height = image.height(), "Decoded source image");

    let filled = image
        .resize_to_fill(CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Lanczos3)
        .to_rgb8();
    let stretched = stretch_contrast(filled);
    let sharpened = imageops::unsharpen(&stretched, SHARPEN_SIGMA, SHARPEN_THRESHOLD);

    encode_jpeg(&DynamicImage::ImageRgb8(sharpened))
}

/// [`normalize`] on the blocking thread pool, off the async workers.
pub async fn normalize_blocking(bytes: Vec<u8>) -> Result<Vec<u8>> {
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(|| normalize(&bytes))).await?
}

fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LookalikeError::Decode(format!("Unreadable image: {e}")))?
        .into_decoder()?;
    let orientation = decoder.orientation()?;

    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Map the [1st, 99th] luminance percentile range linearly onto [0, 255],
/// applying the same curve to every channel. Flat images pass unchanged.
fn stretch_contrast(mut image: RgbImage) -> RgbImage {
    let luma = imageops::grayscale(&image);
    let mut histogram = [0u64; 256];
    for pixel in luma.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return image;
    }

    let low = percentile(&histogram, total, LOW_PERCENTILE) as f64;
    let high = percentile(&histogram, total, HIGH_PERCENTILE) as f64;
    if high <= low {
        return image;
    }

    let scale = 255.0 / (high - low);
    let lut: [u8; 256] =
        std::array::from_fn(|v| ((v as f64 - low) * scale).round().clamp(0.0, 255.0) as u8);

    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = lut[*channel as usize];
        }
    }
    image
}

/// Value at `fraction` of the sorted sample, read off a 256-bin histogram.
fn percentile(histogram: &[u64; 256], total: u64, fraction: f64) -> u8 {
    let rank = ((total - 1) as f64 * fraction).round() as u64;
    let mut seen = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > rank {
            return value as u8;
        }
    }
    u8::MAX
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    image.write_with_encoder(encoder)?;
    Ok(out)
}
