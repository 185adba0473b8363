//! Robustness tests for image signatures.
//!
//! Two renderings of the same photo (recompressed, resized, reformatted)
//! must still score as a match once normalized, while unrelated scenes must
//! stay below the similarity floor.

use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgb, RgbImage};
use lookalike_core::signature::Signature;
use lookalike_core::{normalize, Scorer, SignatureBuilder, SignatureCache, SIMILARITY_FLOOR};
use std::io::Cursor;

/// Minimum score for two renderings of one photo.
const SAME_PHOTO_THRESHOLD: f64 = 0.90;

/// Create a test image with recognizable structure.
fn create_test_image(width: u32, height: u32) -> RgbImage {
    let mut img = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let b = (((x + y) as f32 / (width + height) as f32) * 200.0) as u8;

        let pattern = if (x / 32 + y / 32) % 2 == 0 { 30 } else { 0 };
        *pixel = Rgb([r.saturating_add(pattern), g, b]);
    }

    img
}

/// Warm scene split left/right.
fn warm_scene() -> RgbImage {
    ImageBuffer::from_fn(256, 256, |x, _| {
        if x < 128 {
            Rgb([250, 120, 10])
        } else {
            Rgb([200, 60, 10])
        }
    })
}

/// Cool scene split top/bottom.
fn cool_scene() -> RgbImage {
    ImageBuffer::from_fn(256, 256, |_, y| {
        if y < 128 {
            Rgb([10, 120, 250])
        } else {
            Rgb([10, 60, 200])
        }
    })
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    img.write_with_encoder(encoder).expect("JPEG encoding failed");
    out
}

fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .expect("PNG encoding failed");
    buffer.into_inner()
}

fn sign(bytes: &[u8]) -> Signature {
    let canonical = normalize(bytes).expect("normalization failed");
    Signature::from_bytes(&canonical).expect("signature failed")
}

fn resize_image(img: &DynamicImage, percentage: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    img.resize_exact(
        width * percentage / 100,
        height * percentage / 100,
        image::imageops::FilterType::Lanczos3,
    )
}

// ============================================================================
// Same photo, different rendering
// ============================================================================

#[test]
fn test_jpeg_quality_variations_match() {
    let original = DynamicImage::ImageRgb8(create_test_image(512, 512));
    let reference = sign(&encode_png(&original));
    let scorer = Scorer::default();

    for quality in [90, 70, 50] {
        let variant = sign(&encode_jpeg(&original, quality));
        let score = scorer.score(&reference, &variant);
        assert!(
            score >= SAME_PHOTO_THRESHOLD,
            "JPEG quality {quality}: score {score:.4} below {SAME_PHOTO_THRESHOLD}"
        );
    }
}

#[test]
fn test_downscaled_copy_matches() {
    let original = DynamicImage::ImageRgb8(create_test_image(512, 512));
    let reference = sign(&encode_jpeg(&original, 90));
    let half = sign(&encode_jpeg(&resize_image(&original, 50), 90));

    let score = Scorer::default().score(&reference, &half);
    assert!(score >= SAME_PHOTO_THRESHOLD, "50% resize: score {score:.4}");
}

#[test]
fn test_normalized_bytes_are_stable() {
    let original = DynamicImage::ImageRgb8(create_test_image(400, 300));
    let bytes = encode_jpeg(&original, 80);

    let builder = SignatureBuilder::new();
    let first = builder.build(&normalize(&bytes).unwrap()).unwrap();
    let second = builder.build(&normalize(&bytes).unwrap()).unwrap();
    assert_eq!(first, second);
    assert_eq!(builder.cache().len(), 1);
}

// ============================================================================
// Different photos
// ============================================================================

#[test]
fn test_distinct_scenes_score_below_floor() {
    let warm = sign(&encode_jpeg(&DynamicImage::ImageRgb8(warm_scene()), 95));
    let cool = sign(&encode_jpeg(&DynamicImage::ImageRgb8(cool_scene()), 95));

    let score = Scorer::default().score(&warm, &cool);
    assert!(score < SIMILARITY_FLOOR, "distinct scenes scored {score:.4}");
}

#[test]
fn test_hash_lengths_fixed_for_any_input_size() {
    for (w, h) in [(16, 16), (640, 480), (97, 331)] {
        let bytes = encode_jpeg(&DynamicImage::ImageRgb8(create_test_image(w, h)), 85);
        let signature = sign(&bytes);
        assert_eq!(signature.hashes.simple_hash.len(), 64);
        assert_eq!(signature.hashes.enhanced_hash.len(), 256);
        assert_eq!(signature.hashes.dct_hash.len(), 64);
    }
}

#[test]
fn test_score_properties_on_real_signatures() {
    let a = sign(&encode_jpeg(&DynamicImage::ImageRgb8(warm_scene()), 95));
    let b = sign(&encode_jpeg(&DynamicImage::ImageRgb8(create_test_image(300, 300)), 75));
    let scorer = Scorer::default();

    assert!((scorer.score(&a, &a) - 1.0).abs() < 1e-9);
    assert!((scorer.score(&a, &b) - scorer.score(&b, &a)).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&scorer.score(&a, &b)));
}
