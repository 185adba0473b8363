//! Image signatures.
//!
//! A [`Signature`] is the multi-feature fingerprint of one canonical image:
//! three perceptual hashes, a color histogram, edge density, a quadrant
//! brightness profile and texture statistics. [`SignatureBuilder`] computes
//! signatures from encoded bytes and memoizes them by content digest.
//!
//! # Usage
//!
//! ```no_run
//! use lookalike_core::signature::SignatureBuilder;
//!
//! let bytes = std::fs::read("photo.jpg").unwrap();
//! let builder = SignatureBuilder::new();
//! if let Some(signature) = builder.build(&bytes) {
//!     println!("simple hash: {}", signature.hashes.simple_hash);
//! }
//! ```

pub mod bits;
pub mod features;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::{debug, instrument, warn, Span};

use crate::cache::{MemoryCache, SignatureCache};
use crate::error::{LookalikeError, Result};

pub use bits::BitHash;
pub use features::{BrightnessProfile, ColorHistogram, EdgeDensity, TextureMetrics};

use features::{DCT_HASH_SIZE, ENHANCED_HASH_SIZE, HISTOGRAM_BINS, SIMPLE_HASH_SIZE};

/// SHA3-256 digest of an encoded image, the memo key for signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(bytes);

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// The three perceptual hashes of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureHashes {
    /// 8×8 average hash (64 bits).
    pub simple_hash: BitHash,
    /// 16×16 average hash (256 bits).
    pub enhanced_hash: BitHash,
    /// Block-averaged 32×32 hash (64 bits).
    pub dct_hash: BitHash,
}

/// Multi-feature fingerprint of one image.
///
/// Signatures are plain values: computed once, cloned freely, never edited
/// in place. Records written by older tooling keyed the hash group as
/// `enhancedHash`; that key is still accepted when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[serde(alias = "enhancedHash")]
    pub hashes: SignatureHashes,
    pub color_histogram: ColorHistogram,
    pub edge_density: EdgeDensity,
    pub brightness_profile: BrightnessProfile,
    pub texture_metrics: TextureMetrics,
}

impl Signature {
    /// Decode encoded image bytes and compute their signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        Self::from_image(&image)
    }

    /// Compute the signature of a decoded image.
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(LookalikeError::SignatureComputation(format!(
                "Image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let signature = Self {
            hashes: SignatureHashes {
                simple_hash: features::average_hash(image, SIMPLE_HASH_SIZE),
                enhanced_hash: features::average_hash(image, ENHANCED_HASH_SIZE),
                dct_hash: features::dct_hash(image),
            },
            color_histogram: features::color_histogram(image),
            edge_density: features::edge_density(image),
            brightness_profile: features::brightness_profile(image),
            texture_metrics: features::texture_metrics(image),
        };

        signature.validate()?;
        Ok(signature)
    }

    /// Check the shape and range invariants of every feature.
    pub fn validate(&self) -> Result<()> {
        let hashes = [
            ("simpleHash", &self.hashes.simple_hash, SIMPLE_HASH_SIZE.pow(2)),
            ("enhancedHash", &self.hashes.enhanced_hash, ENHANCED_HASH_SIZE.pow(2)),
            (
                "dctHash",
                &self.hashes.dct_hash,
                (DCT_HASH_SIZE / features::DCT_BLOCK_SIZE).pow(2),
            ),
        ];
        for (name, hash, expected) in hashes {
            if hash.len() != expected as usize {
                return Err(LookalikeError::SignatureComputation(format!(
                    "{name} has {} bits, expected {expected}",
                    hash.len()
                )));
            }
        }

        let floats = self
            .color_histogram
            .channels()
            .into_iter()
            .flat_map(|channel| channel.iter())
            .chain(self.brightness_profile.iter())
            .chain([
                &self.edge_density.density,
                &self.texture_metrics.variance,
                &self.texture_metrics.contrast,
                &self.texture_metrics.mean,
            ]);
        for value in floats {
            if !value.is_finite() || *value < 0.0 {
                return Err(LookalikeError::SignatureComputation(format!(
                    "Feature value out of range: {value}"
                )));
            }
        }

        Ok(())
    }

    /// Aggregate signature of several images of the same subject.
    ///
    /// Histograms, edge density, brightness and texture are averaged
    /// element-wise. Each hash bit is decided by majority vote across the
    /// inputs, ties resolving to 0, so the result does not depend on which
    /// image happens to come first. Returns `None` for an empty slice.
    pub fn average(signatures: &[Signature]) -> Option<Signature> {
        let first = signatures.first()?;
        let n = signatures.len() as f64;

        let majority = |select: fn(&SignatureHashes) -> &BitHash| -> BitHash {
            let len = select(&first.hashes).len();
            BitHash::from_bits((0..len).map(|i| {
                let ones = signatures
                    .iter()
                    .filter(|s| select(&s.hashes).bit(i).unwrap_or(false))
                    .count();
                ones * 2 > signatures.len()
            }))
        };

        let mean_array =
            |select: fn(&Signature) -> &[f64; HISTOGRAM_BINS]| -> [f64; HISTOGRAM_BINS] {
                std::array::from_fn(|i| signatures.iter().map(|s| select(s)[i]).sum::<f64>() / n)
            };
        let mean_scalar = |select: fn(&Signature) -> f64| {
            signatures.iter().map(select).sum::<f64>() / n
        };

        Some(Signature {
            hashes: SignatureHashes {
                simple_hash: majority(|h| &h.simple_hash),
                enhanced_hash: majority(|h| &h.enhanced_hash),
                dct_hash: majority(|h| &h.dct_hash),
            },
            color_histogram: ColorHistogram {
                red: mean_array(|s| &s.color_histogram.red),
                green: mean_array(|s| &s.color_histogram.green),
                blue: mean_array(|s| &s.color_histogram.blue),
                combined: mean_array(|s| &s.color_histogram.combined),
            },
            edge_density: EdgeDensity {
                density: mean_scalar(|s| s.edge_density.density),
                total_edges: mean_scalar(|s| s.edge_density.total_edges as f64).round() as u32,
            },
            brightness_profile: std::array::from_fn(|i| {
                signatures.iter().map(|s| s.brightness_profile[i]).sum::<f64>() / n
            }),
            texture_metrics: TextureMetrics {
                variance: mean_scalar(|s| s.texture_metrics.variance),
                contrast: mean_scalar(|s| s.texture_metrics.contrast),
                mean: mean_scalar(|s| s.texture_metrics.mean),
            },
        })
    }
}

/// Computes signatures from encoded bytes, memoized by content digest.
///
/// Byte-identical inputs always yield the same signature: the first
/// computation is cached and every later request for the same digest is
/// served from the cache.
pub struct SignatureBuilder<C = MemoryCache> {
    cache: C,
}

impl SignatureBuilder<MemoryCache> {
    /// Builder with an unbounded process-lifetime cache.
    pub fn new() -> Self {
        Self::with_cache(MemoryCache::new())
    }
}

impl Default for SignatureBuilder<MemoryCache> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: SignatureCache> SignatureBuilder<C> {
    pub fn with_cache(cache: C) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Compute (or recall) the signature of `bytes`.
    ///
    /// Failures are logged and reported as `None` so that one bad image does
    /// not abort a batch. Use [`SignatureBuilder::try_build`] to get the error.
    #[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
    pub fn build(&self, bytes: &[u8]) -> Option<Signature> {
        match self.try_build(bytes) {
            Ok(signature) => Some(signature),
            Err(e) => {
                warn!(error = %e, "Signature generation failed");
                None
            }
        }
    }

    pub fn try_build(&self, bytes: &[u8]) -> Result<Signature> {
        let digest = ContentDigest::of(bytes);

        if let Some(signature) = self.cache.get(&digest) {
            debug!(digest = %digest, "Using cached signature");
            return Ok(signature);
        }

        let signature = Signature::from_bytes(bytes)?;
        self.cache.put(digest, signature.clone());
        debug!(digest = %digest, "Signature generated and cached");

        Ok(signature)
    }

    /// [`SignatureBuilder::build`] with decoding and extraction on the
    /// blocking thread pool. Cache hits never leave the caller's task.
    pub async fn build_blocking(&self, bytes: Vec<u8>) -> Option<Signature> {
        match self.try_build_blocking(bytes).await {
            Ok(signature) => Some(signature),
            Err(e) => {
                warn!(error = %e, "Signature generation failed");
                None
            }
        }
    }

    pub async fn try_build_blocking(&self, bytes: Vec<u8>) -> Result<Signature> {
        let digest = ContentDigest::of(&bytes);

        if let Some(signature) = self.cache.get(&digest) {
            debug!(digest = %digest, "Using cached signature");
            return Ok(signature);
        }

        let span = Span::current();
        let signature =
            tokio::task::spawn_blocking(move || span.in_scope(|| Signature::from_bytes(&bytes)))
                .await??;
        self.cache.put(digest, signature.clone());
        debug!(digest = %digest, "Signature generated and cached");

        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BoundedCache;
    use image::{ImageBuffer, Rgb, RgbImage};
    use std::io::Cursor;

    fn gradient_png(size: u32) -> Vec<u8> {
        let img: RgbImage = ImageBuffer::from_fn(size, size, |x, y| {
            let r = ((x as f32 / size as f32) * 255.0) as u8;
            let g = ((y as f32 / size as f32) * 255.0) as u8;
            let pattern = if (x / 16 + y / 16) % 2 == 0 { 40 } else { 0 };
            Rgb([r.saturating_add(pattern), g, 90])
        });
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_content_digest_is_sha3_256() {
        let digest = ContentDigest::of(b"");
        assert_eq!(
            digest.to_string(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn test_signature_shape() {
        let signature = Signature::from_bytes(&gradient_png(128)).unwrap();
        assert_eq!(signature.hashes.simple_hash.len(), 64);
        assert_eq!(signature.hashes.enhanced_hash.len(), 256);
        assert_eq!(signature.hashes.dct_hash.len(), 64);
        assert!(signature.validate().is_ok());
    }

    #[test]
    fn test_identical_bytes_identical_signature() {
        let bytes = gradient_png(96);
        let a = Signature::from_bytes(&bytes).unwrap();
        let b = Signature::from_bytes(&bytes).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_builder_caches_by_digest() {
        let builder = SignatureBuilder::new();
        let bytes = gradient_png(64);

        let first = builder.build(&bytes).expect("signature");
        assert_eq!(builder.cache().len(), 1);

        let second = builder.build(&bytes).expect("cached signature");
        assert_eq!(first, second);
        assert_eq!(builder.cache().len(), 1);
    }

    #[test]
    fn test_builder_returns_none_on_garbage() {
        let builder = SignatureBuilder::with_cache(BoundedCache::new(4));
        assert!(builder.build(&[0u8; 512]).is_none());
        assert!(builder.cache().is_empty());

        let err = builder.try_build(b"not an image").unwrap_err();
        assert!(matches!(err, LookalikeError::Decode(_)));
    }

    #[tokio::test]
    async fn test_blocking_build_shares_the_cache() {
        let builder = SignatureBuilder::new();
        let bytes = gradient_png(64);

        let offloaded = builder.build_blocking(bytes.clone()).await.expect("signature");
        assert_eq!(builder.cache().len(), 1);
        assert_eq!(builder.build(&bytes), Some(offloaded));
        assert_eq!(builder.cache().len(), 1);

        assert!(builder.build_blocking(vec![0u8; 512]).await.is_none());
        let err = builder
            .try_build_blocking(b"not an image".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, LookalikeError::Decode(_)));
    }

    #[test]
    fn test_json_roundtrip_is_lossless() {
        let signature = Signature::from_bytes(&gradient_png(80)).unwrap();
        let json = serde_json::to_string(&signature).unwrap();
        assert!(json.contains("\"simpleHash\""));
        assert!(json.contains("\"colorHistogram\""));

        let restored: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, signature);
    }

    #[test]
    fn test_json_float_bits_survive() {
        // Parses 1 ULP off without exact float parsing.
        let texture = TextureMetrics {
            variance: 1234.5678901234567,
            contrast: 0.4870577523413112,
            mean: 127.00000000000001,
        };
        let json = serde_json::to_string(&texture).unwrap();
        let restored: TextureMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.contrast.to_bits(), texture.contrast.to_bits());
        assert_eq!(restored.variance.to_bits(), texture.variance.to_bits());
        assert_eq!(restored.mean.to_bits(), texture.mean.to_bits());
    }

    #[test]
    fn test_legacy_hash_group_key_accepted() {
        let signature = Signature::from_bytes(&gradient_png(80)).unwrap();
        let json = serde_json::to_string(&signature)
            .unwrap()
            .replace("\"hashes\"", "\"enhancedHash\"");

        let restored: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.hashes, signature.hashes);
    }

    #[test]
    fn test_average_of_one_is_identity() {
        let signature = Signature::from_bytes(&gradient_png(64)).unwrap();
        let average = Signature::average(std::slice::from_ref(&signature)).unwrap();
        assert_eq!(average, signature);
        assert!(Signature::average(&[]).is_none());
    }

    #[test]
    fn test_average_uses_majority_vote() {
        let base = Signature::from_bytes(&gradient_png(64)).unwrap();
        let mut a = base.clone();
        let mut b = base.clone();
        let mut c = base.clone();
        a.hashes.simple_hash = BitHash::from_bit_string(&"1".repeat(64)).unwrap();
        b.hashes.simple_hash = BitHash::from_bit_string(&"1".repeat(64)).unwrap();
        c.hashes.simple_hash = BitHash::from_bit_string(&"0".repeat(64)).unwrap();
        a.texture_metrics.variance = 10.0;
        b.texture_metrics.variance = 20.0;
        c.texture_metrics.variance = 30.0;

        let average = Signature::average(&[a, b, c]).unwrap();
        assert_eq!(average.hashes.simple_hash.count_ones(), 64);
        assert!((average.texture_metrics.variance - 20.0).abs() < 1e-9);
        assert_eq!(average.hashes.dct_hash, base.hashes.dct_hash);
    }
}
