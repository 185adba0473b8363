//! Similarity scoring between two signatures.
//!
//! The score is a fixed weighted sum of seven per-feature similarities, each
//! in [0, 1]. Hashes compare by fraction of matching bits, histograms and
//! brightness profiles by cosine similarity, scalar metrics by bounded
//! difference.
//!
//! The default weights and the texture scales are empirical constants that
//! have not been calibrated against a labelled dataset. They are exposed as
//! configuration so they can be tuned without touching the scoring code.

use serde::{Deserialize, Serialize};

use crate::error::{LookalikeError, Result};
use crate::signature::Signature;

/// Variance difference at which texture variance similarity reaches 0.
pub const TEXTURE_VARIANCE_SCALE: f64 = 15_000.0;

/// Contrast difference at which texture contrast similarity reaches 0.
pub const TEXTURE_CONTRAST_SCALE: f64 = 255.0;

/// Tolerance used when checking that weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Weight of each per-feature similarity in the final score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityWeights {
    pub simple_hash: f64,
    pub enhanced_hash: f64,
    pub dct_hash: f64,
    pub color: f64,
    pub edges: f64,
    pub brightness: f64,
    pub texture: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            simple_hash: 0.20,
            enhanced_hash: 0.20,
            dct_hash: 0.15,
            color: 0.20,
            edges: 0.10,
            brightness: 0.10,
            texture: 0.05,
        }
    }
}

impl SimilarityWeights {
    fn as_array(&self) -> [f64; 7] {
        [
            self.simple_hash,
            self.enhanced_hash,
            self.dct_hash,
            self.color,
            self.edges,
            self.brightness,
            self.texture,
        ]
    }

    pub fn total(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Weights must be non-negative and sum to 1.
    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(LookalikeError::Config(format!(
                "Similarity weights must be non-negative: {self:?}"
            )));
        }
        let total = self.total();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(LookalikeError::Config(format!(
                "Similarity weights must sum to 1.0, got {total}"
            )));
        }
        Ok(())
    }
}

/// Per-feature similarities between two signatures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityBreakdown {
    pub simple_hash: f64,
    pub enhanced_hash: f64,
    pub dct_hash: f64,
    pub color: f64,
    pub edges: f64,
    pub brightness: f64,
    pub texture: f64,
}

impl SimilarityBreakdown {
    pub fn between(a: &Signature, b: &Signature) -> Self {
        let color = {
            let channels_a = a.color_histogram.channels();
            let channels_b = b.color_histogram.channels();
            channels_a
                .iter()
                .zip(channels_b.iter())
                .map(|(x, y)| cosine_similarity(&x[..], &y[..]))
                .sum::<f64>()
                / channels_a.len() as f64
        };

        let texture = {
            let ta = &a.texture_metrics;
            let tb = &b.texture_metrics;
            let variance = bounded_similarity(ta.variance, tb.variance, TEXTURE_VARIANCE_SCALE);
            let contrast = bounded_similarity(ta.contrast, tb.contrast, TEXTURE_CONTRAST_SCALE);
            (variance + contrast) / 2.0
        };

        Self {
            simple_hash: a.hashes.simple_hash.matching_fraction(&b.hashes.simple_hash),
            enhanced_hash: a
                .hashes
                .enhanced_hash
                .matching_fraction(&b.hashes.enhanced_hash),
            dct_hash: a.hashes.dct_hash.matching_fraction(&b.hashes.dct_hash),
            color,
            edges: bounded_similarity(a.edge_density.density, b.edge_density.density, 1.0),
            brightness: cosine_similarity(&a.brightness_profile, &b.brightness_profile),
            texture,
        }
    }

    /// Weighted sum of the components, clamped to [0, 1].
    pub fn weighted(&self, weights: &SimilarityWeights) -> f64 {
        let total = weights.simple_hash * self.simple_hash
            + weights.enhanced_hash * self.enhanced_hash
            + weights.dct_hash * self.dct_hash
            + weights.color * self.color
            + weights.edges * self.edges
            + weights.brightness * self.brightness
            + weights.texture * self.texture;
        total.clamp(0.0, 1.0)
    }
}

/// Scores signature pairs with a fixed weight vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    weights: SimilarityWeights,
}

impl Scorer {
    pub fn new(weights: SimilarityWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &SimilarityWeights {
        &self.weights
    }

    /// Similarity in [0, 1]. Symmetric, and 1 for a signature against itself
    /// unless its brightness profile is all zeros: a zero-norm profile has
    /// no cosine, so that component contributes 0.
    pub fn score(&self, a: &Signature, b: &Signature) -> f64 {
        SimilarityBreakdown::between(a, b).weighted(&self.weights)
    }
}

/// Score two possibly-absent signatures with the default weights.
///
/// An absent side scores 0.
pub fn score(a: Option<&Signature>, b: Option<&Signature>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => Scorer::default().score(a, b),
        _ => 0.0,
    }
}

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0 when the lengths differ, the vectors are empty, or either norm
/// is zero.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// `1 - min(1, |a - b| / scale)`, floored at 0.
fn bounded_similarity(a: f64, b: f64, scale: f64) -> f64 {
    (1.0 - ((a - b).abs() / scale).min(1.0)).max(0.0)
}
