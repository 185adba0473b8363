//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use lookalike_core::{
    Acquirer, BoundedCache, ConfidenceLevel, HttpByteSource, MemoryRepository, RetryPolicy,
    Signature, SignatureBuilder,
};
use tracing::debug;

use crate::config::Config;
use crate::source::InputSource;

pub fn build_acquirer(config: &Config) -> Result<Acquirer<InputSource>> {
    let http = HttpByteSource::with_config(config.http.clone())?;
    Ok(Acquirer::new(InputSource::new(http), RetryPolicy::default()))
}

pub fn build_signer(config: &Config) -> SignatureBuilder<BoundedCache> {
    SignatureBuilder::with_cache(BoundedCache::new(config.cache_capacity))
}

/// Acquire, normalize and sign one input, keeping the typed error.
pub async fn sign_input(
    acquirer: &Acquirer<InputSource>,
    signer: &SignatureBuilder<BoundedCache>,
    input: &str,
) -> Result<Signature> {
    let acquired = acquirer
        .acquire(input)
        .await
        .with_context(|| format!("Could not load image {input}"))?;
    debug!(input, attempts = acquired.attempts, "Acquired image");

    signer
        .try_build(&acquired.bytes)
        .with_context(|| format!("Could not sign image {input}"))
}

pub fn load_corpus(path: &Path) -> Result<MemoryRepository> {
    MemoryRepository::load(path)
        .with_context(|| format!("Failed to read corpus: {}", path.display()))
}

/// Confidence label colored by strength.
pub fn confidence_label(level: ConfidenceLevel) -> ColoredString {
    let label = level.as_str().to_uppercase();
    match level {
        ConfidenceLevel::VeryHigh | ConfidenceLevel::High => label.green().bold(),
        ConfidenceLevel::Medium => label.yellow().bold(),
        ConfidenceLevel::Low => label.yellow(),
        ConfidenceLevel::NoMatch => label.red(),
    }
}

pub fn format_percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.9512), "95.1%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(1.0), "100.0%");
    }

    #[test]
    fn test_confidence_label_text() {
        colored::control::set_override(false);
        assert_eq!(confidence_label(ConfidenceLevel::VeryHigh).to_string(), "VERY-HIGH");
        assert_eq!(confidence_label(ConfidenceLevel::NoMatch).to_string(), "NO-MATCH");
    }
}
