//! Compare command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use lookalike_core::{ConfidenceLevel, SimilarityBreakdown};
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::utils::{build_acquirer, build_signer, confidence_label, format_percent, sign_input};
use crate::OutputFormat;

/// Execute the compare command.
pub async fn execute(
    config: &Config,
    first: String,
    second: String,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let acquirer = build_acquirer(config)?;
    let signer = build_signer(config);

    let a = sign_input(&acquirer, &signer, &first).await?;
    let b = sign_input(&acquirer, &signer, &second).await?;

    let breakdown = SimilarityBreakdown::between(&a, &b);
    let similarity = breakdown.weighted(&config.matcher.weights);
    let confidence = if similarity >= config.matcher.similarity_floor {
        ConfidenceLevel::classify(similarity)
    } else {
        ConfidenceLevel::NoMatch
    };
    info!(similarity, confidence = %confidence, "Images compared");

    if quiet {
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let report = json!({
                "similarity": similarity,
                "confidenceLevel": confidence,
                "breakdown": breakdown,
            });
            let out = serde_json::to_string_pretty(&report)
                .context("Failed to serialize comparison")?;
            println!("{out}");
        }
        OutputFormat::Text => {
            println!();
            println!(
                "   {} {}  {}",
                "Similarity:".dimmed(),
                format_percent(similarity).bold(),
                confidence_label(confidence)
            );
            println!();
            let rows = [
                ("Simple hash", breakdown.simple_hash),
                ("Enhanced hash", breakdown.enhanced_hash),
                ("DCT hash", breakdown.dct_hash),
                ("Color", breakdown.color),
                ("Edges", breakdown.edges),
                ("Brightness", breakdown.brightness),
                ("Texture", breakdown.texture),
            ];
            for (name, value) in rows {
                println!("   {:<14} {}", format!("{name}:").dimmed(), format_percent(value));
            }
        }
    }

    Ok(())
}
