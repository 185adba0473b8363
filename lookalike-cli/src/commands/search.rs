//! Search command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use lookalike_core::Matcher;
use tracing::info;

use crate::config::Config;
use crate::utils::{
    build_acquirer, build_signer, confidence_label, format_percent, load_corpus, sign_input,
};
use crate::OutputFormat;

/// Execute the search command.
pub async fn execute(config: &Config, image: String, format: OutputFormat, quiet: bool) -> Result<()> {
    let repository = Arc::new(load_corpus(&config.corpus)?);
    let matcher = Matcher::with_config(repository, config.matcher)?;

    let acquirer = build_acquirer(config)?;
    let signer = build_signer(config);
    let query = sign_input(&acquirer, &signer, &image).await?;

    let result = matcher
        .find_best_matches(Some(&query), config.top_n)
        .await
        .context("Search failed")?;
    info!(
        matches = result.matches.len(),
        confidence = %result.confidence_level,
        "Search complete"
    );

    if quiet {
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            println!();
            if result.matches.is_empty() {
                println!("{}", "No match".red().bold());
                println!();
                println!(
                    "   {} below {} similarity",
                    "Every corpus image scored".dimmed(),
                    format_percent(matcher.similarity_floor())
                );
                return Ok(());
            }

            println!(
                "{} {}",
                "Best match confidence:".bold(),
                confidence_label(result.confidence_level)
            );
            println!();
            for (rank, found) in result.matches.iter().enumerate() {
                let profile = &found.profile;
                let mut details = Vec::new();
                if let Some(age) = profile.age {
                    details.push(format!("{age}"));
                }
                if let Some(distance) = profile.distance {
                    details.push(format!("{distance} mi"));
                }
                println!(
                    "   {}. {} {} {}",
                    rank + 1,
                    profile.name.bold(),
                    format!("({})", profile.external_id).dimmed(),
                    details.join(", ")
                );
                println!(
                    "      {} {}  {}",
                    format_percent(found.similarity),
                    confidence_label(found.confidence_level),
                    found.image.url.dimmed()
                );
            }
        }
    }

    Ok(())
}
