//! Ingest command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use lookalike_core::{Ingestor, NewProfile, Pipeline};
use tracing::info;

use crate::config::Config;
use crate::utils::{build_acquirer, build_signer, format_percent, load_corpus};
use crate::OutputFormat;

pub struct IngestRequest {
    pub external_id: String,
    pub images: Vec<String>,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub distance: Option<u32>,
    pub deadline: Option<u64>,
}

impl IngestRequest {
    fn to_profile(&self) -> NewProfile {
        let name = self.name.clone().unwrap_or_else(|| self.external_id.clone());
        let mut profile =
            NewProfile::new(self.external_id.clone(), name).with_images(self.images.iter().cloned());
        profile.age = self.age;
        profile.distance = self.distance;
        profile
    }
}

/// Execute the ingest command.
pub async fn execute(
    config: &Config,
    request: IngestRequest,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let repository = Arc::new(load_corpus(&config.corpus)?);

    let mut pipeline = Pipeline::new(build_acquirer(config)?, build_signer(config));
    if let Some(secs) = request.deadline {
        pipeline = pipeline.with_deadline(Duration::from_secs(secs));
    }
    let ingestor = Ingestor::new(pipeline, repository.clone());

    let report = ingestor.ingest_profile(&request.to_profile()).await?;

    repository
        .save(&config.corpus)
        .await
        .with_context(|| format!("Failed to write corpus: {}", config.corpus.display()))?;
    info!(
        corpus = %config.corpus.display(),
        profiles = repository.profile_count().await,
        images = repository.image_count().await,
        "Corpus updated"
    );

    if quiet {
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let status = if report.failed == 0 {
                "Profile ingested".green().bold()
            } else {
                "Profile ingested with failures".yellow().bold()
            };
            println!();
            println!("{status}");
            println!();
            println!("   {} {}", "Profile:".dimmed(), report.external_id);
            println!("   {} {}", "Id:".dimmed(), report.profile_id);
            println!(
                "   {} {}/{} ({})",
                "Images stored:".dimmed(),
                report.successful,
                report.total_images,
                format_percent(report.success_rate())
            );
            println!(
                "   {} {} over {} request(s)",
                "Download attempts:".dimmed(),
                report.download_stats.total_attempts,
                report.download_stats.requests
            );
            println!("   {} {}", "Corpus:".dimmed(), config.corpus.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_defaults_to_external_id() {
        let request = IngestRequest {
            external_id: "feed-9".into(),
            images: vec!["a.jpg".into(), "b.jpg".into()],
            name: None,
            age: Some(31),
            distance: None,
            deadline: None,
        };
        let profile = request.to_profile();
        assert_eq!(profile.name, "feed-9");
        assert_eq!(profile.age, Some(31));
        assert_eq!(profile.image_urls, vec!["a.jpg", "b.jpg"]);
    }
}
