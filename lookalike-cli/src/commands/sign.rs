//! Sign command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use crate::config::Config;
use crate::utils::{build_acquirer, build_signer, sign_input};
use crate::OutputFormat;

/// Execute the sign command.
pub async fn execute(config: &Config, image: String, format: OutputFormat, quiet: bool) -> Result<()> {
    let acquirer = build_acquirer(config)?;
    let signer = build_signer(config);

    let signature = sign_input(&acquirer, &signer, &image).await?;
    info!(input = %image, "Signature computed");

    if quiet {
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&signature)
                .context("Failed to serialize signature")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let hashes = &signature.hashes;
            println!();
            println!("{} {}", "Signature of".bold(), image.cyan());
            println!();
            println!("   {} {}", "Simple hash:".dimmed(), hashes.simple_hash.to_hex());
            println!("   {} {}", "Enhanced hash:".dimmed(), hashes.enhanced_hash.to_hex());
            println!("   {} {}", "DCT hash:".dimmed(), hashes.dct_hash.to_hex());
            println!(
                "   {} {:.4} ({} edge pixels)",
                "Edge density:".dimmed(),
                signature.edge_density.density,
                signature.edge_density.total_edges
            );
            let [tl, tr, bl, br] = signature.brightness_profile;
            println!(
                "   {} {tl:.1} / {tr:.1} / {bl:.1} / {br:.1}",
                "Brightness:".dimmed()
            );
            let texture = &signature.texture_metrics;
            println!(
                "   {} variance {:.1}, contrast {:.2}, mean {:.1}",
                "Texture:".dimmed(),
                texture.variance,
                texture.contrast,
                texture.mean
            );
        }
    }

    Ok(())
}
