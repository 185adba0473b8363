//! Example demonstrating acquisition tracing instrumentation.
//!
//! Run with: cargo run -p lookalike-core --example acquire_tracing -- <image-url>

use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use lookalike_core::{Acquirer, HttpByteSource, HttpSourceConfig, RetryPolicy, Signature};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("lookalike_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://picsum.photos/id/64/600/800".to_string());

    println!("=== Acquisition Tracing Demo ===\n");

    let config = HttpSourceConfig {
        timeout: Duration::from_secs(15),
        ..HttpSourceConfig::default()
    };
    let source = match HttpByteSource::with_config(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    let acquirer = Acquirer::new(source, RetryPolicy::default());

    println!("Fetching {url}...\n");

    match acquirer.acquire(&url).await {
        Ok(acquired) => {
            println!("\nDownloaded after {} attempt(s)", acquired.attempts);
            println!("   Canonical bytes: {}", acquired.bytes.len());
            match Signature::from_bytes(&acquired.bytes) {
                Ok(signature) => println!("   Simple hash:     {}", signature.hashes.simple_hash.to_hex()),
                Err(e) => println!("   Signing failed:  {}", e),
            }
        }
        Err(e) => {
            println!("\nFailed: {}", e);
        }
    }
}
