//! Lookalike CLI - perceptual image signatures and similarity search.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod exit_codes;
mod source;
mod utils;

use config::Config;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success (including searches without a match)
  1   General error
  64  Invalid configuration or arguments
  65  Input is not a usable image
  66  Cannot read input file or corpus
  69  Image host unreachable or failing
  74  Cannot write corpus";

#[derive(Parser)]
#[command(name = "lookalike")]
#[command(author, version, about = "Perceptual image signatures and similarity search", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true, action = ArgAction::SetTrue, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value = "auto")]
    color: ColorChoice,

    /// Corpus snapshot file (defaults to $LOOKALIKE_CORPUS or lookalike-corpus.cbor)
    #[arg(long, global = true, value_name = "PATH")]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the signature of an image file or URL
    Sign {
        /// Image path or http(s) URL
        #[arg(value_name = "IMAGE")]
        image: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Score the similarity of two images
    Compare {
        #[arg(value_name = "IMAGE_A")]
        first: String,

        #[arg(value_name = "IMAGE_B")]
        second: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a profile and its images to the corpus
    Ingest {
        /// Identifier of the profile in its source feed
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,

        /// Image paths or http(s) URLs
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<String>,

        /// Display name (defaults to the external id)
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        age: Option<u32>,

        /// Distance in miles
        #[arg(long)]
        distance: Option<u32>,

        /// Give up on an image after this many seconds, retries included
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Find the corpus images most similar to an image
    Search {
        #[arg(value_name = "IMAGE")]
        image: String,

        /// Maximum number of matches (defaults to $LOOKALIKE_TOP_N or 3)
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Minimum similarity for a match (defaults to $LOOKALIKE_SIMILARITY_FLOOR or 0.70)
        #[arg(long)]
        floor: Option<f64>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(colored::control::SHOULD_COLORIZE.should_colorize())
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(corpus) = cli.corpus {
        config.corpus = corpus;
    }
    let quiet = cli.quiet;

    match cli.command {
        Commands::Sign { image, format } => {
            commands::sign::execute(&config, image, format, quiet).await
        }
        Commands::Compare {
            first,
            second,
            format,
        } => commands::compare::execute(&config, first, second, format, quiet).await,
        Commands::Ingest {
            external_id,
            images,
            name,
            age,
            distance,
            deadline,
            format,
        } => {
            let request = commands::ingest::IngestRequest {
                external_id,
                images,
                name,
                age,
                distance,
                deadline,
            };
            commands::ingest::execute(&config, request, format, quiet).await
        }
        Commands::Search {
            image,
            top,
            floor,
            format,
        } => {
            if let Some(top) = top {
                config.top_n = top;
            }
            if let Some(floor) = floor {
                config.matcher.similarity_floor = floor;
            }
            commands::search::execute(&config, image, format, quiet).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(()) => ExitCode::success(),
        Err(e) => ExitCode::from_anyhow(&e),
    };
    if let Some(message) = exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}
