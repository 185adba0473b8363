//! Runtime configuration: defaults, then environment, then flags.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use lookalike_core::{HttpSourceConfig, MatcherConfig, DEFAULT_TOP_N};

pub const DEFAULT_CORPUS: &str = "lookalike-corpus.cbor";
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub corpus: PathBuf,
    pub top_n: usize,
    pub cache_capacity: usize,
    pub matcher: MatcherConfig,
    pub http: HttpSourceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from(DEFAULT_CORPUS),
            top_n: DEFAULT_TOP_N,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            matcher: MatcherConfig::default(),
            http: HttpSourceConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            matcher: MatcherConfig::from_env()?,
            http: HttpSourceConfig::from_env(),
            ..Self::default()
        };

        if let Some(corpus) = std::env::var_os("LOOKALIKE_CORPUS") {
            config.corpus = PathBuf::from(corpus);
        }
        if let Some(top_n) = parse_env("LOOKALIKE_TOP_N")? {
            config.top_n = top_n;
        }
        if let Some(capacity) = parse_env("LOOKALIKE_CACHE_CAPACITY")? {
            config.cache_capacity = capacity;
        }

        Ok(config)
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {name}: {raw}")),
        Err(_) => Ok(None),
    }
}
