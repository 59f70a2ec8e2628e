use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const TOKEN_ENV: &str = "APIFY_TOKEN";
pub const API_BASE_ENV: &str = "APIFY_API_URL";
pub const DEFAULT_API_BASE: &str = "https://api.apify.com";

pub const LISTING_BASE_URL: &str =
    "https://www.enfsolar.com/directory/installer/United%20States";
pub const TOTAL_LISTING_PAGES: u32 = 84;

/// Configuration problems abort before any work happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("APIFY_TOKEN environment variable is not set")]
    MissingToken,
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

/// Everything a run needs, resolved once in `main` and passed down; no
/// component reads the environment on its own.
pub struct Config {
    pub store_path: PathBuf,
    pub summary_path: PathBuf,
    pub api_base: String,
    token: Option<String>,
    pub poll_interval: Duration,
    pub chunk_pause: Duration,
}

impl Config {
    pub fn from_env(store_path: PathBuf, summary_path: Option<PathBuf>) -> Self {
        let summary_path = summary_path.unwrap_or_else(|| {
            store_path.with_file_name("enf_enrich_summary.txt")
        });
        Self {
            store_path,
            summary_path,
            api_base: std::env::var(API_BASE_ENV)
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            poll_interval: Duration::from_secs(5),
            chunk_pause: Duration::from_secs(2),
        }
    }

    /// The bearer credential for the actor platform; required by any
    /// subcommand that submits jobs.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token.as_deref().ok_or(ConfigError::MissingToken)
    }

    /// Where the pre-enrichment backup copy goes.
    pub fn backup_path(&self) -> PathBuf {
        let stem = self
            .store_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        self.store_path
            .with_file_name(format!("{stem}_backup.csv"))
    }
}

pub fn validate_chunk_size(size: usize) -> Result<usize, ConfigError> {
    if size == 0 {
        Err(ConfigError::ZeroChunkSize)
    } else {
        Ok(size)
    }
}

// ── Tests ──
