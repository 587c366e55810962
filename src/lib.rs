//! Skill-Harvester: vacancy skill statistics collector
//!
//! This crate periodically harvests job-vacancy listings from an upstream
//! vacancy-search API for a configured set of professions, extracts a skill
//! frequency profile from each listing's tags and free-text description, and
//! persists per-profession, per-session skill statistics.

pub mod api;
pub mod cache;
pub mod config;
pub mod extractor;
pub mod report;
pub mod scraper;
pub mod storage;

use thiserror::Error;

/// Main error type for Skill-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authorization failure: {0}")]
    AuthFailure(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Fetch failed for {url} (status {status:?}): {cause}")]
    FetchFailed {
        url: String,
        status: Option<u16>,
        cause: String,
    },

    #[error("No vacancies found for query '{query}'")]
    NoResults { query: String },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Cache error: {0}")]
    Cache(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Skill-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use extractor::extract_skills;
pub use scraper::{ProfessionStatus, RunReport, ScrapeOrchestrator};
