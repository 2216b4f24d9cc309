//! Thread-Sift: resilient extraction of forum threads from script-rendered pages
//!
//! This crate crawls paginated forum listings, extracts posts with their replies,
//! media and interaction counts through ordered fallback lookups, checkpoints every
//! completed record, and enriches attached images with recognized text.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod ocr;
pub mod output;
pub mod render;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Thread-Sift operations
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Rendering session error: {0}")]
    Session(#[from] render::SessionError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] output::CheckpointError),

    #[error("OCR error: {0}")]
    Ocr(#[from] ocr::OcrError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Thread-Sift operations
pub type Result<T> = std::result::Result<T, SiftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{InteractionCounts, Media, Record, Reply, Timestamp};
pub use normalize::{parse_magnitude, parse_timestamp};
pub use state::{CrawlPhase, CrawlState};
pub use url::{canonicalize_url, matches_wildcard};
