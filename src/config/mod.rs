//! Configuration module for Thread-Sift
//!
//! One TOML file describes one site: where candidate URLs come from, the
//! ordered fallback locators of every field, metric and media patterns,
//! disqualification filters, retry policy, output location and OCR settings.
//!
//! # Example
//!
//! ```no_run
//! use thread_sift::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("configs/4plebs.toml")).unwrap();
//! println!("Collecting {} records", config.crawler.target_count);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Backend, BrowserConfig, Config, CrawlerConfig, FetchConfig, FieldsConfig, FilterConfig,
    IdentityConfig, ListingConfig, MediaConfig, MetricsConfig, OcrConfig, OutputConfig,
    Pagination, RepliesConfig, Rewrite,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub(crate) use validation::compile_pattern;
