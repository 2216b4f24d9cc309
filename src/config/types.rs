use crate::render::Locator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for one site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub listing: ListingConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    pub fields: FieldsConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Which rendering backend drives the crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Served HTML parsed without script execution
    #[default]
    Static,
    /// Headless Chrome (requires the `browser` feature)
    Browser,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of records to collect before stopping
    pub target_count: usize,

    /// Rendering sessions extracting in parallel (1 = sequential)
    pub workers: usize,

    pub backend: Backend,

    /// Wait for the record's root element on a detail page (milliseconds)
    pub root_wait_ms: u64,

    /// Wait per fallback strategy of a record field (milliseconds)
    pub field_wait_ms: u64,

    /// Wait for item links on a listing page (milliseconds)
    pub listing_wait_ms: u64,

    /// Wait for the first reply container (milliseconds)
    pub reply_wait_ms: u64,

    /// Wait per fallback strategy of a reply field (milliseconds)
    pub reply_field_wait_ms: u64,

    /// Interval between two evaluations of a locator (milliseconds)
    pub poll_interval_ms: u64,

    /// Pause after each navigation before querying (milliseconds)
    pub page_settle_ms: u64,

    /// Consecutive navigation failures after which the run is aborted
    pub max_consecutive_failures: u32,

    /// Sort completed records by discovery order when workers > 1
    pub sort_by_discovery: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            target_count: 100,
            workers: 1,
            backend: Backend::Static,
            root_wait_ms: 25_000,
            field_wait_ms: 10_000,
            listing_wait_ms: 20_000,
            reply_wait_ms: 15_000,
            reply_field_wait_ms: 3_000,
            poll_interval_ms: 250,
            page_settle_ms: 0,
            max_consecutive_failures: 10,
            sort_by_discovery: true,
        }
    }
}

/// How listing pages follow each other
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "kebab-case")]
pub enum Pagination {
    /// Page 1 is the base URL, page n is `{base}/{n}/`
    PathSegment,
    /// Page n is `{base}?{name}={n}`
    QueryParam { name: String },
    /// One page that loads more items when scrolled to the end
    Scroll {
        #[serde(rename = "max-scrolls", default = "default_max_scrolls")]
        max_scrolls: u32,
    },
    /// One page, no pagination
    #[default]
    Single,
}

fn default_max_scrolls() -> u32 {
    10
}

/// Where candidate item URLs come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ListingConfig {
    /// First listing page
    pub base_url: Option<String>,

    pub pagination: Pagination,

    /// Explicit item URLs, used instead of listing pages
    pub urls: Vec<String>,

    /// JSON file holding an array of item URLs
    pub urls_file: Option<PathBuf>,

    /// Fallback locators for item link elements
    pub item_locators: Vec<Locator>,

    /// Attribute holding the link or identifier
    pub url_attribute: Option<String>,

    /// Template turning an attribute value into a URL (`{value}`)
    pub url_template: Option<String>,

    /// Pattern a candidate URL must match
    pub item_url_pattern: Option<String>,

    /// Host allow-list (`*.example.com` wildcards)
    pub allowed_domains: Vec<String>,

    /// Maximum listing rounds
    pub max_pages: Option<u32>,
}

impl ListingConfig {
    pub fn url_attribute(&self) -> &str {
        self.url_attribute.as_deref().unwrap_or("href")
    }
}

/// How identifiers and authors are derived from item URLs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IdentityConfig {
    /// Pattern with a group `id` (or group 1); last path segment when absent
    pub id_pattern: Option<String>,

    /// Pattern with a group `author` (or group 1)
    pub author_pattern: Option<String>,

    /// Prefix prepended to authors taken from the URL
    pub author_prefix: Option<String>,
}

/// Fallback locators of the record fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldsConfig {
    /// The record's root element; may reference `{id}`
    pub root: Vec<Locator>,

    #[serde(default)]
    pub author: Vec<Locator>,

    /// Prefixes removed from located author text (e.g. "ID:")
    #[serde(default)]
    pub author_strip: Vec<String>,

    #[serde(default)]
    pub body: Vec<Locator>,

    #[serde(default)]
    pub timestamp: Vec<Locator>,

    #[serde(default)]
    pub timestamp_attribute: Option<String>,

    /// chrono `strftime` formats, tried in order
    #[serde(default = "default_timestamp_formats")]
    pub timestamp_formats: Vec<String>,
}

impl FieldsConfig {
    pub fn timestamp_attribute(&self) -> &str {
        self.timestamp_attribute.as_deref().unwrap_or("datetime")
    }
}

fn default_timestamp_formats() -> Vec<String> {
    crate::normalize::DEFAULT_TIMESTAMP_FORMATS
        .iter()
        .map(|f| f.to_string())
        .collect()
}

/// Reply collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RepliesConfig {
    /// Locators of reply container elements; all are merged
    pub containers: Vec<Locator>,

    /// Attributes identifying a reply, first present wins
    pub id_attributes: Vec<String>,

    pub author: Vec<Locator>,
    pub body: Vec<Locator>,
    pub timestamp: Vec<Locator>,

    /// Patterns over a reply's markup whose group 1 is the like count
    pub like_patterns: Vec<String>,
}

/// Suffix substitution turning a thumbnail URL into the full-size one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewrite {
    pub from: String,
    pub to: String,
}

/// Media collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MediaConfig {
    /// Pattern over serialized markup whose group 1 is a media URL
    pub url_pattern: Option<String>,

    pub rewrites: Vec<Rewrite>,
}

/// Ordered patterns per interaction metric, run over the whole page markup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MetricsConfig {
    pub likes: Vec<String>,
    pub reposts: Vec<String>,
    pub quotes: Vec<String>,
    pub views: Vec<String>,
}

/// Disqualification filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    /// Records younger than this many days are dropped
    pub min_age_days: Option<i64>,

    /// Records with fewer replies are dropped
    pub min_replies: usize,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub backoff_max_secs: u64,
    pub retry_statuses: Vec<u16>,
    pub retry_methods: Vec<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 0.5,
            backoff_max_secs: 120,
            retry_statuses: vec![500, 502, 503, 504],
            retry_methods: vec!["GET".to_string(), "POST".to_string()],
            timeout_secs: 10,
            connect_timeout_secs: 10,
            user_agent: format!("thread-sift/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory the dumps are written to
    pub directory: PathBuf,

    /// File name prefix, e.g. "gab_data"
    pub prefix: String,
}

/// OCR enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OcrConfig {
    pub tesseract_path: PathBuf,
    pub language: String,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            concurrency: 4,
            timeout_secs: 60,
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,

    /// Page opened before crawling so an operator can sign in
    pub login_url: Option<String>,
    pub login_wait_secs: u64,

    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window_width: 1920,
            window_height: 1080,
            login_url: None,
            login_wait_secs: 90,
            user_agent: None,
        }
    }
}
