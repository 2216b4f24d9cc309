use crate::config::types::{
    Config, CrawlerConfig, FetchConfig, FieldsConfig, ListingConfig, OcrConfig, OutputConfig,
    Pagination, RepliesConfig,
};
use crate::render::Locator;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Methods accepted in `fetch.retry-methods`
const KNOWN_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "PATCH"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_listing_config(&config.listing)?;
    validate_identity_patterns(config)?;
    validate_fields_config(&config.fields)?;
    validate_replies_config(&config.replies)?;
    validate_media_and_metrics(config)?;
    validate_fetch_config(&config.fetch)?;
    validate_output_config(&config.output)?;
    validate_ocr_config(&config.ocr)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.target_count < 1 {
        return Err(ConfigError::Validation(
            "target-count must be >= 1".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > 32 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 32, got {}",
            config.workers
        )));
    }

    if config.poll_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "poll-interval-ms must be >= 10ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "max-consecutive-failures must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    let has_list = !config.urls.is_empty() || config.urls_file.is_some();

    match (&config.base_url, has_list) {
        (None, false) => {
            return Err(ConfigError::Validation(
                "listing needs a base-url, urls or urls-file".to_string(),
            ))
        }
        (Some(base), _) => {
            validate_http_url(base, "listing.base-url")?;
            if config.item_locators.is_empty() && !has_list {
                return Err(ConfigError::Validation(
                    "listing.item-locators cannot be empty when crawling listing pages"
                        .to_string(),
                ));
            }
        }
        (None, true) => {}
    }

    for url in &config.urls {
        validate_http_url(url, "listing.urls")?;
    }

    if let Pagination::QueryParam { name } = &config.pagination {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "query-param pagination needs a parameter name".to_string(),
            ));
        }
    }

    if let Some(template) = &config.url_template {
        if !template.contains("{value}") {
            return Err(ConfigError::Validation(format!(
                "url-template '{}' must contain {{value}}",
                template
            )));
        }
        validate_http_url(&template.replace("{value}", "0"), "listing.url-template")?;
    }

    if let Some(pattern) = &config.item_url_pattern {
        compile_pattern(pattern, "listing.item-url-pattern", false)?;
    }

    for domain in &config.allowed_domains {
        validate_domain_pattern(domain)?;
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages must be >= 1 when set".to_string(),
        ));
    }

    validate_locators(&config.item_locators, "listing.item-locators")
}

fn validate_identity_patterns(config: &Config) -> Result<(), ConfigError> {
    if let Some(pattern) = &config.identity.id_pattern {
        compile_pattern(pattern, "identity.id-pattern", true)?;
    }
    if let Some(pattern) = &config.identity.author_pattern {
        compile_pattern(pattern, "identity.author-pattern", true)?;
    }
    Ok(())
}

fn validate_fields_config(config: &FieldsConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation(
            "fields.root needs at least one locator".to_string(),
        ));
    }

    if config.timestamp_formats.is_empty() {
        return Err(ConfigError::Validation(
            "fields.timestamp-formats cannot be empty".to_string(),
        ));
    }

    validate_locators(&config.root, "fields.root")?;
    validate_locators(&config.author, "fields.author")?;
    validate_locators(&config.body, "fields.body")?;
    validate_locators(&config.timestamp, "fields.timestamp")
}

fn validate_replies_config(config: &RepliesConfig) -> Result<(), ConfigError> {
    validate_locators(&config.containers, "replies.containers")?;
    validate_locators(&config.author, "replies.author")?;
    validate_locators(&config.body, "replies.body")?;
    validate_locators(&config.timestamp, "replies.timestamp")?;

    for pattern in &config.like_patterns {
        compile_pattern(pattern, "replies.like-patterns", true)?;
    }

    Ok(())
}

fn validate_media_and_metrics(config: &Config) -> Result<(), ConfigError> {
    if let Some(pattern) = &config.media.url_pattern {
        compile_pattern(pattern, "media.url-pattern", true)?;
    }

    for rewrite in &config.media.rewrites {
        if rewrite.from.is_empty() {
            return Err(ConfigError::Validation(
                "media.rewrites entries need a non-empty 'from'".to_string(),
            ));
        }
    }

    let metrics = &config.metrics;
    for (name, patterns) in [
        ("metrics.likes", &metrics.likes),
        ("metrics.reposts", &metrics.reposts),
        ("metrics.quotes", &metrics.quotes),
        ("metrics.views", &metrics.views),
    ] {
        for pattern in patterns {
            compile_pattern(pattern, name, true)?;
        }
    }

    if let Some(days) = config.filters.min_age_days {
        if days < 0 {
            return Err(ConfigError::Validation(format!(
                "filters.min-age-days must be >= 0, got {}",
                days
            )));
        }
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if !config.backoff_factor.is_finite() || config.backoff_factor < 0.0 {
        return Err(ConfigError::Validation(format!(
            "fetch.backoff-factor must be a non-negative number, got {}",
            config.backoff_factor
        )));
    }

    for status in &config.retry_statuses {
        if !(100..=599).contains(status) {
            return Err(ConfigError::Validation(format!(
                "fetch.retry-statuses contains invalid status {}",
                status
            )));
        }
    }

    for method in &config.retry_methods {
        if !KNOWN_METHODS.contains(&method.to_uppercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "fetch.retry-methods contains unknown method '{}'",
                method
            )));
        }
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch.timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetch.user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output.directory cannot be empty".to_string(),
        ));
    }

    if config.prefix.is_empty() {
        return Err(ConfigError::Validation(
            "output.prefix cannot be empty".to_string(),
        ));
    }

    if config.prefix.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "output.prefix must be a plain file name prefix, got '{}'",
            config.prefix
        )));
    }

    Ok(())
}

fn validate_ocr_config(config: &OcrConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 {
        return Err(ConfigError::Validation(
            "ocr.concurrency must be >= 1".to_string(),
        ));
    }

    if config.language.trim().is_empty() {
        return Err(ConfigError::Validation(
            "ocr.language cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_locators(locators: &[Locator], field: &str) -> Result<(), ConfigError> {
    for locator in locators {
        locator
            .check()
            .map_err(|e| ConfigError::InvalidLocator(format!("{}: {}", field, e)))?;
    }
    Ok(())
}

fn validate_http_url(raw: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("{} '{}': {}", field, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, raw
        )));
    }

    Ok(())
}

/// Compiles a pattern, optionally requiring at least one capture group
pub(crate) fn compile_pattern(
    pattern: &str,
    field: &str,
    needs_group: bool,
) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", field, e)))?;

    if needs_group && regex.captures_len() < 2 {
        return Err(ConfigError::InvalidPattern(format!(
            "{}: '{}' needs a capture group",
            field, pattern
        )));
    }

    Ok(regex)
}

/// Validates a host pattern, optionally prefixed with `*.`
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let base = pattern.strip_prefix("*.").unwrap_or(pattern);

    if base.is_empty()
        || !base.contains('.')
        || base.starts_with('.')
        || base.ends_with('.')
        || base.contains('*')
    {
        return Err(ConfigError::Validation(format!(
            "Invalid domain pattern '{}'",
            pattern
        )));
    }

    Ok(())
}
