//! Candidate URL discovery
//!
//! Visits listing pages (or a fixed URL list) one round at a time and feeds
//! the crawl state's frontier with canonical, de-duplicated item URLs.

use crate::config::{compile_pattern, Config, ListingConfig, Pagination};
use crate::extract::{resolve, Identity, Resolution};
use crate::render::{RenderSession, Scope, SessionError};
use crate::state::CrawlState;
use crate::url::{canonicalize_url, host_allowed, resolve_candidate};
use crate::ConfigError;
use regex::Regex;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Produces candidate item URLs for the crawl frontier
#[derive(Debug, Clone)]
pub struct Discoverer {
    listing: ListingConfig,
    identity: Identity,
    item_pattern: Option<Regex>,
    urls: Vec<String>,
    wait: Duration,
}

impl Discoverer {
    /// Creates a discoverer for the `[listing]` section
    ///
    /// Loads `urls-file` (a JSON array of URLs) if one is configured.
    ///
    /// # Arguments
    ///
    /// * `config` - The validated run configuration
    /// * `identity` - Used to reject URLs no identifier can be derived from
    pub fn from_config(config: &Config, identity: Identity) -> Result<Self, ConfigError> {
        let listing = config.listing.clone();

        let mut urls = listing.urls.clone();
        if let Some(file) = &listing.urls_file {
            urls.extend(load_url_file(file)?);
        }

        if urls.is_empty() && listing.base_url.is_none() {
            return Err(ConfigError::Validation(
                "listing needs base-url, urls or urls-file".to_string(),
            ));
        }

        let item_pattern = listing
            .item_url_pattern
            .as_deref()
            .map(|p| compile_pattern(p, "listing.item-url-pattern", false))
            .transpose()?;

        Ok(Self {
            listing,
            identity,
            item_pattern,
            urls,
            wait: Duration::from_millis(config.crawler.listing_wait_ms),
        })
    }

    /// True when candidates come from an explicit list instead of listing pages
    pub fn is_url_list(&self) -> bool {
        !self.urls.is_empty()
    }

    /// URL of listing page `page` (1-based) under the configured pagination
    ///
    /// Page 1 is always the base URL. Returns `None` for styles that have no
    /// further pages.
    pub fn listing_url(&self, page: u32) -> Option<String> {
        let base = self.listing.base_url.as_deref()?;
        if page <= 1 {
            return Some(base.to_string());
        }

        match &self.listing.pagination {
            Pagination::PathSegment => Some(format!("{}/{}/", base.trim_end_matches('/'), page)),
            Pagination::QueryParam { name } => {
                let mut url = Url::parse(base).ok()?;
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(k, _)| k != name.as_str())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                url.query_pairs_mut()
                    .clear()
                    .extend_pairs(kept)
                    .append_pair(name, &page.to_string());
                Some(url.to_string())
            }
            Pagination::Scroll { .. } | Pagination::Single => None,
        }
    }

    /// Runs one discovery round, adding new candidates to `state`
    ///
    /// Marks the listing exhausted when a round yields nothing new, when a
    /// listing page cannot be loaded, or when the round limit is reached.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of new candidates
    /// * `Err(SessionError)` - Only for fatal session errors
    pub async fn discover_round<S: RenderSession>(
        &self,
        session: &mut S,
        state: &mut CrawlState,
    ) -> Result<usize, SessionError> {
        if state.listing_exhausted() {
            return Ok(0);
        }

        let round = state.cursor();
        if let Some(max) = self.listing.max_pages {
            if round > max {
                tracing::info!("Reached max-pages ({}), stopping discovery", max);
                state.mark_listing_exhausted();
                return Ok(0);
            }
        }

        if self.is_url_list() {
            let added = self.offer_list(state);
            state.advance_cursor();
            state.mark_listing_exhausted();
            return Ok(added);
        }

        let Some(base) = self.listing.base_url.as_deref() else {
            state.mark_listing_exhausted();
            return Ok(0);
        };

        let listing_url = match &self.listing.pagination {
            Pagination::Scroll { max_scrolls } if round > 1 => {
                let scrolls = round - 1;
                if scrolls > *max_scrolls {
                    tracing::info!("Reached max-scrolls ({}) on {}", max_scrolls, base);
                    state.mark_listing_exhausted();
                    return Ok(0);
                }
                if !self.open_listing(session, base, state).await? {
                    return Ok(0);
                }
                if !self.scroll_listing(session, base, scrolls, state).await? {
                    return Ok(0);
                }
                base.to_string()
            }
            _ => {
                let Some(url) = self.listing_url(round) else {
                    state.mark_listing_exhausted();
                    return Ok(0);
                };
                if !self.open_listing(session, &url, state).await? {
                    return Ok(0);
                }
                url
            }
        };

        let added = self.harvest(session, &listing_url, state).await?;
        state.advance_cursor();
        tracing::info!(
            "Listing round {} ({}): {} new candidates, {} pending",
            round,
            listing_url,
            added,
            state.pending_len()
        );

        let single = matches!(self.listing.pagination, Pagination::Single);
        if added == 0 || single {
            state.mark_listing_exhausted();
        }
        Ok(added)
    }

    /// Navigates to a listing page; false (listing exhausted) if it cannot be loaded
    async fn open_listing<S: RenderSession>(
        &self,
        session: &mut S,
        url: &str,
        state: &mut CrawlState,
    ) -> Result<bool, SessionError> {
        match session.navigate(url).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!("Listing page {} unavailable: {}", url, e);
                state.mark_listing_exhausted();
                Ok(false)
            }
        }
    }

    /// Scrolls a freshly loaded feed `scrolls` times from the top
    ///
    /// Stops early once the page no longer grows.
    async fn scroll_listing<S: RenderSession>(
        &self,
        session: &mut S,
        base: &str,
        scrolls: u32,
        state: &mut CrawlState,
    ) -> Result<bool, SessionError> {
        for scroll in 1..=scrolls {
            match session.scroll_to_end().await {
                Ok(true) => tracing::debug!("Scroll {}/{} on {}", scroll, scrolls, base),
                Ok(false) => {
                    tracing::debug!("{} stopped growing after {} scrolls", base, scroll);
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!("Scrolling {} failed: {}", base, e);
                    state.mark_listing_exhausted();
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn offer_list(&self, state: &mut CrawlState) -> usize {
        let mut added = 0;
        for raw in &self.urls {
            let url: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
            if let Some(candidate) = self.admit(&url) {
                if state.offer(&candidate).is_some() {
                    added += 1;
                }
            }
        }
        tracing::info!("Loaded {} candidates from the URL list", added);
        added
    }

    /// Collects item links from the current listing page
    async fn harvest<S: RenderSession>(
        &self,
        session: &mut S,
        listing_url: &str,
        state: &mut CrawlState,
    ) -> Result<usize, SessionError> {
        let locators = &self.listing.item_locators;
        let strategy = match resolve(session, Scope::Page, locators, self.wait).await? {
            Resolution::Found { strategy, .. } => strategy,
            Resolution::Exhausted => {
                tracing::warn!("No item links found on {}", listing_url);
                return Ok(0);
            }
        };

        let elements = match session.find_all(Scope::Page, &locators[strategy]).await {
            Ok(found) => found,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Reading item links on {} failed: {}", listing_url, e);
                return Ok(0);
            }
        };

        let template = self.listing.url_template.as_deref();
        let mut added = 0;
        for element in &elements {
            let raw = match session.attribute(element, self.listing.url_attribute()).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!("Skipping item link on {}: {}", listing_url, e);
                    continue;
                }
            };

            let resolved = match resolve_candidate(listing_url, &raw, template) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Ignoring link '{}' on {}: {}", raw, listing_url, e);
                    continue;
                }
            };

            if let Some(candidate) = self.admit(&resolved) {
                if state.offer(&candidate).is_some() {
                    added += 1;
                }
            }
        }

        Ok(added)
    }

    /// Canonicalizes and filters one absolute candidate URL
    fn admit(&self, url: &str) -> Option<String> {
        let canonical = match canonicalize_url(url) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!("Ignoring candidate {}: {}", url, e);
                return None;
            }
        };

        if !host_allowed(&canonical, &self.listing.allowed_domains) {
            tracing::debug!("Ignoring candidate {}: host not allowed", canonical);
            return None;
        }

        if let Some(pattern) = &self.item_pattern {
            if !pattern.is_match(&canonical) {
                tracing::trace!("Ignoring candidate {}: not an item URL", canonical);
                return None;
            }
        }

        if self.identity.derive_id(&canonical).is_none() {
            tracing::debug!("Ignoring candidate {}: no identifier", canonical);
            return None;
        }

        Some(canonical)
    }
}

/// Reads a JSON array of URLs
fn load_url_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        ConfigError::Validation(format!(
            "urls-file {} is not a JSON array of strings: {}",
            path.display(),
            e
        ))
    })
}
