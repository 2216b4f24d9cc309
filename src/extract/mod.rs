//! Record extraction
//!
//! Builds one [`Record`] from a rendered detail page. Every volatile field is
//! located through the fallback resolver; each field fails and defaults on its
//! own, and only a missing root element, a failed navigation or a
//! disqualification drops the whole record.

mod body;
mod filters;
mod identity;
mod media;
mod metrics;
mod resolver;

pub use body::{classify_body, is_header_like};
pub use filters::{Disqualification, Filters};
pub use identity::Identity;
pub use media::MediaCollector;
pub use metrics::{Metric, MetricTable};
pub use resolver::{resolve, Resolution};

use crate::config::{compile_pattern, Config, CrawlerConfig, FieldsConfig, RepliesConfig};
use crate::model::{Record, Reply, Timestamp};
use crate::normalize::{parse_magnitude, parse_timestamp};
use crate::render::{Locator, RenderSession, Scope, SessionError};
use crate::ConfigError;
use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Why a URL produced no record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("no identifier could be derived from the URL")]
    NoIdentifier,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("root element not found")]
    RootNotFound,

    #[error("disqualified: {0}")]
    Disqualified(Disqualification),
}

impl SkipReason {
    /// Short label used to group skips in run statistics
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NoIdentifier => "no identifier",
            SkipReason::Navigation(_) => "navigation failed",
            SkipReason::RootNotFound => "root not found",
            SkipReason::Disqualified(d) => d.label(),
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, SkipReason::Navigation(_))
    }
}

/// Result of one extraction attempt
#[derive(Debug, Clone)]
pub enum Extraction {
    Record(Box<Record>),
    Skipped(SkipReason),
}

/// Waits used while extracting
#[derive(Debug, Clone, Copy)]
pub struct ExtractorSettings {
    pub root_wait: Duration,
    pub field_wait: Duration,
    pub reply_wait: Duration,
    pub reply_field_wait: Duration,
    pub page_settle: Duration,
}

impl From<&CrawlerConfig> for ExtractorSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            root_wait: Duration::from_millis(config.root_wait_ms),
            field_wait: Duration::from_millis(config.field_wait_ms),
            reply_wait: Duration::from_millis(config.reply_wait_ms),
            reply_field_wait: Duration::from_millis(config.reply_field_wait_ms),
            page_settle: Duration::from_millis(config.page_settle_ms),
        }
    }
}

/// Extracts records from detail pages according to a site configuration
#[derive(Debug, Clone)]
pub struct Extractor {
    identity: Identity,
    fields: FieldsConfig,
    replies: RepliesConfig,
    like_patterns: Vec<Regex>,
    media: MediaCollector,
    metrics: MetricTable,
    filters: Filters,
    settings: ExtractorSettings,
}

impl Extractor {
    /// Compiles every pattern of the configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let like_patterns = config
            .replies
            .like_patterns
            .iter()
            .map(|p| compile_pattern(p, "replies.like-patterns", true))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            identity: Identity::from_config(&config.identity)?,
            fields: config.fields.clone(),
            replies: config.replies.clone(),
            like_patterns,
            media: MediaCollector::from_config(&config.media)?,
            metrics: MetricTable::from_config(&config.metrics)?,
            filters: Filters::from_config(&config.filters),
            settings: ExtractorSettings::from(&config.crawler),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Extracts one record from `url`
    ///
    /// # Steps
    ///
    /// 1. Derive the identifier from the URL (never from page content)
    /// 2. Navigate and resolve the root element (the one mandatory anchor)
    /// 3. Resolve author, body and timestamp below the root
    /// 4. Collect media from the root's markup
    /// 5. Resolve interaction counts from the whole page's markup
    /// 6. Collect replies
    /// 7. Apply the disqualification filters
    ///
    /// # Returns
    ///
    /// * `Ok(Extraction::Record)` - A complete record
    /// * `Ok(Extraction::Skipped)` - This URL yields no record; the run goes on
    /// * `Err(SessionError)` - Only for fatal session errors
    pub async fn extract<S: RenderSession>(
        &self,
        session: &mut S,
        url: &str,
    ) -> Result<Extraction, SessionError> {
        let Some(id) = self.identity.derive_id(url) else {
            tracing::warn!("Skipping {}: no identifier in URL", url);
            return Ok(Extraction::Skipped(SkipReason::NoIdentifier));
        };

        match session.navigate(url).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", url, e);
                return Ok(Extraction::Skipped(SkipReason::Navigation(e.to_string())));
            }
        }

        if !self.settings.page_settle.is_zero() {
            tokio::time::sleep(self.settings.page_settle).await;
        }

        let root_locators: Vec<Locator> = self.fields.root.iter().map(|l| l.with_id(&id)).collect();
        let root = match resolve(session, Scope::Page, &root_locators, self.settings.root_wait)
            .await?
        {
            Resolution::Found { element, strategy } => {
                tracing::debug!("Root of {} located by strategy {}", url, strategy);
                element
            }
            Resolution::Exhausted => {
                tracing::warn!("Skipping {}: root element not found", url);
                return Ok(Extraction::Skipped(SkipReason::RootNotFound));
            }
        };
        let scope = Scope::Element(&root);
        let wait = self.settings.field_wait;

        let author = match self
            .located_text(session, scope, &self.fields.author, wait, url, "author")
            .await?
        {
            Some(text) => self.strip_author(&text),
            None => None,
        }
        .or_else(|| self.identity.author_from_url(url));

        let text = self
            .located_text(session, scope, &self.fields.body, wait, url, "body")
            .await?
            .and_then(|raw| {
                let body = classify_body(&raw, author.as_deref());
                if body.is_none() {
                    tracing::warn!("Field 'body' on {} looks like header text, discarded", url);
                }
                body
            });

        let timestamp = self
            .timestamp(session, scope, &self.fields.timestamp, wait, url)
            .await?;

        if let Err(reason) = self.filters.check_age(&timestamp, Utc::now()) {
            tracing::info!("Skipping {}: {}", url, reason);
            return Ok(Extraction::Skipped(SkipReason::Disqualified(reason)));
        }

        let media = degrade(session.markup(scope).await, url, "media")?
            .map(|markup| self.media.collect(&markup))
            .unwrap_or_default();

        let counts = degrade(session.markup(Scope::Page).await, url, "metrics")?
            .map(|markup| self.metrics.resolve(&markup))
            .unwrap_or_default();

        let replies = self.collect_replies(session, url).await?;

        if let Err(reason) = self.filters.check_replies(replies.len()) {
            tracing::info!("Skipping {}: {}", url, reason);
            return Ok(Extraction::Skipped(SkipReason::Disqualified(reason)));
        }

        Ok(Extraction::Record(Box::new(Record {
            id,
            url: url.to_string(),
            author,
            text,
            timestamp,
            counts,
            media,
            replies,
        })))
    }

    /// Resolves an element through `locators` and reads its text
    async fn located_text<S: RenderSession>(
        &self,
        session: &mut S,
        scope: Scope<'_, S::Element>,
        locators: &[Locator],
        wait: Duration,
        url: &str,
        field: &str,
    ) -> Result<Option<String>, SessionError> {
        let Some(element) = self.locate(session, scope, locators, wait, url, field).await? else {
            return Ok(None);
        };
        degrade(session.text(&element).await, url, field)
    }

    async fn locate<S: RenderSession>(
        &self,
        session: &mut S,
        scope: Scope<'_, S::Element>,
        locators: &[Locator],
        wait: Duration,
        url: &str,
        field: &str,
    ) -> Result<Option<S::Element>, SessionError> {
        if locators.is_empty() {
            return Ok(None);
        }
        let element = resolve(session, scope, locators, wait).await?.into_element();
        if element.is_none() {
            tracing::warn!("Field '{}' not found on {}", field, url);
        }
        Ok(element)
    }

    /// Reads the timestamp attribute (or text) and normalizes it
    async fn timestamp<S: RenderSession>(
        &self,
        session: &mut S,
        scope: Scope<'_, S::Element>,
        locators: &[Locator],
        wait: Duration,
        url: &str,
    ) -> Result<Timestamp, SessionError> {
        let Some(element) = self
            .locate(session, scope, locators, wait, url, "timestamp")
            .await?
        else {
            return Ok(Timestamp::missing());
        };

        let attribute = degrade(
            session
                .attribute(&element, self.fields.timestamp_attribute())
                .await,
            url,
            "timestamp",
        )?
        .flatten()
        .filter(|v| !v.trim().is_empty());

        let raw = match attribute {
            Some(value) => Some(value),
            None => degrade(session.text(&element).await, url, "timestamp")?,
        }
        .map(|v| v.trim().to_string());

        let iso = raw
            .as_deref()
            .and_then(|r| parse_timestamp(r, &self.fields.timestamp_formats));
        if raw.is_some() && iso.is_none() {
            tracing::warn!("Field 'timestamp' on {} matches no known format", url);
        }

        Ok(Timestamp { raw, iso })
    }

    fn strip_author(&self, text: &str) -> Option<String> {
        let mut author = text.trim();
        for prefix in &self.fields.author_strip {
            if let Some(rest) = author.strip_prefix(prefix.as_str()) {
                author = rest.trim_start();
            }
        }
        if author.is_empty() {
            None
        } else {
            Some(author.to_string())
        }
    }

    /// Collects the replies of the current page
    ///
    /// Waits (bounded) for any reply container, then merges the matches of
    /// every container locator, keeping the first occurrence of each reply.
    async fn collect_replies<S: RenderSession>(
        &self,
        session: &mut S,
        url: &str,
    ) -> Result<Vec<Reply>, SessionError> {
        let containers = &self.replies.containers;
        if containers.is_empty() {
            return Ok(Vec::new());
        }

        if let Resolution::Exhausted =
            resolve(session, Scope::Page, containers, self.settings.reply_wait).await?
        {
            tracing::debug!("No replies on {}", url);
            return Ok(Vec::new());
        }

        let mut elements = Vec::new();
        for locator in containers {
            match session.find_all(Scope::Page, locator).await {
                Ok(found) => elements.extend(found),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("Reply containers {} failed on {}: {}", locator, url, e),
            }
        }

        let mut seen = HashSet::new();
        let mut replies = Vec::new();
        for element in &elements {
            let markup = degrade(session.markup(Scope::Element(element)).await, url, "reply")?
                .unwrap_or_default();
            let key = match self.reply_key(session, element).await? {
                Some(id) => id,
                None => format!("markup:{}", hex::encode(Sha256::digest(markup.as_bytes()))),
            };
            if !seen.insert(key) {
                continue;
            }

            let reply = self
                .extract_reply(session, element, &markup, replies.len(), url)
                .await?;
            replies.push(reply);
        }

        tracing::debug!("Collected {} replies on {}", replies.len(), url);
        Ok(replies)
    }

    /// First non-empty identifying attribute of a reply container
    async fn reply_key<S: RenderSession>(
        &self,
        session: &mut S,
        element: &S::Element,
    ) -> Result<Option<String>, SessionError> {
        for name in &self.replies.id_attributes {
            match session.attribute(element, name).await {
                Ok(Some(value)) if !value.trim().is_empty() => {
                    return Ok(Some(value.trim().to_string()))
                }
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => {}
            }
        }
        Ok(None)
    }

    async fn extract_reply<S: RenderSession>(
        &self,
        session: &mut S,
        element: &S::Element,
        markup: &str,
        index: usize,
        url: &str,
    ) -> Result<Reply, SessionError> {
        let scope = Scope::Element(element);
        let wait = self.settings.reply_field_wait;

        let author = match self
            .located_text(session, scope, &self.replies.author, wait, url, "reply author")
            .await?
        {
            Some(text) => self.strip_author(&text),
            None => None,
        };

        let text = self
            .located_text(session, scope, &self.replies.body, wait, url, "reply body")
            .await?
            .and_then(|raw| {
                let body = classify_body(&raw, author.as_deref());
                if body.is_none() {
                    tracing::warn!("Reply body on {} looks like header text, discarded", url);
                }
                body
            });

        let timestamp = self
            .timestamp(session, scope, &self.replies.timestamp, wait, url)
            .await?;

        let likes = if self.like_patterns.is_empty() {
            None
        } else {
            Some(
                self.like_patterns
                    .iter()
                    .find_map(|p| p.captures(markup).and_then(|c| c.get(1)))
                    .map(|m| parse_magnitude(m.as_str()))
                    .unwrap_or(0),
            )
        };

        let id = match self.reply_key(session, element).await? {
            Some(id) => id,
            None => fallback_reply_id(index, author.as_deref(), text.as_deref()),
        };

        Ok(Reply {
            id,
            author,
            text,
            timestamp,
            media: self.media.collect(markup),
            likes,
        })
    }
}

/// Deterministic identifier for a reply without an id attribute
pub fn fallback_reply_id(index: usize, author: Option<&str>, text: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(author.unwrap_or_default().as_bytes());
    hasher.update(text.unwrap_or_default().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("reply-{}-{}", index, &digest[..12])
}

/// Turns a non-fatal session error into an absent field value
fn degrade<T>(
    result: Result<T, SessionError>,
    url: &str,
    field: &str,
) -> Result<Option<T>, SessionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!("Field '{}' degraded on {}: {}", field, url, e);
            Ok(None)
        }
    }
}
