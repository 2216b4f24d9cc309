use crate::config::{compile_pattern, MediaConfig, Rewrite};
use crate::model::Media;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;

/// Collects media references from serialized markup
#[derive(Debug, Clone, Default)]
pub struct MediaCollector {
    pattern: Option<Regex>,
    rewrites: Vec<Rewrite>,
}

impl MediaCollector {
    pub fn from_config(config: &MediaConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: config
                .url_pattern
                .as_deref()
                .map(|p| compile_pattern(p, "media.url-pattern", true))
                .transpose()?,
            rewrites: config.rewrites.clone(),
        })
    }

    /// Scans markup for media URLs
    ///
    /// Group 1 of every match is unescaped, rewritten to its full-size form and
    /// kept once, in first-seen order.
    pub fn collect(&self, markup: &str) -> Vec<Media> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        pattern
            .captures_iter(markup)
            .filter_map(|caps| caps.get(1))
            .map(|m| self.canonical(m.as_str()))
            .filter(|url| seen.insert(url.clone()))
            .map(Media::new)
            .collect()
    }

    /// Full-size form of a media URL
    pub fn canonical(&self, raw: &str) -> String {
        let mut url = raw.trim().replace("&amp;", "&");
        if let Some(rewrite) = self.rewrites.iter().find(|r| url.ends_with(&r.from)) {
            url.truncate(url.len() - rewrite.from.len());
            url.push_str(&rewrite.to);
        }
        url
    }
}
