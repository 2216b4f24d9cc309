use crate::config::{compile_pattern, IdentityConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Derives identifiers and fallback authors from canonical item URLs
///
/// Identity never comes from page content, so a record keeps its identifier
/// when the markup drifts.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    id_pattern: Option<Regex>,
    author_pattern: Option<Regex>,
    author_prefix: String,
}

impl Identity {
    pub fn from_config(config: &IdentityConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            id_pattern: config
                .id_pattern
                .as_deref()
                .map(|p| compile_pattern(p, "identity.id-pattern", true))
                .transpose()?,
            author_pattern: config
                .author_pattern
                .as_deref()
                .map(|p| compile_pattern(p, "identity.author-pattern", true))
                .transpose()?,
            author_prefix: config.author_prefix.clone().unwrap_or_default(),
        })
    }

    /// Derives the record identifier from a canonical URL
    ///
    /// With an `id-pattern` the group named `id` (or group 1) is used;
    /// otherwise the last non-empty path segment.
    pub fn derive_id(&self, url: &str) -> Option<String> {
        let id = match &self.id_pattern {
            Some(pattern) => capture(pattern, url, "id"),
            None => last_path_segment(url),
        }?;

        let id = id.trim();
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }

    /// Author handle encoded in the URL, with the configured prefix
    pub fn author_from_url(&self, url: &str) -> Option<String> {
        let pattern = self.author_pattern.as_ref()?;
        let author = capture(pattern, url, "author")?;
        if author.is_empty() {
            return None;
        }
        Some(format!("{}{}", self.author_prefix, author))
    }
}

fn capture(pattern: &Regex, text: &str, name: &str) -> Option<String> {
    let caps = pattern.captures(text)?;
    caps.name(name)
        .or_else(|| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gab_identity() -> Identity {
        Identity::from_config(&IdentityConfig {
            id_pattern: None,
            author_pattern: Some(r"gab\.com/(?P<author>[^/]+)/posts/".to_string()),
            author_prefix: Some("@".to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_last_segment_default() {
        let identity = gab_identity();
        assert_eq!(
            identity.derive_id("https://gab.com/alice/posts/113456789012").as_deref(),
            Some("113456789012")
        );
        assert_eq!(
            identity.derive_id("https://archive.4plebs.org/pol/thread/4242/").as_deref(),
            Some("4242")
        );
    }

    #[test]
    fn test_last_segment_ignores_query_and_fragment() {
        let identity = Identity::default();
        assert_eq!(
            identity.derive_id("https://gab.com/a/posts/abc123?x=1#c").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_no_segment_no_id() {
        let identity = Identity::default();
        assert_eq!(identity.derive_id("https://gab.com/"), None);
        assert_eq!(identity.derive_id("not a url"), None);
    }

    #[test]
    fn test_id_pattern_named_group() {
        let identity = Identity::from_config(&IdentityConfig {
            id_pattern: Some(r"/thread/(?P<id>\d+)".to_string()),
            ..IdentityConfig::default()
        })
        .unwrap();
        assert_eq!(
            identity.derive_id("https://archive.4plebs.org/pol/thread/4242/#p4243").as_deref(),
            Some("4242")
        );
        assert_eq!(identity.derive_id("https://archive.4plebs.org/pol/"), None);
    }

    #[test]
    fn test_author_from_url() {
        let identity = gab_identity();
        assert_eq!(
            identity.author_from_url("https://gab.com/alice/posts/113456789012").as_deref(),
            Some("@alice")
        );
        assert_eq!(identity.author_from_url("https://gab.com/alice"), None);
    }

    #[test]
    fn test_pattern_without_group_rejected() {
        let result = Identity::from_config(&IdentityConfig {
            id_pattern: Some(r"\d+".to_string()),
            ..IdentityConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }
}
