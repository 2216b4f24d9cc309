use crate::config::{compile_pattern, MetricsConfig};
use crate::model::InteractionCounts;
use crate::normalize::parse_magnitude;
use crate::ConfigError;
use regex::Regex;
use std::fmt;

/// Interaction metrics read from page markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Likes,
    Reposts,
    Quotes,
    Views,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Likes, Metric::Reposts, Metric::Quotes, Metric::Views];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Likes => "likes",
            Metric::Reposts => "reposts",
            Metric::Quotes => "quotes",
            Metric::Views => "views",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named lookup table of ordered patterns per metric
///
/// Patterns run over the serialized markup of the whole page, since some
/// counts render outside the post's own subtree. The first pattern that
/// matches decides; its group 1 goes through [`parse_magnitude`].
#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    entries: Vec<(Metric, Vec<Regex>)>,
}

impl MetricTable {
    pub fn from_config(config: &MetricsConfig) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            let patterns = match metric {
                Metric::Likes => &config.likes,
                Metric::Reposts => &config.reposts,
                Metric::Quotes => &config.quotes,
                Metric::Views => &config.views,
            };
            let field = format!("metrics.{}", metric);
            let compiled = patterns
                .iter()
                .map(|p| compile_pattern(p, &field, true))
                .collect::<Result<Vec<_>, _>>()?;
            entries.push((metric, compiled));
        }
        Ok(Self { entries })
    }

    /// Value of one metric, or `None` when no pattern matches
    pub fn lookup(&self, metric: Metric, markup: &str) -> Option<u64> {
        let (_, patterns) = self.entries.iter().find(|(m, _)| *m == metric)?;
        patterns
            .iter()
            .find_map(|p| p.captures(markup).and_then(|c| c.get(1)))
            .map(|m| parse_magnitude(m.as_str()))
    }

    /// Resolves every metric; unresolved ones are zero
    pub fn resolve(&self, markup: &str) -> InteractionCounts {
        let mut counts = InteractionCounts::default();
        for metric in Metric::ALL {
            let value = match self.lookup(metric, markup) {
                Some(value) => value,
                None => {
                    tracing::debug!("No pattern matched for {}, assuming 0", metric);
                    0
                }
            };
            match metric {
                Metric::Likes => counts.likes = value,
                Metric::Reposts => counts.reposts = value,
                Metric::Quotes => counts.quotes = value,
                Metric::Views => counts.views = value,
            }
        }
        counts
    }
}
