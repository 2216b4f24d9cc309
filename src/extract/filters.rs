use crate::config::FilterConfig;
use crate::model::Timestamp;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why an extracted record was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Disqualification {
    /// An age filter is configured and the timestamp could not be normalized
    #[error("timestamp could not be normalized")]
    UnparseableTimestamp,

    #[error("only {age_days} days old")]
    TooRecent { age_days: i64 },

    #[error("only {found} replies, {required} required")]
    TooFewReplies { found: usize, required: usize },
}

impl Disqualification {
    pub fn label(&self) -> &'static str {
        match self {
            Disqualification::UnparseableTimestamp => "unparseable timestamp",
            Disqualification::TooRecent { .. } => "too recent",
            Disqualification::TooFewReplies { .. } => "too few replies",
        }
    }
}

/// Content filters applied to successfully extracted records
///
/// The defaults are permissive: no age limit and no reply minimum.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    min_age_days: Option<i64>,
    min_replies: usize,
}

impl Filters {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            min_age_days: config.min_age_days,
            min_replies: config.min_replies,
        }
    }

    /// Checks the age filter
    ///
    /// A timestamp that cannot be normalized disqualifies the record rather
    /// than being assumed old enough.
    pub fn check_age(&self, timestamp: &Timestamp, now: DateTime<Utc>) -> Result<(), Disqualification> {
        let Some(min_days) = self.min_age_days else {
            return Ok(());
        };

        let created = timestamp
            .iso
            .as_deref()
            .and_then(|iso| DateTime::parse_from_rfc3339(iso).ok())
            .ok_or(Disqualification::UnparseableTimestamp)?;

        let age_days = (now - created.with_timezone(&Utc)).num_days();
        if age_days < min_days {
            return Err(Disqualification::TooRecent { age_days });
        }
        Ok(())
    }

    /// Checks the reply-count filter
    pub fn check_replies(&self, found: usize) -> Result<(), Disqualification> {
        if found < self.min_replies {
            return Err(Disqualification::TooFewReplies {
                found,
                required: self.min_replies,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp(iso: Option<&str>) -> Timestamp {
        Timestamp {
            raw: iso.map(str::to_string),
            iso: iso.map(str::to_string),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_default_is_permissive() {
        let filters = Filters::default();
        assert!(filters.check_age(&timestamp(None), now()).is_ok());
        assert!(filters.check_replies(0).is_ok());
    }

    #[test]
    fn test_age_filter() {
        let filters = Filters::from_config(&FilterConfig {
            min_age_days: Some(14),
            min_replies: 0,
        });
        assert!(filters
            .check_age(&timestamp(Some("2024-01-01T00:00:00+00:00")), now())
            .is_ok());
        assert_eq!(
            filters.check_age(&timestamp(Some("2024-02-25T12:00:00+00:00")), now()),
            Err(Disqualification::TooRecent { age_days: 5 })
        );
    }

    #[test]
    fn test_unparseable_timestamp_disqualifies_under_age_filter() {
        let filters = Filters::from_config(&FilterConfig {
            min_age_days: Some(0),
            min_replies: 0,
        });
        assert_eq!(
            filters.check_age(&timestamp(None), now()),
            Err(Disqualification::UnparseableTimestamp)
        );
    }

    #[test]
    fn test_reply_minimum() {
        let filters = Filters::from_config(&FilterConfig {
            min_age_days: None,
            min_replies: 20,
        });
        assert_eq!(
            filters.check_replies(3),
            Err(Disqualification::TooFewReplies {
                found: 3,
                required: 20
            })
        );
        assert!(filters.check_replies(20).is_ok());
    }
}
