use reqwest::Method;
use std::collections::HashSet;
use std::time::Duration;

/// When and how often a failed request is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before retry `n` (0-based) is `backoff_factor * 2^n` seconds
    pub backoff_factor: f64,

    /// Upper bound of a single delay
    pub backoff_max: Duration,

    /// Status codes treated as transient
    pub retry_statuses: HashSet<u16>,

    /// Methods that may be repeated
    pub retry_methods: HashSet<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 0.5,
            backoff_max: Duration::from_secs(120),
            retry_statuses: [500, 502, 503, 504].into_iter().collect(),
            retry_methods: [Method::GET, Method::POST].into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the retry following failed attempt `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let secs = self.backoff_factor * 2f64.powi(attempt.min(62) as i32);
        let capped = secs.min(self.backoff_max.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    pub fn retries_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    pub fn retries_method(&self, method: &Method) -> bool {
        self.retry_methods.contains(method)
    }
}
