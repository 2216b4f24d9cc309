//! Resilient fetch session
//!
//! HTTP(S) access with bounded automatic retry and exponential backoff for
//! transient failures. Used for static page loads and for media downloads.
//! Every failure is classified into one [`FetchError`] variant; callers never
//! see raw transport errors.

mod retry;
mod session;

pub use retry::RetryPolicy;
pub use session::{build_http_client, FetchSession};

use thiserror::Error;

/// Classified fetch failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Timeout, connection refused/reset, interrupted body
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Certificate or TLS handshake failure
    #[error("TLS error for {url}: {message}")]
    Tls { url: String, message: String },

    /// Non-success HTTP status
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// The response could not be decoded
    #[error("Decode error for {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// URL the failed request was addressed to
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::Tls { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }

    /// HTTP status, for status failures
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
