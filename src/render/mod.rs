//! Rendering collaborator contract
//!
//! The crawl pipeline never talks to a concrete rendering technology. It drives
//! a [`RenderSession`]: navigate to a URL, query elements through
//! [`Locator`]s, read attributes, text and serialized markup. Two backends are
//! provided:
//!
//! - [`StaticSession`] parses served HTML with `scraper`, fed either by the
//!   resilient HTTP session or by in-memory fixtures
//! - `BrowserSession` (feature `browser`) drives headless Chrome

mod locator;
mod static_page;

#[cfg(feature = "browser")]
mod browser;

pub use locator::Locator;
pub use static_page::{InMemoryPages, PageSource, StaticElement, StaticSession, StaticSessionFactory};

#[cfg(feature = "browser")]
pub use browser::{BrowserSession, BrowserSessionFactory};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Default delay between two evaluations of a locator while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors raised by a rendering session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The page could not be loaded; only the current item is affected
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A single query failed; only the current field is affected
    #[error("Query failed: {0}")]
    Query(String),

    /// The session itself is unusable and the run cannot continue
    #[error("Session is unusable: {0}")]
    Fatal(String),
}

impl SessionError {
    /// Returns true if the error must abort the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Fatal(_))
    }
}

/// Where a query is evaluated: the whole current page or below an element
pub enum Scope<'a, E> {
    Page,
    Element(&'a E),
}

impl<E> Clone for Scope<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Scope<'_, E> {}

/// One navigable rendering session
///
/// A session has a single "current page", so it is driven by one task at a
/// time. Parallel extraction opens one session per worker through a
/// [`SessionFactory`].
#[async_trait]
pub trait RenderSession: Send {
    /// Handle to an element of the current page
    type Element: Send + Sync;

    /// Loads `url` as the current page
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Returns every element matching the locator, in document order
    async fn find_all(
        &mut self,
        scope: Scope<'_, Self::Element>,
        locator: &Locator,
    ) -> Result<Vec<Self::Element>, SessionError>;

    /// Reads an attribute of an element
    async fn attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, SessionError>;

    /// Reads the text content of an element
    async fn text(&mut self, element: &Self::Element) -> Result<String, SessionError>;

    /// Serialized markup of the page or of an element subtree
    async fn markup(&mut self, scope: Scope<'_, Self::Element>) -> Result<String, SessionError>;

    /// Delay between two evaluations in [`RenderSession::wait_for_element`]
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Polls the locator until it matches or `timeout` elapses
    ///
    /// Returns `Ok(None)` when the wait is exhausted. Non-fatal query errors
    /// count as "not there yet"; a fatal error is returned immediately.
    async fn wait_for_element(
        &mut self,
        scope: Scope<'_, Self::Element>,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Option<Self::Element>, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find_all(scope, locator).await {
                Ok(found) => {
                    if let Some(element) = found.into_iter().next() {
                        return Ok(Some(element));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::trace!("Lookup {} not ready: {}", locator, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let pause = self.poll_interval().min(deadline - now);
            tokio::time::sleep(pause).await;
        }
    }

    /// Scrolls to the end of the page, returning true if more content loaded
    async fn scroll_to_end(&mut self) -> Result<bool, SessionError> {
        Ok(false)
    }

    /// Releases the session
    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Opens rendering sessions for worker pools
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: RenderSession + 'static;

    async fn open(&self) -> Result<Self::Session, SessionError>;
}
