//! Headless Chrome backend
//!
//! Drives one browser process; every session is a tab of that browser, so a
//! manual sign-in done during the login pause is shared by all workers.

use crate::config::BrowserConfig;
use crate::render::{Locator, RenderSession, Scope, SessionError, SessionFactory};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Time given to lazily loaded content after scrolling
const SCROLL_SETTLE: Duration = Duration::from_secs(2);

/// Launches the browser and opens one tab per session
pub struct BrowserSessionFactory {
    browser: Arc<Mutex<Option<Browser>>>,
    handler: JoinHandle<()>,
    poll_interval: Duration,
}

impl BrowserSessionFactory {
    /// Launches Chrome and, if configured, pauses for a manual sign-in
    ///
    /// # Arguments
    ///
    /// * `config` - The `[browser]` section
    /// * `poll_interval` - Wait polling interval of the opened sessions
    pub async fn launch(
        config: &BrowserConfig,
        poll_interval: Duration,
    ) -> Result<Self, SessionError> {
        tracing::info!("Launching browser (headless: {})", config.headless);

        let mut builder = ChromeConfig::builder()
            .window_size(config.window_width, config.window_height)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--mute-audio");

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.arg(format!("--user-agent={}", agent));
        }

        let chrome_config = builder
            .build()
            .map_err(|e| SessionError::Fatal(format!("Invalid browser configuration: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| SessionError::Fatal(format!("Failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler error: {}", e);
                }
            }
        });

        let factory = Self {
            browser: Arc::new(Mutex::new(Some(browser))),
            handler,
            poll_interval,
        };

        if let Some(login_url) = &config.login_url {
            factory
                .login_pause(login_url, Duration::from_secs(config.login_wait_secs))
                .await?;
        }

        Ok(factory)
    }

    /// Opens the login page and waits for the operator to sign in
    async fn login_pause(&self, url: &str, wait: Duration) -> Result<(), SessionError> {
        let page = self.new_page(url).await?;
        tracing::info!(
            "Sign in at {} in the browser window; crawling starts in {:?}",
            url,
            wait
        );
        tokio::time::sleep(wait).await;
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close login page: {}", e);
        }
        Ok(())
    }

    async fn new_page(&self, url: &str) -> Result<Page, SessionError> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| SessionError::Fatal("browser already shut down".to_string()))?;
        browser
            .new_page(url)
            .await
            .map_err(|e| SessionError::Fatal(format!("Failed to open tab: {}", e)))
    }

    /// Closes the browser process
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                tracing::error!("Failed to close browser: {}", e);
            } else {
                tracing::info!("Browser shutdown complete");
            }
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSessionFactory {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl SessionFactory for BrowserSessionFactory {
    type Session = BrowserSession;

    async fn open(&self) -> Result<BrowserSession, SessionError> {
        let page = self.new_page("about:blank").await?;
        Ok(BrowserSession {
            page: Some(page),
            poll_interval: self.poll_interval,
        })
    }
}

/// One browser tab
pub struct BrowserSession {
    page: Option<Page>,
    poll_interval: Duration,
}

impl BrowserSession {
    fn page(&self) -> Result<&Page, SessionError> {
        self.page
            .as_ref()
            .ok_or_else(|| SessionError::Fatal("session already closed".to_string()))
    }

    async fn keep_matching(
        &self,
        elements: Vec<Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, SessionError> {
        if locator.min_text_chars().is_none() {
            return Ok(elements);
        }
        let mut kept = Vec::new();
        for element in elements {
            let text = element
                .inner_text()
                .await
                .map_err(|e| query_error("inner text", e))?
                .unwrap_or_default();
            if locator.accepts_text(&text) {
                kept.push(element);
            }
        }
        Ok(kept)
    }

    async fn scroll_height(&self) -> Result<i64, SessionError> {
        self.page()?
            .evaluate("document.body.scrollHeight")
            .await
            .map_err(|e| query_error("scroll height", e))?
            .into_value::<i64>()
            .map_err(|e| SessionError::Query(format!("scroll height: {}", e)))
    }
}

/// Maps a CDP error, treating a lost browser connection as fatal
fn query_error(context: &str, err: CdpError) -> SessionError {
    if is_connection_lost(&err) {
        SessionError::Fatal(format!("{}: {}", context, err))
    } else {
        SessionError::Query(format!("{}: {}", context, err))
    }
}

fn is_connection_lost(err: &CdpError) -> bool {
    matches!(
        err,
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse
    )
}

#[async_trait]
impl RenderSession for BrowserSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        match self.page()?.goto(url).await {
            Ok(_) => Ok(()),
            Err(e) if is_connection_lost(&e) => {
                Err(SessionError::Fatal(format!("navigation to {}: {}", url, e)))
            }
            Err(e) => Err(SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn find_all(
        &mut self,
        scope: Scope<'_, Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, SessionError> {
        let css = locator.to_css();
        let found = match scope {
            Scope::Page => self.page()?.find_elements(css.as_str()).await,
            Scope::Element(element) => element.find_elements(css.as_str()).await,
        };

        let elements = match found {
            Ok(elements) => elements,
            Err(CdpError::NotFound) => Vec::new(),
            Err(e) => return Err(query_error(&css, e)),
        };
        self.keep_matching(elements, locator).await
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        element
            .attribute(name)
            .await
            .map_err(|e| query_error(name, e))
    }

    async fn text(&mut self, element: &Element) -> Result<String, SessionError> {
        Ok(element
            .inner_text()
            .await
            .map_err(|e| query_error("inner text", e))?
            .unwrap_or_default())
    }

    async fn markup(&mut self, scope: Scope<'_, Element>) -> Result<String, SessionError> {
        match scope {
            Scope::Page => self
                .page()?
                .content()
                .await
                .map_err(|e| query_error("page content", e)),
            Scope::Element(element) => Ok(element
                .outer_html()
                .await
                .map_err(|e| query_error("outer html", e))?
                .unwrap_or_default()),
        }
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn scroll_to_end(&mut self) -> Result<bool, SessionError> {
        let before = self.scroll_height().await?;
        self.page()?
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(|e| query_error("scroll", e))?;
        tokio::time::sleep(SCROLL_SETTLE).await;
        let after = self.scroll_height().await?;
        Ok(after > before)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(page) = self.page.take() {
            page.close()
                .await
                .map_err(|e| query_error("close tab", e))?;
        }
        Ok(())
    }
}
