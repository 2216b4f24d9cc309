use crate::fetch::FetchSession;
use crate::render::{Locator, RenderSession, Scope, SessionError, SessionFactory};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Supplies the HTML of a page
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn load(&self, url: &str) -> Result<String, SessionError>;
}

#[async_trait]
impl PageSource for FetchSession {
    async fn load(&self, url: &str) -> Result<String, SessionError> {
        let bytes = self
            .fetch(url, None)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Pages held in memory, keyed by URL
///
/// Used to replay saved pages and in tests. Unknown URLs fail navigation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPages {
    pages: Arc<HashMap<String, String>>,
}

impl InMemoryPages {
    pub fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages: Arc::new(pages),
        }
    }

    /// Builds a page set from `(url, html)` pairs
    pub fn from_pairs<I, U, H>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, H)>,
        U: Into<String>,
        H: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(u, h)| (u.into(), h.into()))
                .collect(),
        )
    }
}

#[async_trait]
impl PageSource for InMemoryPages {
    async fn load(&self, url: &str) -> Result<String, SessionError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SessionError::Navigation {
                url: url.to_string(),
                reason: "page not available".to_string(),
            })
    }
}

/// Snapshot of an element of a statically parsed page
///
/// `scraper` documents are not `Send`, so elements are detached from the
/// document: the subtree is kept as markup and re-parsed for scoped queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub outer_html: String,
}

impl StaticElement {
    fn snapshot(element: ElementRef<'_>) -> Self {
        let value = element.value();
        Self {
            tag: value.name().to_string(),
            attributes: value
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            text: element.text().collect(),
            outer_html: element.html(),
        }
    }
}

/// Rendering session over served HTML, without script execution
pub struct StaticSession<P: PageSource> {
    source: P,
    current: Option<(String, String)>,
    poll_interval: Duration,
}

impl<P: PageSource> StaticSession<P> {
    pub fn new(source: P) -> Self {
        Self {
            source,
            current: None,
            poll_interval: super::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the wait polling interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// URL of the current page, if one is loaded
    pub fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|(url, _)| url.as_str())
    }

    fn current_html(&self) -> Result<&str, SessionError> {
        self.current
            .as_ref()
            .map(|(_, html)| html.as_str())
            .ok_or_else(|| SessionError::Query("no page loaded".to_string()))
    }
}

fn select_in(
    root: ElementRef<'_>,
    locator: &Locator,
    selector: &scraper::Selector,
) -> Vec<StaticElement> {
    root.select(selector)
        .filter(|el| locator.accepts_text(&el.text().collect::<String>()))
        .map(StaticElement::snapshot)
        .collect()
}

#[async_trait]
impl<P: PageSource> RenderSession for StaticSession<P> {
    type Element = StaticElement;

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let html = self.source.load(url).await?;
        self.current = Some((url.to_string(), html));
        Ok(())
    }

    async fn find_all(
        &mut self,
        scope: Scope<'_, StaticElement>,
        locator: &Locator,
    ) -> Result<Vec<StaticElement>, SessionError> {
        let selector = locator.selector().map_err(SessionError::Query)?;

        match scope {
            Scope::Page => {
                let document = Html::parse_document(self.current_html()?);
                Ok(select_in(document.root_element(), locator, &selector))
            }
            Scope::Element(element) => {
                let fragment = Html::parse_fragment(&element.outer_html);
                let Some(scope_root) = fragment.root_element().children().find_map(ElementRef::wrap)
                else {
                    return Ok(Vec::new());
                };
                Ok(select_in(scope_root, locator, &selector))
            }
        }
    }

    async fn attribute(
        &mut self,
        element: &StaticElement,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        Ok(element
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    async fn text(&mut self, element: &StaticElement) -> Result<String, SessionError> {
        Ok(element.text.clone())
    }

    async fn markup(&mut self, scope: Scope<'_, StaticElement>) -> Result<String, SessionError> {
        match scope {
            Scope::Page => Ok(self.current_html()?.to_string()),
            Scope::Element(element) => Ok(element.outer_html.clone()),
        }
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.current = None;
        Ok(())
    }
}

/// Opens static sessions sharing one page source
#[derive(Debug, Clone)]
pub struct StaticSessionFactory<P> {
    source: P,
    poll_interval: Duration,
}

impl<P: PageSource + Clone> StaticSessionFactory<P> {
    pub fn new(source: P, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
        }
    }
}

#[async_trait]
impl<P: PageSource + Clone + 'static> SessionFactory for StaticSessionFactory<P> {
    type Session = StaticSession<P>;

    async fn open(&self) -> Result<StaticSession<P>, SessionError> {
        Ok(StaticSession::new(self.source.clone()).with_poll_interval(self.poll_interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<article class="clearfix thread" id="101">
  <span class="poster_hash">ID:abc</span>
  <div class="text">Opening post text here</div>
  <aside class="posts">
    <article class="post" id="102"><div class="text">first reply</div></article>
    <article class="post" id="103"><div class="text">second reply</div></article>
  </aside>
</article>
<article class="clearfix thread" id="104"><div class="text">x</div></article>
</body></html>"#;

    fn session() -> StaticSession<InMemoryPages> {
        StaticSession::new(InMemoryPages::from_pairs([("https://board.example/1", PAGE)]))
    }

    #[tokio::test]
    async fn test_find_all_on_page() {
        let mut s = session();
        s.navigate("https://board.example/1").await.unwrap();

        let threads = s
            .find_all(Scope::Page, &Locator::css("article.thread"))
            .await
            .unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(
            s.attribute(&threads[0], "id").await.unwrap().as_deref(),
            Some("101")
        );
        assert_eq!(s.attribute(&threads[0], "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scoped_query_excludes_scope_itself() {
        let mut s = session();
        s.navigate("https://board.example/1").await.unwrap();

        let thread = s
            .find_all(Scope::Page, &Locator::css("article.thread"))
            .await
            .unwrap()
            .remove(0);
        let posts = s
            .find_all(Scope::Element(&thread), &Locator::Tag { name: "article".into() })
            .await
            .unwrap();
        let ids: Vec<String> = posts
            .iter()
            .filter_map(|p| p.attributes.iter().find(|(k, _)| k == "id").map(|(_, v)| v.clone()))
            .collect();
        assert_eq!(ids, vec!["102", "103"]);
    }

    #[tokio::test]
    async fn test_text_length_filter() {
        let mut s = session();
        s.navigate("https://board.example/1").await.unwrap();

        let long = Locator::TextLength {
            tag: "div".into(),
            min_chars: 12,
            excludes: vec![],
        };
        let found = s.find_all(Scope::Page, &long).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(s.text(&found[0]).await.unwrap(), "Opening post text here");
    }

    #[tokio::test]
    async fn test_markup_scopes() {
        let mut s = session();
        s.navigate("https://board.example/1").await.unwrap();

        let page = s.markup(Scope::Page).await.unwrap();
        assert!(page.contains("poster_hash"));

        let hash = s
            .find_all(Scope::Page, &Locator::css("span.poster_hash"))
            .await
            .unwrap()
            .remove(0);
        let markup = s.markup(Scope::Element(&hash)).await.unwrap();
        assert_eq!(markup, r#"<span class="poster_hash">ID:abc</span>"#);
    }

    #[tokio::test]
    async fn test_unknown_page_is_navigation_error() {
        let mut s = session();
        let err = s.navigate("https://board.example/404").await.unwrap_err();
        assert!(matches!(err, SessionError::Navigation { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_query_without_page() {
        let mut s = session();
        let err = s
            .find_all(Scope::Page, &Locator::css("div"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Query(_)));
    }

    #[tokio::test]
    async fn test_invalid_locator_is_query_error() {
        let mut s = session();
        s.navigate("https://board.example/1").await.unwrap();
        let err = s
            .find_all(Scope::Page, &Locator::css("div["))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Query(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_element_times_out() {
        let mut s = session().with_poll_interval(Duration::from_millis(100));
        s.navigate("https://board.example/1").await.unwrap();

        let start = tokio::time::Instant::now();
        let found = s
            .wait_for_element(Scope::Page, &Locator::css("div.nope"), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(found.is_none());
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_factory_sessions_share_source() {
        let factory = StaticSessionFactory::new(
            InMemoryPages::from_pairs([("https://board.example/1", PAGE)]),
            Duration::from_millis(10),
        );
        let mut a = factory.open().await.unwrap();
        let mut b = factory.open().await.unwrap();
        a.navigate("https://board.example/1").await.unwrap();
        b.navigate("https://board.example/1").await.unwrap();
        assert_eq!(a.current_url(), b.current_url());
        assert_eq!(b.poll_interval(), Duration::from_millis(10));
    }
}
