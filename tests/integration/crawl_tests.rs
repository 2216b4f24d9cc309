//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! discover -> extract -> persist cycle end-to-end.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thread_sift::config::{parse_config, Config};
use thread_sift::crawler::{run_crawl, run_crawl_with, Termination};
use thread_sift::fetch::FetchSession;
use thread_sift::output::load_records;
use thread_sift::render::{InMemoryPages, PageSource, SessionError, StaticSessionFactory};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a 4plebs-style configuration against the mock server
fn create_test_config(base_url: &str, out_dir: &Path, target: usize, workers: usize) -> Config {
    parse_config(&format!(
        r#"
[crawler]
target-count = {target}
workers = {workers}
root-wait-ms = 200
field-wait-ms = 50
listing-wait-ms = 200
reply-wait-ms = 50
reply-field-wait-ms = 20
poll-interval-ms = 10

[listing]
base-url = "{base_url}/pol/"
pagination = {{ style = "path-segment" }}
item-locators = [{{ by = "css", selector = "article.clearfix.thread" }}]
url-attribute = "id"
url-template = "{base_url}/pol/thread/{{value}}/"

[identity]
id-pattern = '/thread/(\d+)/'

[fields]
root = [{{ by = "css", selector = "article.thread" }}]
author = [{{ by = "css", selector = "span.poster_hash" }}]
author-strip = ["ID:"]
body = [{{ by = "css", selector = "div.text" }}]
timestamp = [{{ by = "tag", name = "time" }}]

[replies]
containers = [{{ by = "css", selector = "aside.posts article" }}]
id-attributes = ["id"]
body = [{{ by = "css", selector = "div.text" }}]

[media]
url-pattern = 'src="(https://i\.4pcdn\.org/pol/[^"]+\.(?:jpg|png))"'
rewrites = [{{ from = "s.jpg", to = ".jpg" }}]

[filters]
min-replies = 1

[fetch]
max-retries = 0
timeout-secs = 5

[output]
directory = '{out}'
prefix = "4plebs_data"
"#,
        target = target,
        workers = workers,
        base_url = base_url,
        out = out_dir.display(),
    ))
    .expect("Failed to build test config")
}

fn listing_page(ids: &[u32]) -> String {
    let threads: String = ids
        .iter()
        .map(|id| format!(r#"<article class="clearfix thread" id="{}"><div class="text">Thread {}</div></article>"#, id, id))
        .collect();
    format!("<html><body>{}</body></html>", threads)
}

fn thread_page(id: u32, replies: usize) -> String {
    let posts: String = (0..replies)
        .map(|i| format!(r#"<article class="post" id="{}{}"><div class="text">reply {}</div></article>"#, id, i, i))
        .collect();
    format!(
        r#"<html><body>
<article class="clearfix thread" id="{id}">
  <span class="poster_hash">ID:hash{id}</span>
  <time datetime="2024-01-15T10:30:00+00:00">01/15/24</time>
  <img class="thread_image" src="https://i.4pcdn.org/pol/{id}s.jpg">
  <div class="text">Opening post of thread {id}</div>
  <aside class="posts">{posts}</aside>
</article>
</body></html>"#,
        id = id,
        posts = posts
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Two listing pages (5 and 3 threads); thread 102 is gone, 104 has no replies
async fn mount_board(server: &MockServer) {
    mount_page(server, "/pol/", listing_page(&[101, 102, 103, 104, 105])).await;
    mount_page(server, "/pol/2/", listing_page(&[106, 107, 108])).await;
    for id in [101, 103, 105, 106, 107, 108] {
        mount_page(server, &format!("/pol/thread/{}/", id), thread_page(id, 2)).await;
    }
    mount_page(server, "/pol/thread/104/", thread_page(104, 0)).await;
}

fn ids(records: &[thread_sift::Record]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

#[tokio::test]
async fn test_full_crawl_two_listing_pages() {
    let mock_server = MockServer::start().await;
    mount_board(&mock_server).await;
    let out = tempfile::tempdir().unwrap();

    let config = create_test_config(&mock_server.uri(), out.path(), 6, 1);
    let report = run_crawl(config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.stats.listing_rounds, 2);
    assert_eq!(report.stats.discovered, 8);
    assert_eq!(report.stats.completed, 6);
    assert_eq!(report.stats.skipped.get("navigation failed"), Some(&1));
    assert_eq!(report.stats.disqualified.get("too few replies"), Some(&1));

    let name = report.output_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("4plebs_data_"), "unexpected name {}", name);
    assert!(!name.contains("dump"));

    let records = load_records(&report.output_path).unwrap();
    assert_eq!(ids(&records), vec!["101", "103", "105", "106", "107", "108"]);

    let first = &records[0];
    assert_eq!(first.author.as_deref(), Some("hash101"));
    assert_eq!(first.text.as_deref(), Some("Opening post of thread 101"));
    assert_eq!(first.timestamp.iso.as_deref(), Some("2024-01-15T10:30:00+00:00"));
    assert_eq!(first.media.len(), 1);
    assert_eq!(first.media[0].url, "https://i.4pcdn.org/pol/101.jpg");
    assert_eq!(first.replies.len(), 2);
    assert_eq!(first.replies[0].id, "1010");
}

#[tokio::test]
async fn test_parallel_crawl_matches_sequential_output() {
    let mock_server = MockServer::start().await;
    mount_board(&mock_server).await;
    let out = tempfile::tempdir().unwrap();

    let config = create_test_config(&mock_server.uri(), out.path(), 6, 3);
    let report = run_crawl(config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.termination, Termination::Completed);
    let records = load_records(&report.output_path).unwrap();
    assert_eq!(ids(&records), vec!["101", "103", "105", "106", "107", "108"]);
}

#[tokio::test]
async fn test_empty_listing_terminates() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/pol/", listing_page(&[])).await;
    let out = tempfile::tempdir().unwrap();

    let config = create_test_config(&mock_server.uri(), out.path(), 5, 1);
    let report = run_crawl(config, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert_eq!(report.termination, Termination::Exhausted);
    assert_eq!(report.stats.discovered, 0);
    assert!(load_records(&report.output_path).unwrap().is_empty());
}

/// Page source that fires the interrupt once `after` thread pages have loaded
#[derive(Clone)]
struct InterruptAfter {
    inner: FetchSession,
    cancel: CancellationToken,
    loaded: Arc<AtomicUsize>,
    after: usize,
}

#[async_trait]
impl PageSource for InterruptAfter {
    async fn load(&self, url: &str) -> Result<String, SessionError> {
        let html = self.inner.load(url).await?;
        if url.contains("/thread/") && self.loaded.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.cancel.cancel();
        }
        Ok(html)
    }
}

#[tokio::test]
async fn test_interrupt_persists_exactly_completed_records() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/pol/", listing_page(&[201, 202, 203, 204, 205])).await;
    for id in 201..=205 {
        mount_page(&mock_server, &format!("/pol/thread/{}/", id), thread_page(id, 1)).await;
    }
    let out = tempfile::tempdir().unwrap();
    let config = create_test_config(&mock_server.uri(), out.path(), 5, 1);

    let cancel = CancellationToken::new();
    let source = InterruptAfter {
        inner: FetchSession::from_config(&config.fetch).unwrap(),
        cancel: cancel.clone(),
        loaded: Arc::new(AtomicUsize::new(0)),
        after: 3,
    };
    let factory = StaticSessionFactory::new(source, Duration::from_millis(10));

    let report = run_crawl_with(&config, &factory, cancel).await.expect("Crawl failed");

    assert_eq!(report.termination, Termination::Interrupted);
    let name = report.output_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("4plebs_data_interrupt_dump_"), "unexpected name {}", name);

    let records = load_records(&report.output_path).unwrap();
    assert_eq!(ids(&records), vec!["201", "202", "203"]);
}

/// Page source whose session dies after the first thread page
#[derive(Clone)]
struct DiesAfterFirstThread {
    inner: InMemoryPages,
    loaded: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSource for DiesAfterFirstThread {
    async fn load(&self, url: &str) -> Result<String, SessionError> {
        if url.contains("/thread/") && self.loaded.fetch_add(1, Ordering::SeqCst) >= 1 {
            return Err(SessionError::Fatal("renderer crashed".to_string()));
        }
        self.inner.load(url).await
    }
}

#[tokio::test]
async fn test_fatal_session_error_writes_error_dump() {
    let base = "https://archive.example";
    let out = tempfile::tempdir().unwrap();
    let config = create_test_config(base, out.path(), 5, 1);
    let source = DiesAfterFirstThread {
        inner: InMemoryPages::from_pairs([
            (format!("{}/pol/", base), listing_page(&[301, 302, 303])),
            (format!("{}/pol/thread/301/", base), thread_page(301, 1)),
            (format!("{}/pol/thread/302/", base), thread_page(302, 1)),
        ]),
        loaded: Arc::new(AtomicUsize::new(0)),
    };
    let factory = StaticSessionFactory::new(source, Duration::from_millis(10));

    let report = run_crawl_with(&config, &factory, CancellationToken::new())
        .await
        .expect("Crawl failed");

    assert!(matches!(report.termination, Termination::Fatal(_)));
    assert_eq!(report.stats.fatal.as_deref(), Some("Session is unusable: renderer crashed"));
    let name = report.output_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("4plebs_data_error_dump_"), "unexpected name {}", name);
    assert_eq!(ids(&load_records(&report.output_path).unwrap()), vec!["301"]);
}
