//! Integration tests for OCR enrichment over persisted dumps
//!
//! Images are served by a wiremock server and recognized by a fake engine,
//! so no tesseract installation is needed.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thread_sift::config::FetchConfig;
use thread_sift::fetch::FetchSession;
use thread_sift::ocr::{decode_image, Enricher, OcrEngine, OcrError};
use thread_sift::output::{load_records, write_json_new};
use thread_sift::{InteractionCounts, Media, Record, Reply, Timestamp};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Engine that reports the image size instead of reading text
#[derive(Default)]
struct SizeEngine {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl OcrEngine for SizeEngine {
    async fn recognize_text(&self, image: &[u8]) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let decoded = decode_image(image)?;
        Ok(format!("  {}x{}\n", decoded.width(), decoded.height()))
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

fn fetch_session() -> FetchSession {
    FetchSession::from_config(&FetchConfig {
        max_retries: 0,
        timeout_secs: 5,
        ..FetchConfig::default()
    })
    .expect("Failed to build session")
}

fn record(id: &str, media: Vec<String>, reply_media: Vec<String>) -> Record {
    Record {
        id: id.to_string(),
        url: format!("https://forum.example/posts/{}", id),
        author: Some("@someone".to_string()),
        text: Some("post".to_string()),
        timestamp: Timestamp::missing(),
        counts: InteractionCounts::default(),
        media: media.into_iter().map(Media::new).collect(),
        replies: vec![Reply {
            id: format!("{}-r1", id),
            author: None,
            text: Some("reply".to_string()),
            timestamp: Timestamp::missing(),
            media: reply_media.into_iter().map(Media::new).collect(),
            likes: None,
        }],
    }
}

async fn mount_image(server: &MockServer, image_path: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .insert_header("content-type", "image/png"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_enrich_record_and_reply_media() {
    let mock_server = MockServer::start().await;
    mount_image(&mock_server, "/media/a.png", png(3, 2)).await;
    mount_image(&mock_server, "/media/b.png", png(5, 4)).await;

    let base = mock_server.uri();
    let mut records = vec![record(
        "1",
        vec![format!("{}/media/a.png", base)],
        vec![format!("{}/media/b.png", base)],
    )];

    let enricher = Enricher::new(fetch_session(), SizeEngine::default(), 2);
    let summary = enricher.enrich_all(&mut records).await;

    assert_eq!(summary.recognized, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(records[0].media[0].text.as_deref(), Some("3x2"));
    assert_eq!(records[0].replies[0].media[0].text.as_deref(), Some("5x4"));
    assert!(records[0].all_media().all(|m| m.ocr_error.is_none()));
}

#[tokio::test]
async fn test_failed_entries_marked_and_batch_continues() {
    let mock_server = MockServer::start().await;
    mount_image(&mock_server, "/media/ok.png", png(1, 1)).await;
    mount_image(&mock_server, "/media/garbage.png", b"<html>nope</html>".to_vec()).await;

    let base = mock_server.uri();
    let mut records = vec![
        record("1", vec![format!("{}/media/missing.png", base)], vec![]),
        record(
            "2",
            vec![
                format!("{}/media/garbage.png", base),
                format!("{}/media/ok.png", base),
            ],
            vec![],
        ),
    ];

    let enricher = Enricher::new(fetch_session(), SizeEngine::default(), 4);
    let summary = enricher.enrich_all(&mut records).await;

    assert_eq!(summary.recognized, 1);
    assert_eq!(summary.failed, 2);

    let missing = &records[0].media[0];
    assert_eq!(missing.text.as_deref(), Some(""));
    assert!(missing.ocr_error.as_deref().unwrap().contains("404"));

    let garbage = &records[1].media[0];
    assert_eq!(garbage.text.as_deref(), Some(""));
    assert!(garbage.ocr_error.as_deref().unwrap().contains("decode"));

    assert_eq!(records[1].media[1].text.as_deref(), Some("1x1"));
}

#[tokio::test]
async fn test_second_pass_processes_nothing() {
    let mock_server = MockServer::start().await;
    mount_image(&mock_server, "/media/a.png", png(2, 2)).await;

    let mut records = vec![record(
        "1",
        vec![format!("{}/media/a.png", mock_server.uri())],
        vec![],
    )];

    let engine = SizeEngine::default();
    let calls = Arc::clone(&engine.calls);
    let enricher = Enricher::new(fetch_session(), engine, 1);

    let first = enricher.enrich_all(&mut records).await;
    let second = enricher.enrich_all(&mut records).await;

    assert_eq!(first.total(), 1);
    assert_eq!(second.total(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_enriched_dump_round_trips_through_disk() {
    let mock_server = MockServer::start().await;
    mount_image(&mock_server, "/media/a.png", png(4, 1)).await;

    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("forum_data_20240115_103000.json");
    let original = vec![record(
        "7",
        vec![format!("{}/media/a.png", mock_server.uri())],
        vec![],
    )];
    write_json_new(&dump, &original).unwrap();

    let mut records = load_records(&dump).unwrap();
    let enricher = Enricher::new(fetch_session(), SizeEngine::default(), 1);
    enricher.enrich_all(&mut records).await;

    let enriched = write_json_new(&dir.path().join("forum_data_20240115_103000_ocr.json"), &records).unwrap();
    let reloaded = load_records(&enriched).unwrap();

    assert_eq!(reloaded[0].media[0].text.as_deref(), Some("4x1"));
    assert_eq!(load_records(&dump).unwrap(), original);
}
