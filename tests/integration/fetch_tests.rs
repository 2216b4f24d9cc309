//! Integration tests for the resilient fetch session
//!
//! These tests use wiremock to check the retry classification against real
//! HTTP exchanges.

use reqwest::Method;
use std::time::Duration;
use thread_sift::config::FetchConfig;
use thread_sift::fetch::{FetchError, FetchSession};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fetch configuration with fast backoff for testing
fn fast_config(max_retries: u32) -> FetchConfig {
    FetchConfig {
        max_retries,
        backoff_factor: 0.01,
        timeout_secs: 5,
        ..FetchConfig::default()
    }
}

fn session(max_retries: u32) -> FetchSession {
    FetchSession::from_config(&fast_config(max_retries)).expect("Failed to build session")
}

#[tokio::test]
async fn test_retries_transient_status_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image-bytes".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/media/a.jpg", mock_server.uri());
    let body = session(3).fetch(&url, None).await.expect("Fetch failed");
    assert_eq!(body, b"image-bytes");
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/gone", mock_server.uri());
    let err = session(3).fetch(&url, None).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::HttpStatus {
            url: url.clone(),
            status: 404
        }
    );
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let url = format!("{}/flaky", mock_server.uri());
    let err = session(2).fetch(&url, None).await.unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn test_method_outside_policy_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/upload", mock_server.uri());
    let err = session(3)
        .request(Method::PUT, &url, Some(b"x".to_vec()), None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let url = format!("{}/slow", mock_server.uri());
    let err = session(1)
        .fetch(&url, Some(Duration::from_millis(200)))
        .await
        .unwrap_err();

    match err {
        FetchError::Transport { url: failed, message } => {
            assert_eq!(failed, url);
            assert!(message.contains("timed out"), "unexpected message {}", message);
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let mock_server = MockServer::start().await;
    let url = format!("{}/anything", mock_server.uri());
    drop(mock_server);

    let err = session(1).fetch(&url, None).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_shared_session_concurrent_callers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(8)
        .mount(&mock_server)
        .await;

    let session = session(0);
    let mut handles = Vec::new();
    for i in 0..8 {
        let session = session.clone();
        let url = format!("{}/item/{}", mock_server.uri(), i);
        handles.push(tokio::spawn(async move { session.fetch(&url, None).await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), b"ok");
    }
}
