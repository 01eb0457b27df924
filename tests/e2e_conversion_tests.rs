//! End-to-end tests for conversions, progress streams and artifact transfer.
#![cfg(unix)]

mod common;

use common::{FakeTool, TestServer, SILENT_CONVERSION, SINGLE_LINK};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tunegrab::client::{ApiClient, StreamEvent};

const CRASHING_CONVERSION: &str = r#"echo "ERROR: Unsupported URL" >&2
exit 1"#;

fn api(server: &TestServer) -> ApiClient {
    ApiClient::new(&server.base_url, Duration::from_secs(10)).unwrap()
}

/// Drains a progress stream, returning the percents and the terminal event.
async fn follow(api: &ApiClient, url: &str) -> (Vec<u8>, StreamEvent) {
    let mut subscription = api.subscribe_progress(url).await.unwrap();
    let mut percents = Vec::new();
    loop {
        match subscription.next_event().await.unwrap() {
            Some(StreamEvent::Progress(update)) => percents.push(update.percent),
            Some(terminal) => {
                assert!(subscription.next_event().await.unwrap().is_none());
                return (percents, terminal);
            }
            None => panic!("stream finished without a terminal event"),
        }
    }
}

#[tokio::test]
async fn test_progress_stream_ends_with_completed_artifact() {
    let server = TestServer::spawn(FakeTool::default()).await;
    let api = api(&server);

    let (percents, terminal) = follow(&api, SINGLE_LINK).await;

    assert_eq!(
        terminal,
        StreamEvent::Completed {
            filename: "Alice_-_Song.mp3".to_string(),
            title: "Alice - Song".to_string(),
        }
    );
    assert_eq!(percents.first(), Some(&10));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    let (last, before) = percents.split_last().unwrap();
    assert_eq!(*last, 100);
    assert!(before.iter().all(|p| *p <= 95));
    assert!(before.contains(&90));
    assert!(server.artifact_path("Alice_-_Song.mp3").exists());
}

#[tokio::test]
async fn test_missing_output_is_a_terminal_failure() {
    let server =
        TestServer::spawn(FakeTool::default().with_conversion(SILENT_CONVERSION)).await;

    let (_, terminal) = follow(&api(&server), SINGLE_LINK).await;

    match terminal {
        StreamEvent::Failed { error } => assert!(error.contains("output missing"), "{}", error),
        other => panic!("expected a failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_raw_stream_payloads() {
    let server =
        TestServer::spawn(FakeTool::default().with_conversion(CRASHING_CONVERSION)).await;

    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/download-progress/{}",
            server.base_url,
            urlencoding::encode(SINGLE_LINK)
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = response.text().await.unwrap();
    let payloads: Vec<Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect();

    assert_eq!(
        payloads.first().unwrap(),
        &json!({ "progress": 10, "message": "Fetching track info..." })
    );
    let last = payloads.last().unwrap();
    assert_eq!(last["success"], false);
    assert_eq!(last["progress"], 0);
    assert_eq!(last["message"], "Download failed");
    assert_eq!(last["error"], "download process exited with code 1");
    assert_eq!(payloads.iter().filter(|p| p.get("success").is_some()).count(), 1);
}

#[tokio::test]
async fn test_progress_stream_rejects_foreign_links() {
    let server = TestServer::spawn(FakeTool::default()).await;

    let response = reqwest::Client::new()
        .get(format!(
            "{}/api/download-progress/{}",
            server.base_url,
            urlencoding::encode("https://example.com/a/b")
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Only soundcloud.com URLs are allowed");
}

#[tokio::test]
async fn test_non_streaming_conversion_then_transfer() {
    let server = TestServer::spawn(FakeTool::default()).await;
    let api = api(&server);

    let converted = api.convert(SINGLE_LINK).await.unwrap();
    assert_eq!(converted.filename, "Alice_-_Song.mp3");
    assert_eq!(converted.title, "Alice - Song");

    let response = reqwest::Client::new()
        .get(format!("{}/api/download/{}", server.base_url, converted.filename))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "audio/mpeg");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"Alice_-_Song.mp3\""
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"ID3fake-audio");

    // Transferred artifacts are removed shortly after the stream ends.
    let artifact = server.artifact_path(&converted.filename);
    for _ in 0..50 {
        if !artifact.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!artifact.exists());

    let missing = reqwest::Client::new()
        .get(format!("{}/api/download/{}", server.base_url, converted.filename))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::spawn(FakeTool::default()).await;
    let health = api(&server).health().await.unwrap();
    assert_eq!(health.status, "OK");
    assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
}
