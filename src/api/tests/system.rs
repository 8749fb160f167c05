use super::*;
use crate::downloader::test_helpers::audio_only_spec;
use futures::StreamExt;

#[tokio::test]
async fn test_health_endpoint() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let (status, body) = send(app_for(&downloader), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["backend"], "scripted");
    assert_eq!(body["backend_available"], true);
    assert_eq!(body["accepting_jobs"], true);
    assert_eq!(body["active_jobs"], 0);
}

#[tokio::test]
async fn test_health_after_shutdown() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    downloader.shutdown().await.unwrap();

    let (status, body) = send(app_for(&downloader), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepting_jobs"], false);
}

#[tokio::test]
async fn test_openapi_json_endpoint() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let (status, json) = send(app_for(&downloader), get("/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["openapi"].as_str().unwrap().starts_with("3."));
    assert_eq!(json["info"]["title"], "media-dl REST API");
    assert!(json["paths"].get("/api/v1/jobs").is_some());
}

#[tokio::test]
async fn test_sse_event_stream() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = app_for(&downloader);

    let request = Request::builder()
        .uri("/events")
        .header("Accept", "text/event-stream")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(
        content_type.contains("text/event-stream"),
        "Content-Type should be text/event-stream, got: {}",
        content_type
    );

    // The handler has subscribed by now; the first event on the wire is the job's Queued
    let id = downloader.start(audio_only_spec("streamed")).await.unwrap();

    let mut body = response.into_body().into_data_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();

    assert!(text.contains("event: queued"), "unexpected frame: {}", text);
    assert!(text.contains(&format!("\"id\":{}", id)));
    assert!(text.contains("\"title\":\"streamed\""));
}
