use super::*;
use crate::downloader::test_helpers::{self, ScriptedBackend};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

mod system;

/// Helper to create a test MediaDownloader wrapped in Arc
async fn create_test_downloader() -> (Arc<MediaDownloader>, tempfile::TempDir) {
    let (downloader, temp_dir) = test_helpers::create_test_downloader().await;
    (Arc::new(downloader), temp_dir)
}

/// Helper to create a test MediaDownloader with a scripted backend
async fn create_test_downloader_with(
    backend: Arc<ScriptedBackend>,
) -> (Arc<MediaDownloader>, tempfile::TempDir) {
    let (downloader, _notifier, temp_dir) =
        test_helpers::create_test_downloader_with(backend, |_| {}).await;
    (Arc::new(downloader), temp_dir)
}

/// Router over the downloader's own config
fn app_for(downloader: &Arc<MediaDownloader>) -> Router {
    create_router(downloader.clone(), downloader.config.clone())
}

/// Send one request and return status plus parsed JSON body (Null when empty)
async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    // Port 0 = OS assigns a free port
    let mut config = (*downloader.config).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        let config = config.clone();
        async move { start_api_server(downloader, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_server_starts_and_responds_to_health() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = app_for(&downloader);
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body = response.json::<serde_json::Value>().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    server_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.config).clone();
    config.server.api.cors_enabled = true;
    config.server.api.cors_origins = vec!["*".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.config).clone();
    config.server.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://allowed.example"
    );

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://other.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.config).clone();
    config.server.api.cors_enabled = false;
    let app = create_router(downloader, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_spawn_api_server_method() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    // The default bind address may be taken on the test host; only the spawn itself matters
    let api_handle = downloader.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    api_handle.abort();
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.config).clone();
    config.server.api.swagger_ui = true;
    let app = create_router(downloader, Arc::new(config));

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();
    assert!(body_str.contains("<html") || body_str.contains("<!DOCTYPE html>"));
}

#[tokio::test]
async fn test_swagger_ui_disabled() {
    let (downloader, _temp_dir) = create_test_downloader().await;

    let mut config = (*downloader.config).clone();
    config.server.api.swagger_ui = false;
    let app = create_router(downloader, Arc::new(config));

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
