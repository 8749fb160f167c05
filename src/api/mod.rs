//! REST API server module
//!
//! Exposes the caller operations (start, cancel, retry, delete, queries, probe) over HTTP,
//! plus a server-sent event stream and an OpenAPI document.

use crate::{Config, MediaDownloader, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Path prefix the served router is mounted under
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Jobs
/// - `GET /jobs` - List jobs, newest first (`?state=` filters by state)
/// - `POST /jobs` - Start a job from a [`JobSpec`](crate::types::JobSpec)
/// - `GET /jobs/:id` - Get one job
/// - `DELETE /jobs/:id` - Delete a job and its output file
/// - `GET /jobs/:id/progress` - Live progress of a running job
/// - `POST /jobs/:id/cancel` - Cancel a job
/// - `POST /jobs/:id/retry` - Retry a failed job
/// - `GET /progress` - Live progress of every running job
///
/// ## Probe
/// - `POST /probe` - List title and formats for a URL
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(downloader: Arc<MediaDownloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let router = Router::new()
        // Jobs
        .route("/jobs", get(routes::list_jobs).post(routes::start_job))
        .route("/jobs/:id", get(routes::get_job).delete(routes::delete_job))
        .route("/jobs/:id/progress", get(routes::get_job_progress))
        .route("/jobs/:id/cancel", post(routes::cancel_job))
        .route("/jobs/:id/retry", post(routes::retry_job))
        .route("/progress", get(routes::list_progress))
        // Probe
        .route("/probe", post(routes::probe_media))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // SwaggerUi reuses the /openapi.json endpoint defined above
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin. Origins that are not valid header values are
/// ignored.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// The router from [`create_router`] is mounted under [`API_PREFIX`]. Runs until the server
/// stops.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaDownloader};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(MediaDownloader::new((*config).clone()).await?);
///
/// // Blocks until the server stops
/// media_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<MediaDownloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = Router::new().nest(API_PREFIX, create_router(downloader, config));

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
