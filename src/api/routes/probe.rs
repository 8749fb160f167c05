//! Metadata probe handler.

use super::ProbeRequest;
use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /probe - List title, uploader, duration and formats for a URL
#[utoipa::path(
    post,
    path = "/api/v1/probe",
    tag = "probe",
    request_body = ProbeRequest,
    responses(
        (status = 200, description = "Media information", body = crate::types::MediaInfo),
        (status = 400, description = "Invalid URL", body = ApiError),
        (status = 502, description = "Backend failed or is unavailable", body = ApiError)
    )
)]
pub async fn probe_media(State(state): State<AppState>, Json(request): Json<ProbeRequest>) -> Response {
    match state.downloader.probe(&request.url).await {
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(e) => e.into_response(),
    }
}
