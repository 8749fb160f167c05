//! Job handlers.

use super::{JobCreated, JobsQuery};
use crate::api::AppState;
use crate::error::{ApiError, Error, JobError};
use crate::types::{JobId, JobSpec};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /jobs - List jobs
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "jobs",
    params(JobsQuery),
    responses(
        (status = 200, description = "Jobs, newest first", body = Vec<crate::types::Job>),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn list_jobs(State(state): State<AppState>, Query(query): Query<JobsQuery>) -> Response {
    let jobs = match query.state {
        Some(job_state) => state.downloader.jobs_by_state(job_state).await,
        None => state.downloader.all_jobs().await,
    };

    match jobs {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /jobs - Start a job
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "jobs",
    request_body = JobSpec,
    responses(
        (status = 201, description = "Job queued", body = JobCreated),
        (status = 400, description = "Invalid job spec", body = ApiError),
        (status = 503, description = "Shutting down", body = ApiError)
    )
)]
pub async fn start_job(State(state): State<AppState>, Json(spec): Json<JobSpec>) -> Response {
    match state.downloader.start(spec).await {
        Ok(id) => (StatusCode::CREATED, Json(JobCreated { id })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /jobs/:id - Get one job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job record", body = crate::types::Job),
        (status = 404, description = "Job not found", body = ApiError)
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.get(JobId(id)).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => Error::Job(JobError::NotFound { id }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /jobs/:id/progress - Live progress of a running job
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}/progress",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Progress snapshot", body = crate::types::ProgressSnapshot),
        (status = 404, description = "Job unknown or not downloading", body = ApiError)
    )
)]
pub async fn get_job_progress(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.progress_of(JobId(id)) {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!("progress for job {}", id))),
        )
            .into_response(),
    }
}

/// GET /progress - Live progress of every running job
#[utoipa::path(
    get,
    path = "/api/v1/progress",
    tag = "jobs",
    responses(
        (status = 200, description = "Progress snapshots", body = Vec<crate::types::ProgressSnapshot>)
    )
)]
pub async fn list_progress(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.downloader.all_progress())
}

/// POST /jobs/:id/cancel - Cancel a job
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/cancel",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job cancelled, or already terminal"),
        (status = 404, description = "Job not found", body = ApiError)
    )
)]
pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.cancel(JobId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /jobs/:id/retry - Retry a failed job
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/retry",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job requeued"),
        (status = 404, description = "Job not found", body = ApiError),
        (status = 409, description = "Job is not failed", body = ApiError),
        (status = 503, description = "Shutting down", body = ApiError)
    )
)]
pub async fn retry_job(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.retry(JobId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /jobs/:id - Delete a job and its output file
#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{id}",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job deleted (or never existed)"),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn delete_job(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.delete(JobId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
