//! Checkpoint re-read and terminal state.

use crate::backend::output_extension;
use crate::error::BackendError;
use crate::notifications::Notification;
use crate::types::{Event, Job, JobState};
use crate::utils::{cleanup_partial_files, locate_output_file};

use super::context::JobTaskContext;

/// Decide and write the terminal state once the backend call has returned
///
/// Persisted state is re-read first. Cancellation always wins:
/// - row gone (deleted): remove leftover files, write nothing
/// - CANCELLED: remove leftover files, send a cancelled notification, write nothing
/// - still DOWNLOADING and the call was aborted without a cancel (shutdown): leave the row
///   for the startup sweep
/// - still DOWNLOADING otherwise: write COMPLETED or FAILED, guarded on the state so a cancel
///   landing during the write still wins
pub(super) async fn finalize_job(
    ctx: &JobTaskContext,
    stem: &str,
    outcome: Result<(), BackendError>,
) {
    let id = ctx.id;

    let current = match ctx.db().get_job(id).await {
        Ok(current) => current,
        Err(e) => {
            tracing::error!(job_id = id.0, error = %e, "Failed to re-read job at checkpoint");
            return;
        }
    };

    let job = match current {
        None => {
            tracing::debug!(job_id = id.0, "Job deleted while running");
            cleanup_after(ctx, stem).await;
            return;
        }
        Some(job) if job.state == JobState::Cancelled => {
            finish_cancelled(ctx, &job, stem).await;
            return;
        }
        Some(job) if job.state != JobState::Downloading => {
            tracing::warn!(
                job_id = id.0,
                state = job.state.as_str(),
                "Job left DOWNLOADING under a running task, leaving it as is"
            );
            return;
        }
        Some(job) => job,
    };

    match outcome {
        Ok(()) => complete(ctx, job, stem).await,
        Err(BackendError::Cancelled) => {
            tracing::info!(
                job_id = id.0,
                "Backend call aborted by shutdown, job left for the startup sweep"
            );
        }
        Err(e) => fail(ctx, job, stem, &e.to_string()).await,
    }
}

/// Fail a job whose backend request could not be prepared
pub(super) async fn fail_before_backend(ctx: &JobTaskContext, job: Job, message: &str) {
    // Nothing was written to disk, so there is nothing to clean up
    let id = ctx.id;
    let failed = Job {
        state: JobState::Failed,
        error_message: Some(message.to_string()),
        ..job
    };
    match ctx.db().update_job_if_state(&failed, JobState::Downloading).await {
        Ok(true) => {
            tracing::warn!(job_id = id.0, error = %message, "Job failed before backend call");
            ctx.emit(Event::Failed {
                id,
                error: message.to_string(),
            });
            ctx.notify(Notification::failed(id, &failed.title, message));
        }
        Ok(false) => {
            tracing::debug!(job_id = id.0, "Job left DOWNLOADING before it could fail");
        }
        Err(e) => {
            tracing::error!(job_id = id.0, error = %e, "Failed to mark job failed");
        }
    }
}

async fn complete(ctx: &JobTaskContext, job: Job, stem: &str) {
    let id = ctx.id;
    let dir = &ctx.config().download.download_dir;
    let path = locate_output_file(dir, stem, output_extension(job.mode, &ctx.config().backend)).await;

    let on_disk = tokio::fs::metadata(&path).await.map(|m| m.len()).ok();
    let downloaded = on_disk.unwrap_or(job.downloaded_size_bytes.max(job.total_size_bytes));

    let completed = Job {
        state: JobState::Completed,
        progress_percent: 100.0,
        downloaded_size_bytes: downloaded,
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
        file_path: Some(path.clone()),
        completed_at: Some(chrono::Utc::now()),
        error_message: None,
        ..job
    };

    match ctx
        .db()
        .update_job_if_state(&completed, JobState::Downloading)
        .await
    {
        Ok(true) => {
            tracing::info!(
                job_id = id.0,
                path = %path.display(),
                found_on_disk = on_disk.is_some(),
                "Job completed"
            );
            ctx.emit(Event::Completed { id, path });
            ctx.notify(Notification::completed(id, &completed.title));
        }
        Ok(false) => lost_final_write(ctx, stem).await,
        Err(e) => {
            tracing::error!(job_id = id.0, error = %e, "Failed to mark job completed");
        }
    }
}

async fn fail(ctx: &JobTaskContext, job: Job, stem: &str, message: &str) {
    let id = ctx.id;
    let failed = Job {
        state: JobState::Failed,
        error_message: Some(message.to_string()),
        ..job
    };

    // Clean up while still DOWNLOADING; a retry may reuse the stem once FAILED is written
    cleanup_after(ctx, stem).await;

    match ctx.db().update_job_if_state(&failed, JobState::Downloading).await {
        Ok(true) => {
            tracing::warn!(job_id = id.0, error = %message, "Job failed");
            ctx.emit(Event::Failed {
                id,
                error: message.to_string(),
            });
            ctx.notify(Notification::failed(id, &failed.title, message));
        }
        Ok(false) => lost_final_write(ctx, stem).await,
        Err(e) => {
            tracing::error!(job_id = id.0, error = %e, "Failed to mark job failed");
        }
    }
}

/// The guarded terminal write matched nothing: a cancel or delete landed after the re-read
async fn lost_final_write(ctx: &JobTaskContext, stem: &str) {
    match ctx.db().get_job(ctx.id).await {
        Ok(Some(job)) if job.state == JobState::Cancelled => {
            finish_cancelled(ctx, &job, stem).await;
        }
        Ok(_) => cleanup_after(ctx, stem).await,
        Err(e) => {
            tracing::error!(job_id = ctx.id.0, error = %e, "Failed to re-read job after lost write");
        }
    }
}

async fn finish_cancelled(ctx: &JobTaskContext, job: &Job, stem: &str) {
    tracing::info!(job_id = ctx.id.0, "Job cancelled, keeping CANCELLED");
    cleanup_after(ctx, stem).await;
    ctx.notify(Notification::cancelled(ctx.id, &job.title));
}

async fn cleanup_after(ctx: &JobTaskContext, stem: &str) {
    let removed = cleanup_partial_files(&ctx.config().download.download_dir, stem).await;
    if removed > 0 {
        tracing::debug!(job_id = ctx.id.0, removed, "Removed leftover files");
    }
}
