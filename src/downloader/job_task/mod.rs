//! Job execution task: one independent task per active job.
//!
//! Split into focused submodules:
//! - [`context`] - Shared task state and release of held resources
//! - [`execution`] - Backend call and the progress callback
//! - [`finalization`] - Checkpoint re-read and terminal state

mod context;
mod execution;
mod finalization;

pub(crate) use context::JobTaskContext;

use crate::backend::BackendRequest;
use crate::notifications::Notification;
use crate::types::{Event, Job, JobState};
use crate::utils::sanitize_title;

use execution::run_backend;
use finalization::{fail_before_backend, finalize_job};


/// Execution task for a single job
///
/// Phases:
/// 1. Move the job QUEUED → DOWNLOADING (exit quietly if it was cancelled or deleted first)
/// 2. Claim an output stem and build the backend request from the stored format selection
/// 3. Run the backend, publishing progress as it arrives
/// 4. Re-read persisted state and write the terminal state
///
/// Whatever happens, the job's progress entry, output stem and active registration are
/// released before the task ends.
pub(crate) async fn run_job_task(mut ctx: JobTaskContext) {
    execute_job(&mut ctx).await;
    ctx.release().await;
}

async fn execute_job(ctx: &mut JobTaskContext) {
    let id = ctx.id;

    match ctx
        .db()
        .transition_state(id, JobState::Queued, JobState::Downloading)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            // Cancelled or deleted before the task got going
            if let Ok(Some(job)) = ctx.db().get_job(id).await
                && job.state == JobState::Cancelled
            {
                ctx.notify(Notification::cancelled(id, &job.title));
            }
            tracing::debug!(job_id = id.0, "Job no longer queued, task exiting");
            return;
        }
        Err(e) => {
            tracing::error!(job_id = id.0, error = %e, "Failed to mark job downloading");
            return;
        }
    }

    let job: Job = match ctx.db().get_job(id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::debug!(job_id = id.0, "Job deleted before start, task exiting");
            return;
        }
        Err(e) => {
            tracing::error!(job_id = id.0, error = %e, "Failed to load job record");
            return;
        }
    };

    tracing::info!(job_id = id.0, title = %job.title, "Job started");
    ctx.emit(Event::Started { id });
    ctx.notify(Notification::started(id, &job.title));

    let stem = match ctx.claim_stem(&sanitize_title(&job.title)) {
        Ok(stem) => stem,
        Err(e) => {
            fail_before_backend(ctx, job, &e.to_string()).await;
            return;
        }
    };

    let request = match BackendRequest::for_job(
        &job,
        &ctx.config().download.download_dir,
        &stem,
        &ctx.config().backend,
    ) {
        Ok(request) => request,
        Err(e) => {
            fail_before_backend(ctx, job, &e.to_string()).await;
            return;
        }
    };

    tracing::debug!(
        job_id = id.0,
        stem = %stem,
        backend = ctx.downloader.backend.name(),
        "Invoking extraction backend"
    );

    let outcome = run_backend(ctx, &job, &request).await;
    finalize_job(ctx, &stem, outcome).await;
}
