//! Backend call and progress callback.

use crate::backend::{BackendProgress, BackendRequest};
use crate::error::BackendError;
use crate::notifications::Notification;
use crate::progress::parser::normalize_percent;
use crate::progress::{extract_eta, extract_speed};
use crate::types::{Event, Job, ProgressSnapshot};
use tokio::sync::mpsc;

use super::context::JobTaskContext;

/// Run the backend for `request`, consuming its progress reports as they arrive
///
/// The backend and the progress consumer run concurrently on this task; the consumer ends
/// when the backend drops its sender.
pub(super) async fn run_backend(
    ctx: &JobTaskContext,
    job: &Job,
    request: &BackendRequest,
) -> Result<(), BackendError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let backend = ctx.downloader.backend.clone();

    let (outcome, ticks) = tokio::join!(
        backend.execute(request, tx, ctx.cancel_token.clone()),
        consume_progress(ctx, job, rx)
    );

    tracing::debug!(
        job_id = ctx.id.0,
        ticks,
        ok = outcome.is_ok(),
        "Backend call returned"
    );
    outcome
}

/// Progress callback: one snapshot, one store write, one event and one notification per tick
///
/// Returns the number of ticks seen.
async fn consume_progress(
    ctx: &JobTaskContext,
    job: &Job,
    mut rx: mpsc::UnboundedReceiver<BackendProgress>,
) -> usize {
    let id = ctx.id;
    let mut downloaded = 0u64;
    let mut ticks = 0;

    while let Some(tick) = rx.recv().await {
        ticks += 1;

        // Cancelled or deleted: the job is no longer DOWNLOADING, publish nothing more
        if ctx.cancel_token.is_cancelled() {
            continue;
        }

        let percent = normalize_percent(tick.percent);
        if let Some(total) = tick.total_bytes {
            downloaded = (total as f64 * f64::from(percent) / 100.0).round() as u64;
        }
        let speed = extract_speed(&tick.line);
        let eta = extract_eta(&tick.line);

        ctx.progress().set(ProgressSnapshot {
            id,
            progress_percent: percent,
            downloaded_size_bytes: downloaded,
            total_size_bytes: tick.total_bytes.unwrap_or(job.total_size_bytes),
            speed_text: speed.clone(),
            eta_text: eta.clone(),
            status_description: Some("Downloading".to_string()),
        });
        // Cancel trips the token before it clears the bus; re-check so a racing
        // set never leaves an entry behind
        if ctx.cancel_token.is_cancelled() {
            ctx.progress().remove(id);
            continue;
        }

        tracing::trace!(job_id = id.0, percent, speed = %speed, eta = %eta, "Progress tick");

        if let Err(e) = ctx.db().update_progress(id, percent, downloaded).await {
            tracing::error!(job_id = id.0, error = %e, "Failed to persist progress");
        }

        ctx.emit(Event::Progress {
            id,
            percent,
            speed: speed.clone(),
            eta: eta.clone(),
        });
        ctx.notify(Notification::progress(id, &job.title, percent, &speed, &eta));
    }

    ticks
}
