//! Startup sweep and shutdown coordination.

use crate::config::StaleJobPolicy;
use crate::error::Result;
use crate::types::{Event, JobState};
use std::sync::atomic::Ordering;

use super::MediaDownloader;

impl MediaDownloader {
    /// Reconcile jobs left behind by a previous process and relaunch queued ones
    ///
    /// Rows left DOWNLOADING have no task any more. Under [`StaleJobPolicy::MarkFailed`] they
    /// become FAILED ("interrupted by restart") and can be retried; under
    /// [`StaleJobPolicy::Requeue`] they go back to QUEUED. Every QUEUED row then gets a fresh
    /// execution task.
    pub(crate) async fn restore_jobs(&self) -> Result<()> {
        if self.db.was_unclean_shutdown().await? {
            tracing::warn!("Previous session did not shut down cleanly");
        }

        let swept = match self.config.persistence.stale_job_policy {
            StaleJobPolicy::MarkFailed => self.db.fail_interrupted_jobs().await?,
            StaleJobPolicy::Requeue => self.db.requeue_interrupted_jobs().await?,
        };
        if swept > 0 {
            tracing::info!(
                swept,
                policy = ?self.config.persistence.stale_job_policy,
                "Swept jobs interrupted by restart"
            );
        }

        let queued = self.db.list_jobs_by_state(JobState::Queued).await?;
        if !queued.is_empty() {
            tracing::info!(count = queued.len(), "Relaunching queued jobs");
        }
        // Oldest first, so jobs restart in the order they were queued
        for job in queued.into_iter().rev() {
            self.spawn_job_task(job.id).await;
        }

        Ok(())
    }

    /// Gracefully shut down the orchestrator
    ///
    /// 1. Stops accepting new jobs (`start` and `retry` return `ShuttingDown`)
    /// 2. Aborts every running backend call and stops background services
    /// 3. Waits up to 30 seconds for execution tasks to finish
    /// 4. Marks a clean shutdown in the database and emits [`Event::Shutdown`]
    ///
    /// Jobs whose call was aborted stay DOWNLOADING and are handled by the startup sweep of
    /// the next session.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.registry.accepting_new.store(false, Ordering::SeqCst);
        self.registry.shutdown_token.cancel();

        {
            let active = self.registry.active_jobs.lock().await;
            tracing::debug!(active_count = active.len(), "Aborting active jobs");
            for (id, job) in active.iter() {
                tracing::debug!(job_id = id.0, "Signaling abort");
                job.token.cancel();
            }
        }

        let shutdown_timeout = std::time::Duration::from_secs(30);
        match tokio::time::timeout(shutdown_timeout, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All active jobs finished"),
            Err(_) => {
                tracing::warn!("Timeout waiting for active jobs to finish, proceeding with shutdown")
            }
        }

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        } else {
            tracing::info!("Marked clean shutdown in database");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.registry.active_jobs.lock().await.len();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active jobs to finish");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
