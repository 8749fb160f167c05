//! Job control: cancel, retry, delete and get.

use crate::error::{Error, JobError, Result};
use crate::types::{Event, Job, JobId, JobState};
use std::sync::atomic::Ordering;

use super::MediaDownloader;

impl MediaDownloader {
    /// Cancel a job
    ///
    /// A QUEUED or DOWNLOADING job becomes CANCELLED immediately, its progress entry is
    /// removed and its backend call is aborted. The execution task observes CANCELLED at its
    /// checkpoint and never overwrites it.
    ///
    /// Cancelling a job that is already terminal (COMPLETED, FAILED, CANCELLED) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for an unknown id.
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        if !self.db.cancel_job(id).await? {
            return match self.db.get_job_state(id).await? {
                Some(state) => {
                    tracing::debug!(job_id = id.0, state = state.as_str(), "Cancel is a no-op");
                    Ok(())
                }
                None => Err(Error::Job(JobError::NotFound { id: id.0 })),
            };
        }

        // Token before bus: a progress tick racing with this cancel re-checks the token
        // after its write
        if let Some(active) = self.registry.active_jobs.lock().await.get(&id) {
            active.token.cancel();
        }
        self.progress.remove(id);

        tracing::info!(job_id = id.0, "Job cancelled");
        self.emit_event(Event::Cancelled { id });
        Ok(())
    }

    /// Retry a FAILED job
    ///
    /// Resets the job to QUEUED (clearing its error and progress) and launches a fresh
    /// execution task from the stored format selection.
    ///
    /// # Errors
    ///
    /// - [`JobError::NotFound`] for an unknown id
    /// - [`JobError::InvalidState`] when the job is not FAILED
    /// - [`Error::ShuttingDown`] after [`MediaDownloader::shutdown`]
    pub async fn retry(&self, id: JobId) -> Result<()> {
        if !self.registry.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        if !self.db.reset_for_retry(id).await? {
            return match self.db.get_job_state(id).await? {
                Some(state) => Err(Error::Job(JobError::InvalidState {
                    id: id.0,
                    operation: "retry".to_string(),
                    current_state: state.as_str().to_string(),
                })),
                None => Err(Error::Job(JobError::NotFound { id: id.0 })),
            };
        }

        tracing::info!(job_id = id.0, "Job reset for retry");
        self.emit_event(Event::Retried { id });
        self.spawn_job_task(id).await;
        Ok(())
    }

    /// Delete a job and its output file
    ///
    /// A running job's backend call is aborted once the row is gone. When the job is COMPLETED,
    /// the file at its `file_path` is removed; a file that is already gone is not an error.
    /// Deleting an unknown id is a no-op.
    pub async fn delete(&self, id: JobId) -> Result<()> {
        let Some(job) = self.db.get_job(id).await? else {
            tracing::debug!(job_id = id.0, "Delete of unknown job is a no-op");
            return Ok(());
        };

        if !self.db.delete_job(id).await? {
            // Lost a race with another delete
            return Ok(());
        }

        // Row first: an aborted task then finds nothing at its checkpoint and cleans up
        if let Some(active) = self.registry.active_jobs.lock().await.get(&id) {
            active.token.cancel();
        }
        self.progress.remove(id);

        if job.state == JobState::Completed
            && let Some(path) = &job.file_path
        {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    tracing::debug!(job_id = id.0, path = %path.display(), "Removed output file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(
                        job_id = id.0,
                        path = %path.display(),
                        "Output file already missing"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = id.0,
                        path = %path.display(),
                        error = %e,
                        "Failed to remove output file"
                    );
                }
            }
        }

        tracing::info!(job_id = id.0, "Job deleted");
        self.emit_event(Event::Removed { id });
        Ok(())
    }

    /// Get a job by id
    pub async fn get(&self, id: JobId) -> Result<Option<Job>> {
        self.db.get_job(id).await
    }
}
