//! Read side: job listings, streams and live progress.

use crate::error::Result;
use crate::types::{Job, JobId, JobState, ProgressSnapshot};
use futures::TryStreamExt;
use futures::stream::BoxStream;

use super::MediaDownloader;

impl MediaDownloader {
    /// Every job, newest first
    pub async fn all_jobs(&self) -> Result<Vec<Job>> {
        self.jobs_stream().try_collect().await
    }

    /// Jobs in one state, newest first
    pub async fn jobs_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        self.jobs_by_state_stream(state).try_collect().await
    }

    /// Stream every job, newest first
    pub fn jobs_stream(&self) -> BoxStream<'_, Result<Job>> {
        self.db.stream_jobs()
    }

    /// Stream jobs in one state, newest first
    pub fn jobs_by_state_stream(&self, state: JobState) -> BoxStream<'_, Result<Job>> {
        self.db.stream_jobs_by_state(state)
    }

    /// Latest live progress for a running job
    ///
    /// `None` when the job is not running or has not reported progress yet.
    pub fn progress_of(&self, id: JobId) -> Option<ProgressSnapshot> {
        self.progress.get(id)
    }

    /// Live progress of every running job that has reported at least once
    pub fn all_progress(&self) -> Vec<ProgressSnapshot> {
        self.progress.all()
    }
}
