//! Job CRUD operations and guarded state transitions.

use crate::error::DatabaseError;
use crate::types::{Job, JobId, JobState};
use crate::{Error, Result};
use futures::{StreamExt, TryStreamExt};
use futures::stream::BoxStream;

use super::{Database, JobRow, NewJob};

const JOB_COLUMNS: &str = r#"
    id, title, source_url, thumbnail_url, file_path, file_name,
    total_size_bytes, downloaded_size_bytes, state, progress_percent,
    error_message, created_at, completed_at, duration_secs, uploader,
    video_format_label, audio_format_label, mode, video_format_id, audio_format_id
"#;

/// Error message recorded on DOWNLOADING rows found by the startup sweep
pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

/// SQLite integers are signed; sizes past `i64::MAX` are stored as `i64::MAX`
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn query_failed(context: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!("{}: {}", context, e)))
}

impl Database {
    /// Insert a new job record in the QUEUED state
    pub async fn insert_job(&self, job: &NewJob) -> Result<JobId> {
        let now = chrono::Utc::now().timestamp_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                title, source_url, thumbnail_url, total_size_bytes,
                downloaded_size_bytes, state, progress_percent, created_at,
                duration_secs, uploader, video_format_label, audio_format_label,
                mode, video_format_id, audio_format_id
            ) VALUES (?, ?, ?, ?, 0, ?, 0.0, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.title)
        .bind(&job.source_url)
        .bind(&job.thumbnail_url)
        .bind(to_sql_int(job.total_size_bytes))
        .bind(JobState::Queued.to_i32())
        .bind(now)
        .bind(job.duration_secs.map(to_sql_int))
        .bind(&job.uploader)
        .bind(&job.video_format_label)
        .bind(&job.audio_format_label)
        .bind(job.mode.to_i32())
        .bind(&job.video_format_id)
        .bind(&job.audio_format_id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to insert job", e))?;

        Ok(JobId(result.last_insert_rowid()))
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to get job", e))?;

        Ok(row.map(Job::from))
    }

    /// Current state of a job, or None if the row no longer exists
    pub async fn get_job_state(&self, id: JobId) -> Result<Option<JobState>> {
        let state: Option<i32> = sqlx::query_scalar("SELECT state FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to get job state", e))?;

        Ok(state.map(JobState::from_i32))
    }

    /// List all jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.stream_jobs().try_collect().await
    }

    /// List jobs in a specific state, newest first
    pub async fn list_jobs_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        self.stream_jobs_by_state(state).try_collect().await
    }

    /// Stream all jobs, newest first
    pub fn stream_jobs(&self) -> BoxStream<'_, Result<Job>> {
        sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                id, title, source_url, thumbnail_url, file_path, file_name,
                total_size_bytes, downloaded_size_bytes, state, progress_percent,
                error_message, created_at, completed_at, duration_secs, uploader,
                video_format_label, audio_format_label, mode, video_format_id, audio_format_id
            FROM jobs
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch(&self.pool)
        .map(|row| {
            row.map(Job::from)
                .map_err(|e| query_failed("Failed to list jobs", e))
        })
        .boxed()
    }

    /// Stream jobs in a specific state, newest first
    pub fn stream_jobs_by_state(&self, state: JobState) -> BoxStream<'_, Result<Job>> {
        sqlx::query_as::<_, JobRow>(
            r#"
            SELECT
                id, title, source_url, thumbnail_url, file_path, file_name,
                total_size_bytes, downloaded_size_bytes, state, progress_percent,
                error_message, created_at, completed_at, duration_secs, uploader,
                video_format_label, audio_format_label, mode, video_format_id, audio_format_id
            FROM jobs
            WHERE state = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(state.to_i32())
        .fetch(&self.pool)
        .map(|row| {
            row.map(Job::from)
                .map_err(|e| query_failed("Failed to list jobs by state", e))
        })
        .boxed()
    }

    /// Set a job's state unconditionally
    pub async fn update_state(&self, id: JobId, state: JobState) -> Result<()> {
        sqlx::query("UPDATE jobs SET state = ? WHERE id = ?")
            .bind(state.to_i32())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to update state", e))?;

        Ok(())
    }

    /// Move a job from `from` to `to`
    ///
    /// Returns false (and writes nothing) if the job is missing or not in `from`.
    pub async fn transition_state(&self, id: JobId, from: JobState, to: JobState) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET state = ? WHERE id = ? AND state = ?")
            .bind(to.to_i32())
            .bind(id)
            .bind(from.to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to transition state", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a QUEUED or DOWNLOADING job as CANCELLED
    ///
    /// Returns false if the job is missing or already terminal.
    pub async fn cancel_job(&self, id: JobId) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET state = ? WHERE id = ? AND state IN (?, ?)")
            .bind(JobState::Cancelled.to_i32())
            .bind(id)
            .bind(JobState::Queued.to_i32())
            .bind(JobState::Downloading.to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to cancel job", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist a progress tick
    ///
    /// Only applies while the job is DOWNLOADING, and never lowers the stored percent.
    pub async fn update_progress(
        &self,
        id: JobId,
        progress_percent: f32,
        downloaded_size_bytes: u64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET progress_percent = MAX(progress_percent, ?), downloaded_size_bytes = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(progress_percent)
        .bind(to_sql_int(downloaded_size_bytes))
        .bind(id)
        .bind(JobState::Downloading.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to update progress", e))?;

        Ok(())
    }

    /// Replace all mutable fields of a job record
    pub async fn update_job(&self, job: &Job) -> Result<()> {
        self.write_job(job, None).await?;
        Ok(())
    }

    /// Replace all mutable fields of a job record if it is still in `expected`
    ///
    /// Returns false if the row is gone or has moved to another state in the meantime.
    pub async fn update_job_if_state(&self, job: &Job, expected: JobState) -> Result<bool> {
        self.write_job(job, Some(expected)).await
    }

    async fn write_job(&self, job: &Job, expected: Option<JobState>) -> Result<bool> {
        let mut sql = String::from(
            r#"
            UPDATE jobs SET
                title = ?, thumbnail_url = ?, file_path = ?, file_name = ?,
                total_size_bytes = ?, downloaded_size_bytes = ?, state = ?,
                progress_percent = ?, error_message = ?, completed_at = ?,
                duration_secs = ?, uploader = ?, video_format_label = ?,
                audio_format_label = ?, mode = ?, video_format_id = ?, audio_format_id = ?
            WHERE id = ?
            "#,
        );
        if expected.is_some() {
            sql.push_str(" AND state = ?");
        }

        let mut query = sqlx::query(&sql)
            .bind(&job.title)
            .bind(&job.thumbnail_url)
            .bind(
                job.file_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )
            .bind(&job.file_name)
            .bind(to_sql_int(job.total_size_bytes))
            .bind(to_sql_int(job.downloaded_size_bytes))
            .bind(job.state.to_i32())
            .bind(job.progress_percent)
            .bind(&job.error_message)
            .bind(job.completed_at.map(|t| t.timestamp_millis()))
            .bind(job.duration_secs.map(to_sql_int))
            .bind(&job.uploader)
            .bind(&job.video_format_label)
            .bind(&job.audio_format_label)
            .bind(job.mode.to_i32())
            .bind(&job.video_format_id)
            .bind(&job.audio_format_id)
            .bind(job.id);
        if let Some(expected) = expected {
            query = query.bind(expected.to_i32());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to update job", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Reset a FAILED job to QUEUED, clearing its error, progress and output
    ///
    /// Returns false if the job is missing or not FAILED.
    pub async fn reset_for_retry(&self, id: JobId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                state = ?, error_message = NULL, progress_percent = 0.0,
                downloaded_size_bytes = 0, file_path = NULL, file_name = NULL,
                completed_at = NULL
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Queued.to_i32())
        .bind(id)
        .bind(JobState::Failed.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to reset job for retry", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every DOWNLOADING row FAILED with an "interrupted by restart" error
    ///
    /// Returns the number of rows swept.
    pub async fn fail_interrupted_jobs(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET state = ?, error_message = ?
            WHERE state = ?
            "#,
        )
        .bind(JobState::Failed.to_i32())
        .bind(INTERRUPTED_BY_RESTART)
        .bind(JobState::Downloading.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to sweep interrupted jobs", e))?;

        Ok(result.rows_affected())
    }

    /// Reset every DOWNLOADING row to QUEUED with zero progress
    ///
    /// Returns the number of rows swept.
    pub async fn requeue_interrupted_jobs(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET state = ?, progress_percent = 0.0, downloaded_size_bytes = 0
            WHERE state = ?
            "#,
        )
        .bind(JobState::Queued.to_i32())
        .bind(JobState::Downloading.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to requeue interrupted jobs", e))?;

        Ok(result.rows_affected())
    }

    /// Delete a job
    ///
    /// Returns false if there was no such row.
    pub async fn delete_job(&self, id: JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to delete job", e))?;

        Ok(result.rows_affected() > 0)
    }
}
