//! Database layer for media-dl
//!
//! The Job Store: SQLite persistence for job records and runtime state.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`jobs`] - Job CRUD, guarded state transitions, listing streams
//! - [`state`] - Runtime state (shutdown tracking)

use crate::types::{ExtractionMode, Job, JobId, JobState};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod jobs;
mod migrations;
mod state;

pub use jobs::INTERRUPTED_BY_RESTART;

/// New job to be inserted into the database
///
/// Jobs are always inserted as QUEUED with zero progress.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Display title
    pub title: String,
    /// Source URL
    pub source_url: String,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Sum of the selected formats' declared sizes (0 if unknown)
    pub total_size_bytes: u64,
    /// Media duration in seconds
    pub duration_secs: Option<u64>,
    /// Uploader / channel name
    pub uploader: Option<String>,
    /// Display label of the selected video stream
    pub video_format_label: Option<String>,
    /// Display label of the selected audio stream
    pub audio_format_label: Option<String>,
    /// Extraction mode
    pub mode: ExtractionMode,
    /// Backend id of the selected video stream
    pub video_format_id: Option<String>,
    /// Backend id of the selected audio stream
    pub audio_format_id: Option<String>,
}

/// Job record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    /// Unique database ID
    pub id: i64,
    /// Display title
    pub title: String,
    /// Source URL
    pub source_url: String,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Final output path
    pub file_path: Option<String>,
    /// Final output file name
    pub file_name: Option<String>,
    /// Total size estimate in bytes
    pub total_size_bytes: i64,
    /// Downloaded bytes
    pub downloaded_size_bytes: i64,
    /// State code (0=queued, 1=downloading, 2=completed, 3=failed, 4=cancelled)
    pub state: i32,
    /// Progress percentage (0.0-100.0)
    pub progress_percent: f32,
    /// Error message if the job failed
    pub error_message: Option<String>,
    /// Unix timestamp (milliseconds) when the job was created
    pub created_at: i64,
    /// Unix timestamp (milliseconds) when the job completed
    pub completed_at: Option<i64>,
    /// Media duration in seconds
    pub duration_secs: Option<i64>,
    /// Uploader / channel name
    pub uploader: Option<String>,
    /// Display label of the selected video stream
    pub video_format_label: Option<String>,
    /// Display label of the selected audio stream
    pub audio_format_label: Option<String>,
    /// Extraction mode code (0=video+audio, 1=audio-only)
    pub mode: i32,
    /// Backend id of the selected video stream
    pub video_format_id: Option<String>,
    /// Backend id of the selected audio stream
    pub audio_format_id: Option<String>,
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: JobId(row.id),
            title: row.title,
            source_url: row.source_url,
            thumbnail_url: row.thumbnail_url,
            file_path: row.file_path.map(PathBuf::from),
            file_name: row.file_name,
            total_size_bytes: row.total_size_bytes.max(0) as u64,
            downloaded_size_bytes: row.downloaded_size_bytes.max(0) as u64,
            state: JobState::from_i32(row.state),
            progress_percent: row.progress_percent,
            error_message: row.error_message,
            created_at: millis_to_datetime(row.created_at),
            completed_at: row.completed_at.map(millis_to_datetime),
            duration_secs: row.duration_secs.map(|d| d.max(0) as u64),
            uploader: row.uploader,
            video_format_label: row.video_format_label,
            audio_format_label: row.audio_format_label,
            mode: ExtractionMode::from_i32(row.mode),
            video_format_id: row.video_format_id,
            audio_format_id: row.audio_format_id,
        }
    }
}

/// Database handle for media-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
