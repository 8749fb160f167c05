//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Unique identifier for a job
///
/// Assigned by the store at insert time and never reused, even after the job is deleted.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<JobId> for i64 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for JobId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for JobId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for JobId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Job lifecycle state
///
/// `Queued -> Downloading -> {Completed, Failed, Cancelled}`, plus `Failed -> Queued` on retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, execution task not yet running the backend
    Queued,
    /// Backend call in flight
    Downloading,
    /// Output file is on disk
    Completed,
    /// Backend raised an error
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl JobState {
    /// Convert integer state code to JobState
    pub fn from_i32(state: i32) -> Self {
        match state {
            0 => JobState::Queued,
            1 => JobState::Downloading,
            2 => JobState::Completed,
            3 => JobState::Failed,
            4 => JobState::Cancelled,
            _ => JobState::Failed, // Default to Failed for unknown state
        }
    }

    /// Convert JobState to integer state code
    pub fn to_i32(&self) -> i32 {
        match self {
            JobState::Queued => 0,
            JobState::Downloading => 1,
            JobState::Completed => 2,
            JobState::Failed => 3,
            JobState::Cancelled => 4,
        }
    }

    /// Whether the job still has (or is about to have) a live execution task
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Downloading)
    }

    /// Lowercase name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Downloading => "downloading",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queued" => Ok(JobState::Queued),
            "downloading" => Ok(JobState::Downloading),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cancelled" => Ok(JobState::Cancelled),
            other => Err(format!("unknown job state '{}'", other)),
        }
    }
}

/// Which streams a job extracts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Download a video and an audio stream and merge them
    #[default]
    VideoAudio,
    /// Download a single audio stream and extract it to the configured audio format
    AudioOnly,
}

impl ExtractionMode {
    /// Convert integer mode code to ExtractionMode
    pub fn from_i32(mode: i32) -> Self {
        match mode {
            1 => ExtractionMode::AudioOnly,
            _ => ExtractionMode::VideoAudio,
        }
    }

    /// Convert ExtractionMode to integer mode code
    pub fn to_i32(&self) -> i32 {
        match self {
            ExtractionMode::VideoAudio => 0,
            ExtractionMode::AudioOnly => 1,
        }
    }
}

/// A stream selected by the user, as listed by the backend's format probe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MediaFormat {
    /// Backend format identifier (e.g. "137")
    pub format_id: String,
    /// Human-readable label (e.g. "1080p mp4")
    #[serde(default)]
    pub label: Option<String>,
    /// Declared size in bytes, if the backend knows it
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl MediaFormat {
    /// Create a format selection with an id and optional declared size
    pub fn new(format_id: impl Into<String>, size_bytes: Option<u64>) -> Self {
        Self {
            format_id: format_id.into(),
            label: None,
            size_bytes,
        }
    }
}

/// Everything the caller provides when starting a job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobSpec {
    /// Source page or media URL
    pub url: String,
    /// Display title (also the basis of the output filename)
    pub title: String,
    /// Thumbnail URL for display
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Media duration in seconds
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// Uploader / channel name
    #[serde(default)]
    pub uploader: Option<String>,
    /// Extraction mode
    #[serde(default)]
    pub mode: ExtractionMode,
    /// Selected video stream (required for video+audio, forbidden for audio-only)
    #[serde(default)]
    pub video_format: Option<MediaFormat>,
    /// Selected audio stream (always required)
    #[serde(default)]
    pub audio_format: Option<MediaFormat>,
}

/// A job record as seen by callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Job identifier
    pub id: JobId,
    /// Display title
    pub title: String,
    /// Source URL
    pub source_url: String,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Final output path (set only when completed)
    #[schema(value_type = Option<String>)]
    pub file_path: Option<PathBuf>,
    /// Final output file name (set only when completed)
    pub file_name: Option<String>,
    /// Best-effort total size estimate (0 when unknown)
    pub total_size_bytes: u64,
    /// Best-effort downloaded byte count
    pub downloaded_size_bytes: u64,
    /// Lifecycle state
    pub state: JobState,
    /// Progress percentage (0.0 to 100.0)
    pub progress_percent: f32,
    /// Error message (set only when failed)
    pub error_message: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
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

/// Live, non-persisted progress of a running job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressSnapshot {
    /// Job identifier
    pub id: JobId,
    /// Progress percentage (0.0 to 100.0)
    pub progress_percent: f32,
    /// Downloaded bytes so far (best effort)
    pub downloaded_size_bytes: u64,
    /// Total bytes (best effort)
    pub total_size_bytes: u64,
    /// Speed as reported by the backend (e.g. "1.23MiB/s"), empty when unknown
    pub speed_text: String,
    /// ETA as reported by the backend (e.g. "00:12"), empty when unknown
    pub eta_text: String,
    /// Free-form status line
    pub status_description: Option<String>,
}

/// Kind of stream a probed format carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// Video only
    Video,
    /// Audio only
    Audio,
    /// Video and audio in one stream
    Muxed,
}

/// A format listed by the metadata probe
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProbedFormat {
    /// Backend format identifier
    pub format_id: String,
    /// Container extension
    pub ext: Option<String>,
    /// Human-readable label
    pub label: String,
    /// Declared or approximate size in bytes
    pub size_bytes: Option<u64>,
    /// Stream kind
    pub kind: FormatKind,
}

/// Metadata returned by the probe read path
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    /// URL that was probed
    pub url: String,
    /// Media title
    pub title: String,
    /// Uploader / channel name
    pub uploader: Option<String>,
    /// Duration in seconds
    pub duration_secs: Option<u64>,
    /// Thumbnail URL
    pub thumbnail_url: Option<String>,
    /// Available formats
    pub formats: Vec<ProbedFormat>,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted and persisted as queued
    Queued {
        /// Job ID
        id: JobId,
        /// Job title
        title: String,
    },

    /// Execution task moved the job to downloading
    Started {
        /// Job ID
        id: JobId,
    },

    /// Progress tick from the backend
    Progress {
        /// Job ID
        id: JobId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Speed text, empty when unknown
        speed: String,
        /// ETA text, empty when unknown
        eta: String,
    },

    /// Job finished and its output is on disk
    Completed {
        /// Job ID
        id: JobId,
        /// Output file path
        #[schema(value_type = String)]
        path: PathBuf,
    },

    /// Job failed
    Failed {
        /// Job ID
        id: JobId,
        /// Error message
        error: String,
    },

    /// Job cancelled
    Cancelled {
        /// Job ID
        id: JobId,
    },

    /// Failed job reset to queued and relaunched
    Retried {
        /// Job ID
        id: JobId,
    },

    /// Job record deleted
    Removed {
        /// Job ID
        id: JobId,
    },

    /// Downloader is shutting down
    Shutdown,
}

/// Webhook payload sent to notification endpoints
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    /// Notification kind ("started", "progress", "completed", "failed", "cancelled")
    pub event: String,
    /// Job ID
    pub job_id: JobId,
    /// Job title
    pub title: String,
    /// Human-readable message
    pub message: String,
    /// Unix timestamp
    pub timestamp: i64,
}
