//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Validation, Job, Backend, Database)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Job spec rejected before any state was created
    #[error("invalid job spec: {0}")]
    Validation(#[from] ValidationError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Job-level error (not found, invalid state for an operation)
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Extraction backend error
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Output file name already taken and the collision policy forbids reuse
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path (or stem) that collided
        path: PathBuf,
        /// Why the collision could not be resolved
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Operation not supported (missing backend binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Reasons a job spec is rejected at start
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Video+audio mode without a video selection
    #[error("video+audio mode requires a video format")]
    MissingVideoFormat,

    /// No audio selection
    #[error("an audio format is required")]
    MissingAudioFormat,

    /// Audio-only mode with a video selection
    #[error("audio-only mode does not take a video format")]
    UnexpectedVideoFormat,

    /// Source URL missing or unparseable
    #[error("invalid source URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
        /// Parser message
        reason: String,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Job-related errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found in the store
    #[error("job {id} not found")]
    NotFound {
        /// The job ID that was not found
        id: i64,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} job {id} in state {current_state}")]
    InvalidState {
        /// The job ID
        id: i64,
        /// The operation that was attempted (e.g., "retry")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },
}

/// Errors raised by the extraction backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend process could not be started
    #[error("failed to start backend: {0}")]
    Spawn(String),

    /// Backend exited unsuccessfully
    #[error("{message}")]
    Exited {
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Most relevant error line from the backend output
        message: String,
    },

    /// Backend call was aborted through its cancellation token
    #[error("backend call cancelled")]
    Cancelled,

    /// I/O failure while talking to the backend
    #[error("backend I/O error: {0}")]
    Io(String),

    /// Metadata probe output could not be understood
    #[error("probe failed: {0}")]
    Probe(String),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 123 not found",
///     "details": { "job_id": 123 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Job(JobError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Job(JobError::InvalidState { .. }) => 409,
            Error::FileCollision { .. } => 409,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Backend(_) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,

            // 501 Not Implemented - Feature not supported
            Error::NotSupported(_) => 501,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::InvalidState { .. } => "invalid_state",
            },
            Error::Backend(e) => match e {
                BackendError::Spawn(_) => "backend_unavailable",
                BackendError::Exited { .. } => "backend_failed",
                BackendError::Cancelled => "backend_cancelled",
                BackendError::Io(_) => "backend_io_error",
                BackendError::Probe(_) => "probe_failed",
            },
            Error::FileCollision { .. } => "file_collision",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "job_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::FileCollision { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            Error::Config {
                key: Some(key), ..
            } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
