//! # media-dl
//!
//! Concurrent media download orchestration library.
//!
//! media-dl takes a media URL plus a format selection (video+audio or audio-only), drives the
//! job through a persisted state machine, runs an external extraction backend (yt-dlp) on an
//! independent task per job, and exposes live progress, cancellation, retry and deletion.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Durable** - Every state transition is written to SQLite and survives restarts
//! - **Isolated** - One job failing never touches another job's task, row or progress entry
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, JobSpec, MediaDownloader, MediaFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = downloader
//!         .start(JobSpec {
//!             url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
//!             title: "Never Gonna Give You Up".to_string(),
//!             thumbnail_url: None,
//!             duration_secs: Some(213),
//!             uploader: None,
//!             mode: Default::default(),
//!             video_format: Some(MediaFormat::new("137", Some(500_000))),
//!             audio_format: Some(MediaFormat::new("140", Some(50_000))),
//!         })
//!         .await?;
//!
//!     println!("started job {}", id);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Extraction backend adapter
pub mod backend;
/// Configuration types
pub mod config;
/// Database persistence layer (Job Store)
pub mod db;
/// Job orchestrator (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Notification sinks
pub mod notifications;
/// Metadata probing with an owned expiring cache
pub mod probe;
/// Progress bus and backend output line parsing
pub mod progress;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use backend::{
    BackendProgress, BackendRequest, ExtractionBackend, UnavailableBackend, YtDlpBackend,
};
pub use config::{Config, FileCollisionAction, StaleJobPolicy};
pub use db::Database;
pub use downloader::MediaDownloader;
pub use error::{
    ApiError, BackendError, DatabaseError, Error, ErrorDetail, JobError, Result, ToHttpStatus,
    ValidationError,
};
pub use notifications::{
    FanoutNotifier, Notification, NotificationKind, NotificationSink, TracingNotifier,
    WebhookNotifier,
};
pub use probe::ProbeCache;
pub use progress::ProgressBus;
pub use types::{
    Event, ExtractionMode, FormatKind, Job, JobId, JobSpec, JobState, MediaFormat, MediaInfo,
    ProbedFormat, ProgressSnapshot,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, MediaDownloader, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MediaDownloader::new(Config::default()).await?;
///     run_with_shutdown(downloader).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: MediaDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
