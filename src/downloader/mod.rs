//! Job orchestrator split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`start`] - Job spec validation and job creation
//! - [`job_task`] - Per-job execution task (backend call, progress, checkpoint)
//! - [`control`] - Cancel, retry, delete and get
//! - [`queries`] - Job listings, streams and live progress
//! - [`lifecycle`] - Startup sweep and graceful shutdown
//! - [`services`] - Metadata probing and its cache sweeper

mod control;
mod job_task;
mod lifecycle;
mod queries;
mod services;
mod start;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use start::validate_spec;

use crate::backend::{ExtractionBackend, UnavailableBackend, YtDlpBackend};
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::notifications::{self, NotificationSink};
use crate::probe::ProbeCache;
use crate::progress::ProgressBus;
use crate::types::{Event, JobId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Registration of a running execution task
#[derive(Clone, Debug)]
pub(crate) struct ActiveJob {
    /// Serial of the task that registered this entry
    pub(crate) serial: u64,
    /// Trips the task's backend call
    pub(crate) token: CancellationToken,
}

/// Bookkeeping for live execution tasks
#[derive(Clone)]
pub(crate) struct JobRegistry {
    /// Running tasks keyed by job id (for cancel, delete and shutdown)
    pub(crate) active_jobs: Arc<tokio::sync::Mutex<HashMap<JobId, ActiveJob>>>,
    /// Output stems held by running tasks, with the serial of the holding task
    pub(crate) claimed_stems: Arc<parking_lot::Mutex<HashMap<String, u64>>>,
    /// Source of task serials
    pub(crate) next_serial: Arc<AtomicU64>,
    /// Whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancelled on shutdown to stop background services
    pub(crate) shutdown_token: CancellationToken,
}

impl JobRegistry {
    fn new() -> Self {
        Self {
            active_jobs: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            claimed_stems: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            next_serial: Arc::new(AtomicU64::new(1)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        }
    }
}

/// Main orchestrator instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Job Store (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to query job records
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Extraction backend (trait object for pluggable implementations)
    pub(crate) backend: Arc<dyn ExtractionBackend>,
    /// Notification sink
    pub(crate) notifier: Arc<dyn NotificationSink>,
    /// Live progress of running jobs
    pub(crate) progress: Arc<ProgressBus>,
    /// Metadata probe cache
    pub(crate) probe_cache: Arc<ProbeCache>,
    /// Execution task bookkeeping
    pub(crate) registry: JobRegistry,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// Picks the backend from `config.backend` (an explicit `binary_path`, else `yt-dlp` from
    /// PATH, else [`UnavailableBackend`]) and the notification sink from
    /// `config.notifications`, then calls [`MediaDownloader::with_components`].
    pub async fn new(config: Config) -> Result<Self> {
        let backend: Arc<dyn ExtractionBackend> = match YtDlpBackend::from_config(&config.backend)
        {
            Some(backend) => Arc::new(backend),
            None => Arc::new(UnavailableBackend),
        };
        let notifier = notifications::from_config(&config.notifications);

        Self::with_components(config, backend, notifier).await
    }

    /// Create a MediaDownloader with an explicit backend and notification sink
    ///
    /// This initializes all core components:
    /// - Creates the download directory
    /// - Opens/creates the SQLite database and runs migrations
    /// - Sweeps jobs left behind by a previous process and relaunches queued ones
    /// - Starts the probe cache sweeper
    pub async fn with_components(
        config: Config,
        backend: Arc<dyn ExtractionBackend>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(
            backend = backend.name(),
            available = backend.is_available(),
            "Extraction backend initialized"
        );

        let probe_cache = Arc::new(ProbeCache::from_config(&config.probe));

        let downloader = Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            backend,
            notifier,
            progress: Arc::new(ProgressBus::new()),
            probe_cache,
            registry: JobRegistry::new(),
        };

        downloader.restore_jobs().await?;
        downloader.db.set_clean_start().await?;
        downloader.start_probe_sweeper();

        Ok(downloader)
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{Config, MediaDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "job event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Name of the extraction backend in use
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether the extraction backend can run
    pub fn backend_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Whether new jobs are accepted
    pub fn is_accepting(&self) -> bool {
        self.registry.accepting_new.load(Ordering::SeqCst)
    }

    /// Number of running execution tasks
    pub async fn active_count(&self) -> usize {
        self.registry.active_jobs.lock().await.len()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// Listens on the configured bind address (default: 127.0.0.1:6790).
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }
}
