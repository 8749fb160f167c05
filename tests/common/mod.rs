//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use media_dl::{
    BackendError, BackendProgress, BackendRequest, Config, Event, ExtractionBackend, JobId,
    MediaDownloader, MediaInfo, Notification, NotificationSink, TracingNotifier,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Backend that writes the output file named by the request's `-o` template
///
/// Sends progress lines in yt-dlp's format, then optionally waits for a permit before
/// finishing. Cancellation is honoured while waiting.
pub struct FileWritingBackend {
    ticks: Vec<f32>,
    fail_with: Option<String>,
    hold: Option<Semaphore>,
    calls: AtomicUsize,
}

impl FileWritingBackend {
    pub fn new(ticks: &[f32]) -> Self {
        Self {
            ticks: ticks.to_vec(),
            fail_with: None,
            hold: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn held(mut self) -> Self {
        self.hold = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionBackend for FileWritingBackend {
    fn name(&self) -> &str {
        "file-writing"
    }

    async fn execute(
        &self,
        request: &BackendRequest,
        progress: mpsc::UnboundedSender<BackendProgress>,
        cancel: CancellationToken,
    ) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let template = request
            .value_of("-o")
            .ok_or_else(|| BackendError::Io("request without output template".to_string()))?;
        let ext = if request.has("-x") {
            request.value_of("--audio-format").unwrap_or("mp3")
        } else {
            request.value_of("--merge-output-format").unwrap_or("mp4")
        };
        let partial = PathBuf::from(template.replace("%(ext)s", &format!("{}.part", ext)));
        tokio::fs::write(&partial, b"")
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;

        for percent in &self.ticks {
            let _ = progress.send(BackendProgress {
                percent: *percent,
                total_bytes: Some(10_000),
                line: format!("[download] {:5.1}% of 9.77KiB at 2.00MiB/s ETA 00:03", percent),
            });
        }

        if let Some(hold) = &self.hold {
            tokio::select! {
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                permit = hold.acquire() => {
                    if let Ok(permit) = permit {
                        permit.forget();
                    }
                }
            }
        }

        if let Some(message) = &self.fail_with {
            return Err(BackendError::Exited {
                code: Some(1),
                message: message.clone(),
            });
        }

        let final_path = PathBuf::from(template.replace("%(ext)s", ext));
        tokio::fs::write(&final_path, b"media bytes")
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;
        let _ = tokio::fs::remove_file(&partial).await;
        Ok(())
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, BackendError> {
        Err(BackendError::Probe(format!("{} is not probed in tests", url)))
    }
}

/// Notification sink that counts what it receives, then forwards to tracing
#[derive(Default)]
pub struct CountingNotifier {
    pub count: AtomicUsize,
}

impl NotificationSink for CountingNotifier {
    fn notify(&self, notification: Notification) {
        self.count.fetch_add(1, Ordering::SeqCst);
        TracingNotifier.notify(notification);
    }
}

/// Config rooted in a tempdir
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("media.db");
    config.download.download_dir = temp_dir.path().join("downloads");
    config
}

/// Create a downloader over a tempdir with the given backend
pub async fn create_downloader(
    backend: Arc<FileWritingBackend>,
) -> (MediaDownloader, Arc<CountingNotifier>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let notifier = Arc::new(CountingNotifier::default());
    let downloader =
        MediaDownloader::with_components(test_config(&temp_dir), backend, notifier.clone())
            .await
            .expect("downloader");
    (downloader, notifier, temp_dir)
}

/// Result of waiting for a job to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// Job completed with this output path
    Completed(PathBuf),
    /// Job failed with this error
    Failed(String),
    /// Job was cancelled
    Cancelled,
    /// Timeout waiting for a terminal event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for a terminal event for `id` on an existing subscription
///
/// Subscribe before starting the job so no event can be missed.
pub async fn wait_for_terminal(
    events: &mut broadcast::Receiver<Event>,
    id: JobId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { id: event_id, path }) if event_id == id => {
                    return WaitResult::Completed(path);
                }
                Ok(Event::Failed { id: event_id, error }) if event_id == id => {
                    return WaitResult::Failed(error);
                }
                Ok(Event::Cancelled { id: event_id }) if event_id == id => {
                    return WaitResult::Cancelled;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Wait for the Started event for `id`
pub async fn wait_for_started(
    events: &mut broadcast::Receiver<Event>,
    id: JobId,
    timeout: Duration,
) -> bool {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Started { id: event_id }) if event_id == id => return true,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await;

    result.unwrap_or(false)
}
