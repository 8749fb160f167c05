//! Shared test helpers for creating MediaDownloader instances in tests.

use crate::backend::{BackendProgress, BackendRequest, ExtractionBackend};
use crate::config::Config;
use crate::downloader::MediaDownloader;
use crate::error::BackendError;
use crate::notifications::{Notification, NotificationKind, NotificationSink};
use crate::types::{
    ExtractionMode, FormatKind, Job, JobId, JobSpec, JobState, MediaFormat, MediaInfo,
    ProbedFormat,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;

/// Backend whose behaviour is scripted by the test
///
/// On each call it writes `{stem}.{ext}.part` to the download directory, sends the scripted
/// ticks, optionally waits on its gate, then either fails or renames the partial file to the
/// final `{stem}.{ext}`.
pub(crate) struct ScriptedBackend {
    ticks: Vec<f32>,
    tick_total: Option<u64>,
    failure: Option<String>,
    gated: bool,
    ignore_cancel: bool,
    gate: Semaphore,
    started: AtomicUsize,
    requests: parking_lot::Mutex<Vec<BackendRequest>>,
    probe_info: Option<MediaInfo>,
    probe_calls: AtomicUsize,
}

impl ScriptedBackend {
    /// Backend that succeeds immediately without progress
    pub(crate) fn succeeding() -> Self {
        Self {
            ticks: Vec::new(),
            tick_total: None,
            failure: None,
            gated: false,
            ignore_cancel: false,
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            requests: parking_lot::Mutex::new(Vec::new()),
            probe_info: None,
            probe_calls: AtomicUsize::new(0),
        }
    }

    /// Send these percents as progress ticks
    pub(crate) fn with_ticks(mut self, ticks: &[f32], total: Option<u64>) -> Self {
        self.ticks = ticks.to_vec();
        self.tick_total = total;
        self
    }

    /// Fail with this message after the ticks
    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Hold the call open until [`ScriptedBackend::release`]
    pub(crate) fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Keep running after the cancellation token fires (a backend that cannot be preempted)
    pub(crate) fn ignoring_cancel(mut self) -> Self {
        self.ignore_cancel = true;
        self
    }

    /// Answer probes with this result
    pub(crate) fn with_probe(mut self, info: MediaInfo) -> Self {
        self.probe_info = Some(info);
        self
    }

    /// Let one gated call continue
    pub(crate) fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Wait until `calls` calls have written their partial file and sent their ticks
    pub(crate) async fn wait_started(&self, calls: usize) {
        for _ in 0..250 {
            if self.started.load(Ordering::SeqCst) >= calls {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("backend never reached {} calls", calls);
    }

    /// Requests received so far
    pub(crate) fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().clone()
    }

    /// Number of probe calls received
    pub(crate) fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

async fn pass_gate(gate: &Semaphore) {
    gate.acquire().await.unwrap().forget();
}

#[async_trait]
impl ExtractionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(
        &self,
        request: &BackendRequest,
        progress: mpsc::UnboundedSender<BackendProgress>,
        cancel: CancellationToken,
    ) -> Result<(), BackendError> {
        self.requests.lock().push(request.clone());

        let template = request.value_of("-o").unwrap_or_default().to_string();
        let ext = if request.has("-x") {
            request.value_of("--audio-format")
        } else {
            request.value_of("--merge-output-format")
        }
        .unwrap_or("mp4")
        .to_string();
        let partial = PathBuf::from(template.replace("%(ext)s", &format!("{}.part", ext)));
        let final_path = PathBuf::from(template.replace("%(ext)s", &ext));

        tokio::fs::write(&partial, b"partial data")
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;

        for percent in &self.ticks {
            let line = format!("[download] {:5.1}% at  1.00MiB/s ETA 00:01", percent);
            let _ = progress.send(BackendProgress {
                percent: *percent,
                total_bytes: self.tick_total,
                line,
            });
        }
        self.started.fetch_add(1, Ordering::SeqCst);

        if self.gated {
            if self.ignore_cancel {
                pass_gate(&self.gate).await;
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                    _ = pass_gate(&self.gate) => {}
                }
            }
        } else if !self.ignore_cancel && cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }

        if let Some(message) = &self.failure {
            return Err(BackendError::Exited {
                code: Some(1),
                message: message.clone(),
            });
        }

        tokio::fs::rename(&partial, &final_path)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;
        Ok(())
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, BackendError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match &self.probe_info {
            Some(info) => Ok(MediaInfo {
                url: url.to_string(),
                ..info.clone()
            }),
            None => Err(BackendError::Probe("no probe result scripted".to_string())),
        }
    }
}

/// Notification sink that records everything it receives
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    seen: parking_lot::Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Kinds received for one job, in order
    pub(crate) fn kinds_for(&self, id: JobId) -> Vec<NotificationKind> {
        self.seen
            .lock()
            .iter()
            .filter(|n| n.job_id == id)
            .map(|n| n.kind)
            .collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

/// Create a test MediaDownloader backed by a succeeding [`ScriptedBackend`]
///
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) async fn create_test_downloader() -> (MediaDownloader, tempfile::TempDir) {
    let (downloader, _notifier, temp_dir) =
        create_test_downloader_with(Arc::new(ScriptedBackend::succeeding()), |_| {}).await;
    (downloader, temp_dir)
}

/// Create a test MediaDownloader with a given backend and config tweaks
pub(crate) async fn create_test_downloader_with(
    backend: Arc<ScriptedBackend>,
    configure: impl FnOnce(&mut Config),
) -> (MediaDownloader, Arc<RecordingNotifier>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    configure(&mut config);

    let notifier = Arc::new(RecordingNotifier::default());
    let downloader = MediaDownloader::with_components(config, backend, notifier.clone())
        .await
        .unwrap();

    (downloader, notifier, temp_dir)
}

/// Config rooted in a tempdir
pub(crate) fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.download.download_dir = temp_dir.path().join("downloads");
    config
}

/// Video+audio spec selecting formats 137 (500000 bytes) and 140 (50000 bytes)
pub(crate) fn video_audio_spec(title: &str) -> JobSpec {
    JobSpec {
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        title: title.to_string(),
        thumbnail_url: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg".to_string()),
        duration_secs: Some(213),
        uploader: Some("Channel".to_string()),
        mode: ExtractionMode::VideoAudio,
        video_format: Some(MediaFormat::new("137", Some(500_000))),
        audio_format: Some(MediaFormat::new("140", Some(50_000))),
    }
}

/// Audio-only spec selecting format 140
pub(crate) fn audio_only_spec(title: &str) -> JobSpec {
    JobSpec {
        mode: ExtractionMode::AudioOnly,
        video_format: None,
        ..video_audio_spec(title)
    }
}

/// Probe result with one video and one audio format
pub(crate) fn sample_media_info() -> MediaInfo {
    MediaInfo {
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        title: "Never Gonna Give You Up".to_string(),
        uploader: Some("Rick Astley".to_string()),
        duration_secs: Some(213),
        thumbnail_url: None,
        formats: vec![
            ProbedFormat {
                format_id: "137".to_string(),
                ext: Some("mp4".to_string()),
                label: "1080p mp4".to_string(),
                size_bytes: Some(500_000),
                kind: FormatKind::Video,
            },
            ProbedFormat {
                format_id: "140".to_string(),
                ext: Some("m4a".to_string()),
                label: "m4a 128k".to_string(),
                size_bytes: Some(50_000),
                kind: FormatKind::Audio,
            },
        ],
    }
}

/// Poll until the job reaches `state`
pub(crate) async fn wait_for_state(downloader: &MediaDownloader, id: JobId, state: JobState) -> Job {
    for _ in 0..250 {
        if let Some(job) = downloader.get(id).await.unwrap()
            && job.state == state
        {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let job = downloader.get(id).await.unwrap();
    panic!("job {} never reached {:?}: {:?}", id, state, job);
}

/// Poll until the job's execution task has released everything
pub(crate) async fn wait_for_task_exit(downloader: &MediaDownloader, id: JobId) {
    for _ in 0..250 {
        if !downloader.registry.active_jobs.lock().await.contains_key(&id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task for job {} never exited", id);
}
