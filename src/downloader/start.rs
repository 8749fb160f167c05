//! Job creation: spec validation, insert, task launch.

use crate::db::NewJob;
use crate::error::{Error, Result, ValidationError};
use crate::types::{Event, ExtractionMode, JobId, JobSpec};
use crate::utils::UNTITLED;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::job_task::{JobTaskContext, run_job_task};
use super::{ActiveJob, MediaDownloader};

/// Check a job spec and turn it into a row to insert
///
/// - the URL must be an absolute `http`/`https` URL
/// - an audio selection is always required
/// - video+audio mode requires a video selection; audio-only mode rejects one
///
/// `total_size_bytes` is the sum of the selected formats' declared sizes, unknown sizes
/// counting as 0; the sum saturates at `u64::MAX`. An empty title becomes `"untitled"`.
pub fn validate_spec(spec: &JobSpec) -> std::result::Result<NewJob, ValidationError> {
    let parsed = url::Url::parse(spec.url.trim()).map_err(|e| ValidationError::InvalidUrl {
        url: spec.url.clone(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidUrl {
            url: spec.url.clone(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    let audio = spec
        .audio_format
        .as_ref()
        .ok_or(ValidationError::MissingAudioFormat)?;

    let video = match spec.mode {
        ExtractionMode::VideoAudio => Some(
            spec.video_format
                .as_ref()
                .ok_or(ValidationError::MissingVideoFormat)?,
        ),
        ExtractionMode::AudioOnly => {
            if spec.video_format.is_some() {
                return Err(ValidationError::UnexpectedVideoFormat);
            }
            None
        }
    };

    let total_size_bytes = audio
        .size_bytes
        .unwrap_or(0)
        .saturating_add(video.and_then(|v| v.size_bytes).unwrap_or(0));

    let title = match spec.title.trim() {
        "" => UNTITLED.to_string(),
        title => title.to_string(),
    };

    Ok(NewJob {
        title,
        source_url: spec.url.trim().to_string(),
        thumbnail_url: spec.thumbnail_url.clone(),
        total_size_bytes,
        duration_secs: spec.duration_secs,
        uploader: spec.uploader.clone(),
        video_format_label: video.and_then(|v| v.label.clone()),
        audio_format_label: audio.label.clone(),
        mode: spec.mode,
        video_format_id: video.map(|v| v.format_id.clone()),
        audio_format_id: Some(audio.format_id.clone()),
    })
}

impl MediaDownloader {
    /// Start a job
    ///
    /// Validates the spec, inserts the job as QUEUED and launches its execution task. Returns
    /// as soon as the row exists; progress is observed through [`MediaDownloader::get`],
    /// [`MediaDownloader::progress_of`] and [`MediaDownloader::subscribe`].
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] when the spec is rejected (nothing is written)
    /// - [`Error::ShuttingDown`] after [`MediaDownloader::shutdown`]
    /// - a database error when the insert fails
    pub async fn start(&self, spec: JobSpec) -> Result<JobId> {
        if !self.registry.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let new_job = validate_spec(&spec)?;
        let title = new_job.title.clone();
        let id = self.db.insert_job(&new_job).await?;

        tracing::info!(
            job_id = id.0,
            title = %title,
            mode = ?new_job.mode,
            total_size_bytes = new_job.total_size_bytes,
            "Job queued"
        );
        self.emit_event(Event::Queued { id, title });

        self.spawn_job_task(id).await;
        Ok(id)
    }

    /// Register a cancellation token for `id` and spawn its execution task
    pub(crate) async fn spawn_job_task(&self, id: JobId) {
        let token = CancellationToken::new();
        let serial = self.registry.next_serial.fetch_add(1, Ordering::SeqCst);

        {
            let mut active = self.registry.active_jobs.lock().await;
            if let Some(previous) = active.insert(
                id,
                ActiveJob {
                    serial,
                    token: token.clone(),
                },
            ) {
                // A lingering task for the same id must not outlive its replacement
                previous.token.cancel();
            }
        }

        let ctx = JobTaskContext::new(self.clone(), id, serial, token);
        tokio::spawn(run_job_task(ctx));
    }
}
