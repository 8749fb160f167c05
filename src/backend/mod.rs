//! Extraction backend adapter
//!
//! This module translates a job's stored format selection into a backend request and defines
//! the interface every backend implements.
//!
//! ## Architecture
//!
//! The core abstraction is the [`ExtractionBackend`] trait. Implementations:
//!
//! - [`YtDlpBackend`]: runs the external `yt-dlp` binary
//! - [`UnavailableBackend`]: stand-in used when no binary can be found; every call fails
//!
//! A request is an ordered list of `(flag, value)` pairs plus the source URL, built by
//! [`BackendRequest::for_job`]. Progress flows back through an unbounded channel, one
//! [`BackendProgress`] per progress line, in the order the backend produced them.

use crate::config::BackendConfig;
use crate::error::{BackendError, ValidationError};
use crate::types::{ExtractionMode, Job, MediaInfo};
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod unavailable;
mod ytdlp;

pub use unavailable::UnavailableBackend;
pub use ytdlp::{YtDlpBackend, parse_probe_json};

/// One progress report from a running backend call
#[derive(Clone, Debug, PartialEq)]
pub struct BackendProgress {
    /// Percent as reported by the backend (not yet normalized)
    pub percent: f32,
    /// Total size of the stream currently downloading, when known
    pub total_bytes: Option<u64>,
    /// The raw output line the report was parsed from
    pub line: String,
}

/// Backend invocation: the source URL plus ordered `(flag, value)` options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendRequest {
    /// Source URL
    pub url: String,
    /// Flags in insertion order; `None` values are bare switches
    pub options: Vec<(String, Option<String>)>,
}

impl BackendRequest {
    /// Start an empty request for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: Vec::new(),
        }
    }

    /// Append a flag with a value
    pub fn option(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((flag.into(), Some(value.into())));
        self
    }

    /// Append a bare switch
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.options.push((flag.into(), None));
        self
    }

    /// Whether a flag is present
    pub fn has(&self, flag: &str) -> bool {
        self.options.iter().any(|(name, _)| name == flag)
    }

    /// Value of the first occurrence of a flag
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(name, _)| name == flag)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Flatten into command-line arguments, URL last
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() * 2 + 1);
        for (flag, value) in &self.options {
            args.push(flag.clone());
            if let Some(value) = value {
                args.push(value.clone());
            }
        }
        args.push(self.url.clone());
        args
    }

    /// Build the request for a job from its stored format selection
    ///
    /// The output template is `{output_dir}/{stem}.%(ext)s`. Video+audio jobs select
    /// `"{video}+{audio}/best"` and merge into `merge_output_format`; audio-only jobs select
    /// the audio id and extract to `audio_format`. Every request carries the reliability
    /// options from `config`.
    pub fn for_job(
        job: &Job,
        output_dir: &Path,
        stem: &str,
        config: &BackendConfig,
    ) -> Result<Self, ValidationError> {
        let audio = job
            .audio_format_id
            .as_deref()
            .ok_or(ValidationError::MissingAudioFormat)?;

        let template = output_dir.join(format!("{}.%(ext)s", stem));
        let mut request = BackendRequest::new(&job.source_url)
            .option("-o", template.to_string_lossy())
            .flag("--newline")
            .flag("--no-playlist");

        request = match job.mode {
            ExtractionMode::VideoAudio => {
                let video = job
                    .video_format_id
                    .as_deref()
                    .ok_or(ValidationError::MissingVideoFormat)?;
                request
                    .option("-f", format!("{}+{}/best", video, audio))
                    .option("--merge-output-format", &config.merge_output_format)
            }
            ExtractionMode::AudioOnly => request
                .option("-f", audio)
                .flag("-x")
                .option("--audio-format", &config.audio_format),
        };

        let referer = config
            .referer
            .clone()
            .or_else(|| origin_of(&job.source_url));

        request = request
            .option("--socket-timeout", config.socket_timeout.as_secs().to_string())
            .option("--retries", config.retries.to_string())
            .option("--fragment-retries", config.fragment_retries.to_string())
            .option("--user-agent", &config.user_agent);
        if let Some(referer) = referer {
            request = request.option("--referer", referer);
        }
        for extra in &config.extra_args {
            request = request.flag(extra);
        }

        Ok(request)
    }
}

/// Extension of the finished file for a job's mode
pub fn output_extension(mode: ExtractionMode, config: &BackendConfig) -> &str {
    match mode {
        ExtractionMode::VideoAudio => &config.merge_output_format,
        ExtractionMode::AudioOnly => &config.audio_format,
    }
}

/// `scheme://host[:port]/` of a URL, used as the default referer
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin
        .is_tuple()
        .then(|| format!("{}/", origin.ascii_serialization()))
}

/// Interface to an external media extraction/download engine
///
/// `execute` blocks (asynchronously) for the whole transfer. Implementations must:
/// - send one [`BackendProgress`] per progress line, in order, and never block on the channel
/// - stop early and return [`BackendError::Cancelled`] once `cancel` fires
/// - describe failures with a human-readable message; it ends up in the job's `error_message`
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Short name for logs (e.g. "yt-dlp")
    fn name(&self) -> &str;

    /// Whether the backend can run at all
    fn is_available(&self) -> bool {
        true
    }

    /// Run one request to completion
    async fn execute(
        &self,
        request: &BackendRequest,
        progress: mpsc::UnboundedSender<BackendProgress>,
        cancel: CancellationToken,
    ) -> Result<(), BackendError>;

    /// List title, uploader, duration and formats for a URL without downloading
    async fn probe(&self, url: &str) -> Result<MediaInfo, BackendError>;
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JobId, JobState};
    use std::path::PathBuf;

    fn job(mode: ExtractionMode, video: Option<&str>, audio: Option<&str>) -> Job {
        Job {
            id: JobId(1),
            title: "My Video".to_string(),
            source_url: "https://www.youtube.com/watch?v=abc123".to_string(),
            thumbnail_url: None,
            file_path: None,
            file_name: None,
            total_size_bytes: 0,
            downloaded_size_bytes: 0,
            state: JobState::Queued,
            progress_percent: 0.0,
            error_message: None,
            created_at: chrono::Utc::now(),
            completed_at: None,
            duration_secs: None,
            uploader: None,
            video_format_label: None,
            audio_format_label: None,
            mode,
            video_format_id: video.map(String::from),
            audio_format_id: audio.map(String::from),
        }
    }

    #[test]
    fn video_audio_request_merges_both_streams() {
        let config = BackendConfig::default();
        let request = BackendRequest::for_job(
            &job(ExtractionMode::VideoAudio, Some("137"), Some("140")),
            &PathBuf::from("/downloads"),
            "My Video",
            &config,
        )
        .unwrap();

        assert_eq!(request.value_of("-f"), Some("137+140/best"));
        assert_eq!(request.value_of("--merge-output-format"), Some("mp4"));
        assert_eq!(request.value_of("-o"), Some("/downloads/My Video.%(ext)s"));
        assert!(!request.has("-x"));
        assert_eq!(request.url, "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn audio_only_request_extracts() {
        let config = BackendConfig::default();
        let request = BackendRequest::for_job(
            &job(ExtractionMode::AudioOnly, None, Some("251")),
            &PathBuf::from("/downloads"),
            "Song",
            &config,
        )
        .unwrap();

        assert_eq!(request.value_of("-f"), Some("251"));
        assert!(request.has("-x"));
        assert_eq!(request.value_of("--audio-format"), Some("mp3"));
        assert!(!request.has("--merge-output-format"));
    }

    #[test]
    fn request_carries_reliability_options() {
        let mut config = BackendConfig::default();
        config.extra_args = vec!["--no-mtime".to_string()];
        let request = BackendRequest::for_job(
            &job(ExtractionMode::VideoAudio, Some("137"), Some("140")),
            &PathBuf::from("/downloads"),
            "x",
            &config,
        )
        .unwrap();

        assert_eq!(request.value_of("--socket-timeout"), Some("30"));
        assert_eq!(request.value_of("--retries"), Some("10"));
        assert_eq!(request.value_of("--fragment-retries"), Some("10"));
        assert_eq!(
            request.value_of("--user-agent"),
            Some(config.user_agent.as_str())
        );
        assert_eq!(
            request.value_of("--referer"),
            Some("https://www.youtube.com/")
        );
        assert!(request.has("--no-mtime"));
    }

    #[test]
    fn configured_referer_overrides_origin() {
        let config = BackendConfig {
            referer: Some("https://example.org/".to_string()),
            ..Default::default()
        };
        let request = BackendRequest::for_job(
            &job(ExtractionMode::AudioOnly, None, Some("140")),
            &PathBuf::from("/d"),
            "x",
            &config,
        )
        .unwrap();
        assert_eq!(request.value_of("--referer"), Some("https://example.org/"));
    }

    #[test]
    fn missing_stored_formats_are_rejected() {
        let config = BackendConfig::default();
        let dir = PathBuf::from("/d");

        let err = BackendRequest::for_job(
            &job(ExtractionMode::VideoAudio, None, Some("140")),
            &dir,
            "x",
            &config,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingVideoFormat);

        let err = BackendRequest::for_job(
            &job(ExtractionMode::AudioOnly, None, None),
            &dir,
            "x",
            &config,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingAudioFormat);
    }

    #[test]
    fn to_args_keeps_order_and_puts_url_last() {
        let request = BackendRequest::new("https://x.test/v")
            .option("-f", "18")
            .flag("--newline");
        assert_eq!(
            request.to_args(),
            vec!["-f", "18", "--newline", "https://x.test/v"]
        );
    }

    #[test]
    fn origin_of_urls() {
        assert_eq!(
            origin_of("https://www.youtube.com/watch?v=x").as_deref(),
            Some("https://www.youtube.com/")
        );
        assert_eq!(
            origin_of("http://localhost:8080/a/b").as_deref(),
            Some("http://localhost:8080/")
        );
        assert_eq!(origin_of("not a url"), None);
    }
}
