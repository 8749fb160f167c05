//! yt-dlp command-line backend

use super::{BackendProgress, BackendRequest, ExtractionBackend};
use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::progress::parser::parse_download_line;
use crate::types::{FormatKind, MediaInfo, ProbedFormat};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Backend that shells out to `yt-dlp`
///
/// Progress is read from stdout (`--newline` puts every update on its own line); the last
/// `ERROR:` line on stderr becomes the failure message.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    binary_path: PathBuf,
    socket_timeout: Duration,
    user_agent: Option<String>,
}

impl YtDlpBackend {
    /// Create a backend with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            socket_timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }

    /// Attempt to find yt-dlp in PATH
    ///
    /// Uses the `which` crate to search for the `yt-dlp` binary in the system PATH.
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Build from configuration: explicit `binary_path` first, then PATH if `search_path`
    pub fn from_config(config: &BackendConfig) -> Option<Self> {
        let backend = match &config.binary_path {
            Some(path) => Some(Self::new(path.clone())),
            None if config.search_path => Self::from_path(),
            None => None,
        }?;

        Some(Self {
            socket_timeout: config.socket_timeout,
            user_agent: Some(config.user_agent.clone()),
            ..backend
        })
    }

    /// Path of the executable this backend runs
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    fn spawn(&self, args: &[String]) -> Result<Child, BackendError> {
        Command::new(&self.binary_path)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BackendError::Spawn(format!(
                    "failed to run {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })
    }
}

/// Kill the yt-dlp child, logging a failure; returns whether the kill went through
async fn kill_child(child: &mut Child) -> bool {
    match child.kill().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(pid = ?child.id(), error = %e, "Failed to kill yt-dlp process");
            false
        }
    }
}

/// Keep the most useful stderr line: the last `ERROR:` line, else the last non-empty one
fn remember_error_line(last_error: &mut Option<String>, saw_error_tag: &mut bool, line: &str) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }
    if let Some(message) = trimmed.strip_prefix("ERROR:") {
        *last_error = Some(message.trim().to_string());
        *saw_error_tag = true;
    } else if !*saw_error_tag {
        *last_error = Some(trimmed.to_string());
    }
}

#[async_trait]
impl ExtractionBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn execute(
        &self,
        request: &BackendRequest,
        progress: mpsc::UnboundedSender<BackendProgress>,
        cancel: CancellationToken,
    ) -> Result<(), BackendError> {
        let args = request.to_args();
        tracing::debug!(binary = %self.binary_path.display(), ?args, "Starting yt-dlp");

        let mut child = self.spawn(&args)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Io("failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackendError::Io("failed to capture yt-dlp stderr".to_string()))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut last_error: Option<String> = None;
        let mut saw_error_tag = false;

        while stdout_open || stderr_open {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("yt-dlp call cancelled, killing process");
                    kill_child(&mut child).await;
                    return Err(BackendError::Cancelled);
                }
                line = stdout_lines.next_line(), if stdout_open => {
                    match line {
                        Ok(Some(line)) => {
                            if let Some((percent, total_bytes)) = parse_download_line(&line) {
                                // Receiver gone means the job task stopped listening
                                let _ = progress.send(BackendProgress { percent, total_bytes, line });
                            } else {
                                tracing::trace!(line = %line, "yt-dlp output");
                            }
                        }
                        Ok(None) => stdout_open = false,
                        Err(e) => {
                            tracing::warn!(error = %e, "Error reading yt-dlp stdout");
                            stdout_open = false;
                        }
                    }
                }
                line = stderr_lines.next_line(), if stderr_open => {
                    match line {
                        Ok(Some(line)) => {
                            tracing::debug!(line = %line, "yt-dlp stderr");
                            remember_error_line(&mut last_error, &mut saw_error_tag, &line);
                        }
                        Ok(None) => stderr_open = false,
                        Err(e) => {
                            tracing::warn!(error = %e, "Error reading yt-dlp stderr");
                            stderr_open = false;
                        }
                    }
                }
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                kill_child(&mut child).await;
                return Err(BackendError::Cancelled);
            }
            status = child.wait() => status.map_err(|e| BackendError::Io(e.to_string()))?,
        };

        if status.success() {
            return Ok(());
        }

        let code = status.code();
        let message = last_error.unwrap_or_else(|| match code {
            Some(code) => format!("yt-dlp exited with status {}", code),
            None => "yt-dlp was terminated by a signal".to_string(),
        });
        Err(BackendError::Exited { code, message })
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, BackendError> {
        let mut args = vec![
            "-J".to_string(),
            "--no-playlist".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().to_string(),
        ];
        if let Some(user_agent) = &self.user_agent {
            args.push("--user-agent".to_string());
            args.push(user_agent.clone());
        }
        args.push(url.to_string());

        let output = self
            .spawn(&args)?
            .wait_with_output()
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut last_error = None;
            let mut saw_error_tag = false;
            for line in stderr.lines() {
                remember_error_line(&mut last_error, &mut saw_error_tag, line);
            }
            return Err(BackendError::Exited {
                code: output.status.code(),
                message: last_error.unwrap_or_else(|| "yt-dlp probe failed".to_string()),
            });
        }

        parse_probe_json(url, &output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    filesize: Option<f64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
    #[serde(default)]
    format_note: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    abr: Option<f64>,
}

impl RawFormat {
    fn kind(&self) -> Option<FormatKind> {
        let has = |codec: &Option<String>| codec.as_deref().is_some_and(|c| c != "none");
        match (has(&self.vcodec), has(&self.acodec)) {
            (true, true) => Some(FormatKind::Muxed),
            (true, false) => Some(FormatKind::Video),
            (false, true) => Some(FormatKind::Audio),
            // Storyboards and other image-only entries
            (false, false) => None,
        }
    }

    fn label(&self, kind: FormatKind) -> String {
        let ext = self.ext.as_deref().unwrap_or("?");
        match kind {
            FormatKind::Audio => match self.abr {
                Some(abr) => format!("{} {}k", ext, abr.round() as u64),
                None => format!("{} {}", ext, self.format_note.as_deref().unwrap_or("audio")),
            },
            FormatKind::Video | FormatKind::Muxed => match (self.height, &self.format_note) {
                (Some(height), _) => format!("{}p {}", height, ext),
                (None, Some(note)) => format!("{} {}", note, ext),
                (None, None) => ext.to_string(),
            },
        }
    }
}

/// Convert `yt-dlp -J` output into [`MediaInfo`]
///
/// Formats without audio or video (storyboards) are dropped.
pub fn parse_probe_json(url: &str, json: &[u8]) -> Result<MediaInfo, BackendError> {
    let raw: RawInfo =
        serde_json::from_slice(json).map_err(|e| BackendError::Probe(e.to_string()))?;

    let formats = raw
        .formats
        .iter()
        .filter_map(|format| {
            let kind = format.kind()?;
            Some(ProbedFormat {
                format_id: format.format_id.clone(),
                ext: format.ext.clone(),
                label: format.label(kind),
                size_bytes: format
                    .filesize
                    .or(format.filesize_approx)
                    .map(|size| size.max(0.0) as u64),
                kind,
            })
        })
        .collect();

    Ok(MediaInfo {
        url: url.to_string(),
        title: raw.title.unwrap_or_default(),
        uploader: raw.uploader,
        duration_secs: raw.duration.map(|d| d.max(0.0).round() as u64),
        thumbnail_url: raw.thumbnail,
        formats,
    })
}
