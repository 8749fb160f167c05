//! Stand-in backend for graceful degradation

use super::{BackendProgress, BackendRequest, ExtractionBackend};
use crate::error::BackendError;
use crate::types::MediaInfo;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const NOT_FOUND: &str = "yt-dlp binary not found. \
     Configure backend.binary_path in config or ensure yt-dlp is in PATH.";

/// Backend used when no yt-dlp binary is available or configured
///
/// The engine still starts, persists and lists jobs; every job that runs fails with a
/// message explaining how to install the binary.
///
/// # Examples
///
/// ```
/// use media_dl::backend::{BackendRequest, ExtractionBackend, UnavailableBackend};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let backend = UnavailableBackend;
/// assert!(!backend.is_available());
///
/// let (tx, _rx) = mpsc::unbounded_channel();
/// let result = backend
///     .execute(&BackendRequest::new("https://x.test/v"), tx, CancellationToken::new())
///     .await;
/// assert!(result.is_err());
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBackend;

#[async_trait]
impl ExtractionBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        _request: &BackendRequest,
        _progress: mpsc::UnboundedSender<BackendProgress>,
        _cancel: CancellationToken,
    ) -> Result<(), BackendError> {
        Err(BackendError::Spawn(NOT_FOUND.into()))
    }

    async fn probe(&self, _url: &str) -> Result<MediaInfo, BackendError> {
        Err(BackendError::Spawn(NOT_FOUND.into()))
    }
}
