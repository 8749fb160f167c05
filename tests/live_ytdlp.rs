//! Tests against a real yt-dlp binary and the network
//!
//! All tests are marked #[ignore] and need the `live-tests` feature.
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --features live-tests --test live_ytdlp -- --ignored --nocapture
//! ```
//!
//! # Environment
//!
//! - `MEDIA_DL_LIVE_URL` - URL to probe and download (optional, defaults to a short public video)

#![cfg(feature = "live-tests")]

use media_dl::{
    Config, ExtractionBackend, FormatKind, JobSpec, JobState, MediaDownloader, MediaFormat,
    YtDlpBackend,
};
use std::time::Duration;

const DEFAULT_URL: &str = "https://www.youtube.com/watch?v=jNQXAC9IVRw";

fn live_url() -> String {
    std::env::var("MEDIA_DL_LIVE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string())
}

#[tokio::test]
#[ignore]
async fn test_probe_real_url() {
    let Some(backend) = YtDlpBackend::from_path() else {
        eprintln!("Skipping: yt-dlp not found in PATH");
        return;
    };

    let info = backend.probe(&live_url()).await.unwrap();
    println!("{} by {:?}: {} formats", info.title, info.uploader, info.formats.len());

    assert!(!info.title.is_empty());
    assert!(info.formats.iter().any(|f| f.kind == FormatKind::Audio));
}

#[tokio::test]
#[ignore]
async fn test_download_best_audio() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("live.db");
    config.download.download_dir = temp_dir.path().join("downloads");

    let downloader = MediaDownloader::new(config).await.unwrap();
    if !downloader.backend_available() {
        eprintln!("Skipping: yt-dlp not found in PATH");
        return;
    }

    let info = downloader.probe(&live_url()).await.unwrap();
    let audio = info
        .formats
        .iter()
        .filter(|f| f.kind == FormatKind::Audio)
        .max_by_key(|f| f.size_bytes.unwrap_or(0))
        .expect("an audio format");

    let id = downloader
        .start(JobSpec {
            url: info.url.clone(),
            title: info.title.clone(),
            thumbnail_url: info.thumbnail_url.clone(),
            duration_secs: info.duration_secs,
            uploader: info.uploader.clone(),
            mode: media_dl::ExtractionMode::AudioOnly,
            video_format: None,
            audio_format: Some(MediaFormat::new(audio.format_id.clone(), audio.size_bytes)),
        })
        .await
        .unwrap();

    let mut job = downloader.get(id).await.unwrap().unwrap();
    for _ in 0..600 {
        job = downloader.get(id).await.unwrap().unwrap();
        if matches!(
            job.state,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        ) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    assert_eq!(job.state, JobState::Completed, "job ended as {:?}", job);
    assert!(job.file_path.unwrap().exists());
    downloader.shutdown().await.unwrap();
}
