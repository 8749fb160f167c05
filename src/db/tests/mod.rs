
use crate::db::NewJob;
use crate::types::ExtractionMode;

/// A video+audio job with the given title and declared total size
pub(super) fn sample_job(title: &str, total_size_bytes: u64) -> NewJob {
    NewJob {
        title: title.to_string(),
        source_url: "https://www.youtube.com/watch?v=abc123".to_string(),
        thumbnail_url: None,
        total_size_bytes,
        duration_secs: Some(212),
        uploader: Some("Some Channel".to_string()),
        video_format_label: Some("1080p".to_string()),
        audio_format_label: Some("m4a 128k".to_string()),
        mode: ExtractionMode::VideoAudio,
        video_format_id: Some("137".to_string()),
        audio_format_id: Some("140".to_string()),
    }
}
