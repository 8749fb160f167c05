//! Utility functions for output naming and download directory housekeeping

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use crate::types::JobId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Maximum length of a sanitized title, in characters
pub const MAX_TITLE_LEN: usize = 100;

/// Fallback name for titles that sanitize to nothing
pub const UNTITLED: &str = "untitled";

/// Extensions left behind by an unfinished backend run
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp", "tmp"];

/// Map an arbitrary title to a safe file name stem
///
/// Characters outside `[A-Za-z0-9 .-]` become `-`, runs of spaces collapse to one space,
/// the result is trimmed and cut to [`MAX_TITLE_LEN`] characters. Never returns an empty
/// string (or one made only of dots): such titles become [`UNTITLED`].
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("My/Video: Part #1?? "), "My-Video- Part -1--");
/// assert_eq!(sanitize_title("   "), "untitled");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");

    // Only ASCII survives the mapping, so byte truncation is char truncation
    let mut sanitized = collapsed;
    sanitized.truncate(MAX_TITLE_LEN);
    let sanitized = sanitized.trim_end().to_string();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        UNTITLED.to_string()
    } else {
        sanitized
    }
}

/// Whether the download directory already holds a file for this output stem
///
/// Matches the names the backend derives from `{stem}`: `{stem}.<ext>`, the per-format
/// intermediates `{stem}.f<format>.<ext>`, the merger's `{stem}.temp.<ext>`, and any of those
/// followed by an unfinished marker such as `.part` or `.ytdl`.
pub fn stem_exists_in_dir(dir: &Path, stem: &str) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };

    entries
        .flatten()
        .any(|entry| belongs_to_stem(&entry.file_name().to_string_lossy(), stem))
}

fn belongs_to_stem(file_name: &str, stem: &str) -> bool {
    if file_name == stem {
        return true;
    }
    let Some(rest) = file_name
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        return false;
    };

    let mut segments: Vec<&str> = rest.split('.').collect();
    if segments.len() > 1 && segments.last().is_some_and(|s| is_unfinished_marker(s)) {
        segments.pop();
    }

    match segments.as_slice() {
        [ext] => is_extension(ext),
        [middle, ext] => is_intermediate_segment(middle) && is_extension(ext),
        _ => false,
    }
}

fn is_extension(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric())
}

fn is_unfinished_marker(segment: &str) -> bool {
    PARTIAL_EXTENSIONS.contains(&segment) || segment.starts_with("part-Frag")
}

/// `f<format id>` (yt-dlp per-format download) or `temp` (merger output)
fn is_intermediate_segment(segment: &str) -> bool {
    if segment == "temp" {
        return true;
    }
    segment.strip_prefix('f').is_some_and(|id| {
        id.chars().any(|c| c.is_ascii_digit())
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// Whether files written for one stem could be taken for files of the other
///
/// True for equal stems, and for `a` = `{b}.f137` or `{b}.temp` (either way round), since
/// `{b}.f137.mp4` reads as an intermediate of `b`.
fn stems_overlap(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        outer
            .strip_prefix(inner)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(is_intermediate_segment)
    };
    a == b || nested(a, b) || nested(b, a)
}

/// Pick the output stem for a job, applying the collision policy
///
/// A stem is taken when a live job holds an overlapping claim (`claimed` maps each claimed
/// stem to its holder's task serial) or a file with that stem already exists in `dir`.
///
/// - `Overwrite`: always `base`
/// - `Rename`: `base`, or `"{base} [{id}]"` when `base` is taken
/// - `Skip`: `base`, or a `FileCollision` error when `base` is taken
pub fn resolve_output_stem(
    dir: &Path,
    base: &str,
    id: JobId,
    action: FileCollisionAction,
    claimed: &HashMap<String, u64>,
) -> Result<String> {
    let claimed_overlap = |stem: &str| claimed.keys().any(|c| stems_overlap(c, stem));
    let taken = |stem: &str| claimed_overlap(stem) || stem_exists_in_dir(dir, stem);

    match action {
        FileCollisionAction::Overwrite => Ok(base.to_string()),
        FileCollisionAction::Skip => {
            if taken(base) {
                return Err(Error::FileCollision {
                    path: dir.join(base),
                    reason: "output name already in use and collision action is skip".to_string(),
                });
            }
            Ok(base.to_string())
        }
        FileCollisionAction::Rename => {
            if !taken(base) {
                return Ok(base.to_string());
            }

            // Job ids are unique, so the suffixed stem can only collide with leftovers
            // from a job that was deleted with its files kept
            let renamed = format!("{} [{}]", base, id);
            if claimed_overlap(&renamed) {
                return Err(Error::FileCollision {
                    path: dir.join(&renamed),
                    reason: "renamed output name is claimed by another job".to_string(),
                });
            }
            Ok(renamed)
        }
    }
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PARTIAL_EXTENSIONS.contains(&ext))
}

/// Find the final output file the backend wrote for `stem`
///
/// Prefers `{stem}.{preferred_ext}`, then any other finished file whose stem is exactly
/// `stem`. Falls back to `{stem}.{preferred_ext}` when nothing is on disk.
pub async fn locate_output_file(dir: &Path, stem: &str, preferred_ext: &str) -> PathBuf {
    let preferred = dir.join(format!("{}.{}", stem, preferred_ext));
    if tokio::fs::try_exists(&preferred).await.unwrap_or(false) {
        return preferred;
    }

    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let exact_stem = path.file_stem().and_then(|s| s.to_str()) == Some(stem);
            if exact_stem && !is_partial(&path) {
                return path;
            }
        }
    }

    preferred
}

/// Remove every file belonging to `stem` from the download directory
///
/// Used when a job ends CANCELLED or FAILED: removes `.part`/`.ytdl` leftovers, per-format
/// intermediates and a finished file that lost the race against a cancel. Failures are
/// logged and skipped. Returns the number of files removed.
pub async fn cleanup_partial_files(dir: &Path, stem: &str) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Download directory not readable, nothing to clean");
            return 0;
        }
    };

    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !belongs_to_stem(&name, stem) {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed leftover output file");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove leftover output file");
            }
        }
    }

    removed
}
