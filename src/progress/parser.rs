//! Backend output line parsing
//!
//! Pure functions over a single line of backend output. None of them fail: a line without the
//! token yields an empty string (or `None` for the numeric parsers).

use regex::Regex;
use std::sync::LazyLock;

// Literal patterns; a compile failure is caught by the tests below
#[allow(clippy::unwrap_used)]
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*[KMG]iB/s").unwrap());

#[allow(clippy::unwrap_used)]
static ETA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ETA ([\d:]+)").unwrap());

// [download]  42.3% of ~ 12.34MiB at  1.23MiB/s ETA 00:12
#[allow(clippy::unwrap_used)]
static DOWNLOAD_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%(?:\s+of\s+~?\s*(\d+(?:\.\d+)?)\s*([KMGT]?i?B))?")
        .unwrap()
});

/// First "number + {K,M,G}iB/s" token in the line, e.g. `"1.23MiB/s"`
pub fn extract_speed(line: &str) -> String {
    SPEED_RE
        .find(line)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Digits and colons following `"ETA "`, e.g. `"00:12"`
pub fn extract_eta(line: &str) -> String {
    ETA_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Percent and total size from a yt-dlp `[download]` progress line
///
/// Returns `None` for any other line. The total is `None` when the line has no size.
pub fn parse_download_line(line: &str) -> Option<(f32, Option<u64>)> {
    let caps = DOWNLOAD_LINE_RE.captures(line)?;
    let percent: f32 = caps.get(1)?.as_str().parse().ok()?;

    let total = match (caps.get(2), caps.get(3)) {
        (Some(value), Some(unit)) => parse_size(value.as_str(), unit.as_str()),
        _ => None,
    };

    Some((percent, total))
}

fn parse_size(value: &str, unit: &str) -> Option<u64> {
    let value: f64 = value.parse().ok()?;
    let multiplier: f64 = match unit {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => return None,
    };
    Some((value * multiplier).round() as u64)
}

/// Clamp a raw backend percent to `0.0..=100.0`; non-positive and NaN become 0
pub fn normalize_percent(percent: f32) -> f32 {
    if percent.is_nan() || percent <= 0.0 {
        0.0
    } else {
        percent.min(100.0)
    }
}
