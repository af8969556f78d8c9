//! Display formatting and input validation helpers shared by the UI layer.

use std::time::Duration;

/// Compact viewer-count formatting: `981`, `1.2K`, `3.4M`.
///
/// Values are truncated, not rounded, so a count never displays higher
/// than it actually is.
pub fn format_viewer_count(count: u64) -> String {
    match count {
        0..=999 => count.to_string(),
        1_000..=999_999 => scaled(count, 1_000, "K"),
        _ => scaled(count, 1_000_000, "M"),
    }
}

fn scaled(value: u64, divisor: u64, suffix: &str) -> String {
    let whole = value / divisor;
    let tenth = value % divisor * 10 / divisor;
    if tenth == 0 {
        format!("{whole}{suffix}")
    } else {
        format!("{whole}.{tenth}{suffix}")
    }
}

/// Player-style duration formatting: `m:ss` under an hour, `h:mm:ss` above.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = total % 3600 / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

const MAX_STREAM_KEY_LEN: usize = 64;

/// Stream keys are restricted to URL-safe characters so they can be embedded
/// in channel names and paths without escaping.
pub fn valid_stream_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_STREAM_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
