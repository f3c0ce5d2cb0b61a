//! Display helpers for asset listings.

use chrono::{DateTime, Utc};

/// Relative upload time, e.g. "5 minutes ago".
///
/// Whole units are floored. Timestamps in the future read as "just now".
pub fn format_time_ago(now: DateTime<Utc>, uploaded_at: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(uploaded_at);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days == 1 {
        "1 day ago".to_string()
    } else {
        format!("{} days ago", days)
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// `m:ss`, or `--` while the pipeline has not measured the video yet.
pub fn format_duration(seconds: Option<f64>) -> String {
    match seconds {
        Some(seconds) if seconds > 0.0 => {
            let total = seconds.floor() as u64;
            format!("{}:{:02}", total / 60, total % 60)
        }
        _ => "--".to_string(),
    }
}

/// Human readable size with at most two decimals, e.g. "1.5 GB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Calendar date of an upload, `YYYY-MM-DD`.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}
