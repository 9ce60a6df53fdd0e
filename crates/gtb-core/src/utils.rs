use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;

/// RFC3339 timestamp in UTC (for logs and the snapshot `lastUpdated` stamp).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Truncate to `max` chars, appending `...` when something was cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    format!("{}...", s.chars().take(max).collect::<String>())
}
