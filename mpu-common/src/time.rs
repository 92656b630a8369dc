//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Timestamp tag used in report file names (`20240131_235959_123`)
///
/// Millisecond resolution keeps back-to-back runs from colliding.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S_%3f").to_string()
}
