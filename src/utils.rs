//! Path helpers and timestamp conversion.

use crate::error::{RegistryError, Result};
use chrono::{DateTime, Utc};

/// Separator between key path segments.
pub const PATH_SEPARATOR: char = '\\';

/// Longest key name the store accepts, in characters.
pub const MAX_KEY_NAME_LEN: usize = 255;

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// Joins a child name onto a relative key path.
///
/// The result always has exactly one separator between `base` and `child`,
/// regardless of how many trailing separators `base` carries. An empty base
/// yields the child name unchanged.
pub fn join_path(base: &str, child: &str) -> String {
    let trimmed = base.trim_end_matches(PATH_SEPARATOR);
    if trimmed.is_empty() {
        return child.to_string();
    }
    let mut joined = String::with_capacity(trimmed.len() + 1 + child.len());
    joined.push_str(trimmed);
    joined.push(PATH_SEPARATOR);
    joined.push_str(child);
    joined
}

/// Splits a key path into its segments, skipping empty ones.
///
/// # Errors
///
/// Returns `InvalidArgument` if a segment exceeds [`MAX_KEY_NAME_LEN`].
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();
    for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        if segment.chars().count() > MAX_KEY_NAME_LEN {
            return Err(RegistryError::invalid_argument(format!(
                "key name longer than {} characters",
                MAX_KEY_NAME_LEN
            )));
        }
        segments.push(segment);
    }
    Ok(segments)
}

/// Folds a key or value name for case-insensitive comparison.
pub fn fold_name(name: &str) -> String {
    name.to_ascii_uppercase()
}

/// Converts a Windows FILETIME (100ns ticks since 1601) to a UTC timestamp.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let seconds = (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
    let nanos = ((filetime % 10_000_000) * 100) as u32;

    DateTime::from_timestamp(seconds, nanos)
}

/// Converts a UTC timestamp to a Windows FILETIME, clamping pre-1601 to 0.
pub fn datetime_to_filetime(time: DateTime<Utc>) -> u64 {
    let seconds = time.timestamp() + FILETIME_UNIX_DIFF;
    if seconds < 0 {
        return 0;
    }
    seconds as u64 * 10_000_000 + u64::from(time.timestamp_subsec_nanos() / 100)
}
