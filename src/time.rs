//! Human readable durations.

use std::time::Duration;

/// Formats a duration given in parts.
///
/// The parts don't need to be normalized, `0, 135, 0` is the same as `2, 15, 0`. The result is one
/// of:
///
/// * `S seconds` under a minute,
/// * `MM:SS minutes` under an hour,
/// * `HH:MM:SS hours` otherwise.
///
/// # Examples
///
/// ```rust
/// use plywood::time::human_readable_time;
///
/// assert_eq!("59:00 minutes", human_readable_time(0, 59, 0));
/// assert_eq!("01:00:00 hours", human_readable_time(0, 60, 0));
/// assert_eq!("42 seconds", human_readable_time(0, 0, 42));
/// ```
pub fn human_readable_time(hours: u64, minutes: u64, seconds: u64) -> String {
    let total = hours
        .saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds);
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02} hours", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{:02}:{:02} minutes", minutes, seconds)
    } else {
        format!("{} seconds", seconds)
    }
}

/// Formats a duration, dropping the fractions of a second.
pub fn human_readable_duration(duration: Duration) -> String {
    human_readable_time(0, 0, duration.as_secs())
}
