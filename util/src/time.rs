//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a number of seconds into a std duration.
///
/// Negative or non-finite values give `None`.
pub fn seconds_to_std(seconds: f64) -> Option<std::time::Duration> {
    if seconds.is_finite() && seconds >= 0.0 {
        Some(std::time::Duration::from_secs_f64(seconds))
    }
    else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(duration_to_seconds(chrono::Duration::milliseconds(1500)), Some(1.5));
        assert_eq!(duration_to_seconds(chrono::Duration::zero()), Some(0.0));
    }

    #[test]
    fn test_seconds_to_std() {
        assert_eq!(seconds_to_std(0.05), Some(std::time::Duration::from_millis(50)));
        assert_eq!(seconds_to_std(-1.0), None);
        assert_eq!(seconds_to_std(f64::NAN), None);
    }
}
