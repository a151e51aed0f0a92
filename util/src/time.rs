//! General time utility functions

use chrono;

/// Number of milliseconds in a second
pub const MILLIS_PER_SECOND: i64 = 1_000;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Milliseconds elapsed since the unix epoch.
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
        assert_eq!(duration_to_seconds(chrono::Duration::zero()), Some(0.0));
        assert_eq!(duration_to_seconds(chrono::Duration::max_value()), None);
    }

    #[test]
    fn test_epoch_millis_is_monotonic_enough() {
        let a = epoch_millis();
        let b = epoch_millis();
        assert!(b >= a);
        assert!(a > 1_500_000_000 * MILLIS_PER_SECOND);
    }
}
