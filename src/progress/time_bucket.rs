//! Calendar-day bucketing for streaks and popup throttling
//!
//! Days are "YYYY-MM-DD" strings in a configured fixed UTC offset, so the
//! day boundary is the same on every device regardless of the host timezone.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

/// Build the day-boundary offset from minutes east of UTC.
///
/// Out-of-range offsets fall back to UTC.
pub fn day_offset(utc_offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// Current time in milliseconds since the epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a millisecond timestamp, clamping unrepresentable values to now
pub fn from_ms(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now)
}

/// Calendar day of `at` in the given offset
pub fn local_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Compute the day bucket string from a Unix timestamp in milliseconds.
///
/// # Example
/// ```
/// use chainquest::progress::{day_bucket, day_offset};
/// assert_eq!(day_bucket(1703766896000, day_offset(0)), "2023-12-28");
/// ```
pub fn day_bucket(timestamp_ms: i64, offset: FixedOffset) -> String {
    local_day(from_ms(timestamp_ms), offset)
        .format("%Y-%m-%d")
        .to_string()
}

/// Parse a day bucket string back into a date
pub fn parse_day_bucket(bucket: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(bucket, "%Y-%m-%d").ok()
}

/// Whether `earlier` is exactly the calendar day before `later`
pub fn is_previous_day(earlier: &str, later: &str) -> bool {
    match (parse_day_bucket(earlier), parse_day_bucket(later)) {
        (Some(e), Some(l)) => l.pred_opt() == Some(e),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_bucket_utc() {
        // 2023-12-28 12:34:56 UTC
        assert_eq!(day_bucket(1703766896000, day_offset(0)), "2023-12-28");
    }

    #[test]
    fn test_day_bucket_respects_offset() {
        // 2023-12-28 23:30 UTC is already the 29th at UTC+2
        let ts = Utc
            .with_ymd_and_hms(2023, 12, 28, 23, 30, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(day_bucket(ts, day_offset(0)), "2023-12-28");
        assert_eq!(day_bucket(ts, day_offset(120)), "2023-12-29");
        assert_eq!(day_bucket(ts, day_offset(-300)), "2023-12-28");
    }

    #[test]
    fn test_invalid_offset_falls_back_to_utc() {
        assert_eq!(day_offset(100_000), day_offset(0));
    }

    #[test]
    fn test_previous_day() {
        assert!(is_previous_day("2023-12-31", "2024-01-01"));
        assert!(is_previous_day("2024-02-28", "2024-02-29"));
        assert!(!is_previous_day("2024-01-01", "2024-01-01"));
        assert!(!is_previous_day("2023-12-30", "2024-01-01"));
        assert!(!is_previous_day("garbage", "2024-01-01"));
    }
}
