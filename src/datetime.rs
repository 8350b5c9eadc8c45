//! Date/time utilities for Dropgate.
//!
//! All timestamps are stored as unix seconds (UTC). Conversions to text only
//! happen at the edges: API responses use RFC 3339, CSV exports use the
//! configured server timezone.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Current time as unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Convert unix seconds to an RFC 3339 string in UTC (e.g., "2024-01-15T10:30:00Z").
///
/// Out-of-range values fall back to the raw number.
pub fn to_rfc3339(ts: i64) -> String {
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => ts.to_string(),
    }
}

/// Parse an RFC 3339 string into unix seconds.
pub fn parse_rfc3339(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp())
}

/// Format unix seconds in the given timezone.
///
/// # Arguments
///
/// * `ts` - Unix seconds
/// * `timezone` - Timezone name (e.g., "Europe/Berlin", "UTC")
/// * `format` - Output format string (e.g., "%Y-%m-%d %H:%M:%S")
///
/// An unknown timezone falls back to UTC.
pub fn format_timestamp(ts: i64, timezone: &str, format: &str) -> String {
    let Some(dt) = DateTime::<Utc>::from_timestamp(ts, 0) else {
        return ts.to_string();
    };
    match timezone.parse::<Tz>() {
        Ok(tz) => dt.with_timezone(&tz).format(format).to_string(),
        Err(_) => dt.format(format).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-15T10:30:00Z
    const TS: i64 = 1_705_314_600;

    #[test]
    fn test_to_rfc3339() {
        assert_eq!(to_rfc3339(TS), "2024-01-15T10:30:00Z");
        assert_eq!(to_rfc3339(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(parse_rfc3339("2024-01-15T10:30:00Z"), Some(TS));
        assert_eq!(parse_rfc3339("2024-01-15T11:30:00+01:00"), Some(TS));
        assert_eq!(parse_rfc3339("yesterday"), None);
    }

    #[test]
    fn test_format_timestamp_timezone() {
        let result = format_timestamp(TS, "Asia/Tokyo", "%Y/%m/%d %H:%M");
        assert_eq!(result, "2024/01/15 19:30");
    }

    #[test]
    fn test_format_timestamp_utc() {
        let result = format_timestamp(TS, "UTC", "%Y/%m/%d %H:%M");
        assert_eq!(result, "2024/01/15 10:30");
    }

    #[test]
    fn test_format_timestamp_invalid_timezone() {
        let result = format_timestamp(TS, "Invalid/Zone", "%Y/%m/%d %H:%M");
        assert_eq!(result, "2024/01/15 10:30");
    }

    #[test]
    fn test_now_unix_is_recent() {
        // After 2024-01-01.
        assert!(now_unix() > 1_704_067_200);
    }
}
