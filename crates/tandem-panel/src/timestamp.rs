//! Lenient timestamp parsing for vendor payloads
//!
//! The panels are not consistent about timestamp formats: offsets may be
//! present or absent, fractional seconds come and go, and the primary panel
//! uses a year-1 zero date for "never". A field that cannot be parsed is
//! treated as absent, with a logged warning - never an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// Parse a vendor timestamp string. Naive timestamps are assumed UTC.
pub(crate) fn parse_lenient(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("0001-01-01") {
        return None;
    }

    // RFC 3339 / ISO 8601 with an explicit offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive forms, with or without fractional seconds
    let cleaned = raw.split('.').next().unwrap_or(raw);
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Some(naive.and_utc());
        }
    }

    warn!(raw, "could not parse panel timestamp");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_rfc3339_with_offset() {
        let dt = parse_lenient("2025-06-01T10:30:00+03:30").unwrap();
        assert_eq!(dt.hour(), 7);
    }

    #[test]
    fn test_naive_assumed_utc() {
        let dt = parse_lenient("2025-06-01T10:30:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_fractional_seconds_dropped() {
        assert!(parse_lenient("2025-06-01 10:30:00.123456").is_some());
    }

    #[test]
    fn test_zero_date_is_absent() {
        assert!(parse_lenient("0001-01-01T00:00:00").is_none());
    }

    #[test]
    fn test_garbage_is_absent() {
        assert!(parse_lenient("not-a-date").is_none());
    }
}
