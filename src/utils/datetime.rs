//! Centralized datetime handling utilities
//!
//! Consistent datetime parsing and formatting for the `time` helper and
//! any future temporal comparison support. Eliminates per-call-site
//! duplication of format lists.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// Errors that can occur during datetime operations
#[derive(Error, Debug)]
pub enum DateTimeError {
    /// Invalid datetime format provided
    #[error(
        "Invalid datetime format: '{input}' - expected RFC3339 (2023-01-01T12:00:00Z), SQLite (2023-01-01 12:00:00), XMLTV (20230101120000) or a plain date"
    )]
    InvalidFormat { input: String },
}

/// Centralized datetime parsing and formatting utilities
pub struct DateTimeParser;

impl DateTimeParser {
    /// Parse a datetime from the fixed list of formats the engine accepts.
    ///
    /// Supports:
    /// - RFC3339 with timezone: "2023-01-01T12:00:00Z", "…+02:00"
    /// - SQLite format (assumes UTC): "2023-01-01 12:00:00"
    /// - ISO without timezone: "2023-01-01T12:00:00"
    /// - XMLTV basic formats: "20230101120000", "20230101"
    /// - Plain date: "2023-01-01"
    pub fn parse_flexible(datetime_str: &str) -> Result<DateTime<Utc>, DateTimeError> {
        let trimmed = datetime_str.trim();

        // RFC3339 first (most common for APIs)
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z") {
            return Ok(dt.with_timezone(&Utc));
        }

        // Naive datetime formats (assume UTC)
        let naive_formats = [
            "%Y-%m-%d %H:%M:%S",    // SQLite format
            "%Y-%m-%d %H:%M:%S%.f", // SQLite with microseconds
            "%Y-%m-%dT%H:%M:%S",    // ISO without timezone
            "%Y-%m-%dT%H:%M:%S%.f", // ISO with microseconds
            "%Y%m%d%H%M%S",         // XMLTV format
            "%Y%m%dT%H%M%S",        // Basic ISO format
        ];

        for format in &naive_formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }

        // Date-only formats, midnight UTC
        for format in &["%Y-%m-%d", "%Y%m%d"] {
            if let Ok(naive_date) = NaiveDate::parse_from_str(trimmed, format) {
                let naive_dt = naive_date.and_hms_opt(0, 0, 0).expect("midnight is valid");
                return Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }

        Err(DateTimeError::InvalidFormat {
            input: datetime_str.to_string(),
        })
    }

    /// Canonical RFC3339 rendering (seconds precision, `Z` suffix).
    pub fn format_rfc3339(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_rfc3339_variants() {
        assert!(DateTimeParser::parse_flexible("2023-01-01T12:00:00Z").is_ok());
        assert!(DateTimeParser::parse_flexible("2023-01-01T12:00:00+02:00").is_ok());
    }

    #[test]
    fn offset_converts_to_utc() {
        let dt = DateTimeParser::parse_flexible("2023-01-01T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn parses_sqlite_and_xmltv_formats() {
        let a = DateTimeParser::parse_flexible("2023-01-01 12:00:00").unwrap();
        let b = DateTimeParser::parse_flexible("20230101120000").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parses_date_only_as_midnight() {
        let dt = DateTimeParser::parse_flexible("2024-01-01").unwrap();
        assert_eq!(DateTimeParser::format_rfc3339(&dt), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_garbage() {
        assert!(DateTimeParser::parse_flexible("not-a-date").is_err());
        assert!(DateTimeParser::parse_flexible("").is_err());
    }
}
