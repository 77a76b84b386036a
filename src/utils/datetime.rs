//! Datetime and record-date parsing
//!
//! Stored timestamps are written as RFC3339 and read back through
//! [`DateTimeParser::parse_flexible`], which also accepts SQLite's default
//! `YYYY-MM-DD HH:MM:SS` form. Record dates scraped from upstream tables go
//! through [`parse_record_date`], which is deliberately narrow.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors that can occur during datetime operations
#[derive(Error, Debug)]
pub enum DateTimeError {
    #[error("Invalid datetime format: '{input}' - expected RFC3339 (2023-01-01T12:00:00Z) or SQLite (2023-01-01 12:00:00)")]
    InvalidFormat { input: String },
}

pub struct DateTimeParser;

impl DateTimeParser {
    /// Parse a stored timestamp.
    ///
    /// Supports RFC3339 with offset and the SQLite format `2023-01-01 12:00:00`
    /// (with or without fractional seconds, assumed UTC).
    pub fn parse_flexible(datetime_str: &str) -> Result<DateTime<Utc>, DateTimeError> {
        let trimmed = datetime_str.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }

        let naive_formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M:%S%.f",
        ];

        for format in &naive_formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }

        Err(DateTimeError::InvalidFormat {
            input: datetime_str.to_string(),
        })
    }

    /// Format a timestamp for storage (RFC3339, UTC, fixed microsecond precision)
    pub fn format_for_storage(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

fn day_first_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2})-(\d{2})-(\d{4})$").expect("valid regex"))
}

fn iso_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"))
}

/// Parse a record date written as `DD-MM-YYYY` or `YYYY-MM-DD`.
///
/// Anything else, including impossible calendar dates, yields `None`.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    let (year, month, day) = if let Some(caps) = day_first_regex().captures(trimmed) {
        (caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)
    } else if let Some(caps) = iso_regex().captures(trimmed) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else {
        return None;
    };

    NaiveDate::from_ymd_opt(year, month, day)
}
