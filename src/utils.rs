//! Utility functions for the record sync service
//!
//! - `time`: race-time parsing and display formatting
//! - `datetime`: stored timestamp and record-date parsing

pub mod datetime;
pub mod time;

pub use datetime::{parse_record_date, DateTimeParser};
pub use time::{format_millis, parse_time_to_millis};

/// Collapse runs of whitespace (including non-breaking spaces) into single
/// spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Jane \n\t Doe\u{a0} "), "Jane Doe");
        assert_eq!(collapse_whitespace(""), "");
    }
}
