//! Race-time parsing and display formatting
//!
//! Times arrive as `M:SS.hh`, `MM:SS.hh`, `SS.hh` or `H:MM:SS.hh`, with either
//! `.` or `,` as the decimal separator. Everything is stored as whole
//! milliseconds with hundredth precision.

/// Parse a textual race time into milliseconds.
///
/// Returns `None` for empty input or anything with non-digit residue. A
/// fractional part of one to three digits is padded or truncated to
/// hundredths; a missing fraction counts as zero. `Some(0)` is a valid result
/// and is left for the validator to reject.
pub fn parse_time_to_millis(text: &str) -> Option<u64> {
    let normalized = text.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }

    let groups: Vec<&str> = normalized.split(':').collect();
    if groups.len() > 3 {
        return None;
    }

    let (leading, last) = groups.split_at(groups.len() - 1);
    let last = last[0];

    let mut places = Vec::with_capacity(leading.len());
    for group in leading {
        if group.is_empty() || group.len() > 2 || !is_digits(group) {
            return None;
        }
        places.push(group.parse::<u64>().ok()?);
    }

    // Minutes below an hour group are a clock value
    if places.len() == 2 && places[1] >= 60 {
        return None;
    }

    let (seconds_text, fraction_text) = match last.split_once('.') {
        Some((s, f)) => (s, Some(f)),
        None => (last, None),
    };

    if seconds_text.is_empty() || !is_digits(seconds_text) {
        return None;
    }
    if !places.is_empty() && seconds_text.len() > 2 {
        return None;
    }
    // Bare seconds are bounded so the multiplication below cannot overflow
    if seconds_text.len() > 6 {
        return None;
    }
    let seconds: u64 = seconds_text.parse().ok()?;
    if !places.is_empty() && seconds >= 60 {
        return None;
    }

    let hundredths = match fraction_text {
        None => 0,
        Some(f) if !f.is_empty() && f.len() <= 3 && is_digits(f) => {
            let mut digits: String = f.chars().take(2).collect();
            while digits.len() < 2 {
                digits.push('0');
            }
            digits.parse::<u64>().ok()?
        }
        Some(_) => return None,
    };

    let whole_seconds = places
        .iter()
        .fold(0u64, |acc, place| acc * 60 + place)
        * 60
        + seconds;

    Some(whole_seconds * 1000 + hundredths * 10)
}

/// Format milliseconds for display: `S.hh`, `M:SS.hh` or `H:MM:SS.hh`.
pub fn format_millis(millis: u64) -> String {
    let hundredths = (millis % 1000) / 10;
    let total_seconds = millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}.{:02}", hours, minutes, seconds, hundredths)
    } else if minutes > 0 {
        format!("{}:{:02}.{:02}", minutes, seconds, hundredths)
    } else {
        format!("{}.{:02}", seconds, hundredths)
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
