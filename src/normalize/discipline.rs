//! Discipline name normalization
//!
//! Event names arrive as free text such as `Open - 100m Rescue Medley - Women`,
//! `Masters M30 200 m Obstacle Swim` or `200m Hindernisschwimmen`. They are
//! reduced to an event phrase, looked up in [`DISCIPLINE_ALIASES`] and composed
//! with the event class into an upper-snake-case code:
//!
//! - open (or no class): `100_MEDLEY`
//! - youth: `YOUTH_100_MEDLEY`
//! - masters: `MASTERS_100_MEDLEY_M30`
//!
//! Phrases missing from the table fall back to a slug of the phrase. Both the
//! table codes and slugs match the canonical code pattern, so normalizing a
//! code again returns it unchanged.

use regex::Regex;
use std::sync::OnceLock;

use super::{is_gender_word, word_tokens};

/// Event class encoded as a code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Open,
    Youth,
    Masters,
}

/// Known event phrases (lower-case, whitespace-collapsed, distances written
/// as `100m` / `4x50m`) and their codes. First entry wins on duplicates.
pub static DISCIPLINE_ALIASES: &[(&str, &str)] = &[
    // Individual
    ("200m obstacle swim", "200_OBS"),
    ("200m obstacle swimming", "200_OBS"),
    ("200m obstacle", "200_OBS"),
    ("200m hindernisschwimmen", "200_OBS"),
    ("50m manikin carry", "50_MAN"),
    ("50m retten", "50_MAN"),
    ("50m retten einer puppe", "50_MAN"),
    ("100m manikin carry with fins", "100_MAN_FINS"),
    ("100m retten mit flossen", "100_MAN_FINS"),
    ("100m rescue medley", "100_MEDLEY"),
    ("100m kombinierte rettungsübung", "100_MEDLEY"),
    ("100m manikin tow with fins", "100_TOW_FINS"),
    ("100m retten mit flossen und gurtretter", "100_TOW_FINS"),
    ("200m super lifesaver", "200_SUPER"),
    ("200m super life saver", "200_SUPER"),
    ("line throw", "LINE_THROW"),
    ("leinenwurf", "LINE_THROW"),
    // Relays
    ("4x50m obstacle relay", "R4X50_OBS"),
    ("4x50m hindernisstaffel", "R4X50_OBS"),
    ("4x25m manikin relay", "R4X25_MAN"),
    ("4x25m puppenstaffel", "R4X25_MAN"),
    ("4x50m medley relay", "R4X50_MEDLEY"),
    ("4x50m rettungsstaffel", "R4X50_MEDLEY"),
    ("4x50m rescue tube relay", "R4X50_TUBE"),
    ("4x50m gurtretterstaffel", "R4X50_TUBE"),
];

const OPEN_TOKENS: &[&str] = &["open", "offen", "offene"];
const YOUTH_TOKENS: &[&str] = &["youth", "junior", "juniors", "jugend"];
const MASTERS_TOKENS: &[&str] = &["masters", "master", "senioren"];
const NOISE_TOKENS: &[&str] = &["age", "group", "ak", "category", "class", "world", "record", "records"];

/// The pieces a discipline text was reduced to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisciplineParts {
    pub class: Option<EventClass>,
    /// Lower bound of the masters age band, e.g. `30` for `M30`
    pub age_band: Option<u16>,
    /// Base event code without class prefix or age band
    pub event: Option<String>,
}

impl DisciplineParts {
    /// Take the class and age band from a heading when the cell has none.
    pub fn inherit(&mut self, context: &DisciplineParts) {
        if self.class.is_none() {
            self.class = context.class;
        }
        if self.age_band.is_none() {
            self.age_band = context.age_band;
        }
    }

    /// Compose the full discipline code; `None` without an event.
    pub fn code(&self) -> Option<String> {
        let event = self.event.as_deref()?;
        let code = match self.class {
            Some(EventClass::Youth) => format!("YOUTH_{}", event),
            Some(EventClass::Masters) => match self.age_band {
                Some(band) => format!("MASTERS_{}_M{}", event, band),
                None => format!("MASTERS_{}", event),
            },
            Some(EventClass::Open) | None => event.to_string(),
        };
        Some(code)
    }
}

fn canonical_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9_]+$").expect("valid regex"))
}

fn relay_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*[x×]\s*(\d+)").expect("valid regex"))
}

fn distance_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*(?:metres?|meters?|m)\b").expect("valid regex"))
}

/// `M30`, `AK 30`, `M30-34`, `M70+`: a band that implies masters on its own.
/// The upper bound of a range is consumed with it.
fn band_code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:m|ak)\s?(\d{2})(?:\s*-\s*\d{2}\b|\+|\b)").expect("valid regex")
    })
}

/// `30-34`, `35+`: only a band when masters is named
fn band_range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{2})\s*(?:-\s*\d{2}\b|\+)").expect("valid regex"))
}

fn slug_unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)m\b").expect("valid regex"))
}

/// Split discipline text into class, age band and event.
///
/// Returns `None` for blank text. A canonical code is kept whole as the event.
pub fn parse_discipline(raw: &str) -> Option<DisciplineParts> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if canonical_code_regex().is_match(trimmed) {
        return Some(DisciplineParts {
            class: None,
            age_band: None,
            event: Some(trimmed.to_string()),
        });
    }

    let lowered = trimmed.to_lowercase();
    let text = relay_regex().replace_all(&lowered, "${1}x${2}");
    let mut text = distance_regex().replace_all(&text, "${1}m").into_owned();

    let mut age_band = None;
    let mut masters_by_band = false;
    if let Some(caps) = band_code_regex().captures(&text) {
        age_band = caps[1].parse::<u16>().ok();
        masters_by_band = age_band.is_some();
        text = band_code_regex().replace(&text, " ").into_owned();
    }

    let tokens = word_tokens(&text);
    let has = |set: &[&str]| tokens.iter().any(|t| set.contains(&t.as_str()));

    let class = if masters_by_band || has(MASTERS_TOKENS) {
        Some(EventClass::Masters)
    } else if has(YOUTH_TOKENS) {
        Some(EventClass::Youth)
    } else if has(OPEN_TOKENS) {
        Some(EventClass::Open)
    } else {
        None
    };

    if class == Some(EventClass::Masters) && age_band.is_none() {
        if let Some(caps) = band_range_regex().captures(&text) {
            age_band = caps[1].parse::<u16>().ok();
            text = band_range_regex().replace(&text, " ").into_owned();
        }
    }

    let mut phrase: Vec<String> = word_tokens(&text)
        .into_iter()
        .filter(|t| {
            !OPEN_TOKENS.contains(&t.as_str())
                && !YOUTH_TOKENS.contains(&t.as_str())
                && !MASTERS_TOKENS.contains(&t.as_str())
                && !NOISE_TOKENS.contains(&t.as_str())
                && !is_gender_word(t)
        })
        .collect();

    // Trailing single-letter gender marker, e.g. "100m Rescue Medley (W)"
    while phrase.len() > 1
        && phrase
            .last()
            .map_or(false, |t| matches!(t.as_str(), "m" | "w" | "f" | "x"))
    {
        phrase.pop();
    }

    let event = if phrase.is_empty() {
        None
    } else {
        Some(event_code(&phrase.join(" ")))
    };

    Some(DisciplineParts {
        class,
        age_band,
        event,
    })
}

/// Normalize free-text discipline names to a canonical code.
///
/// Canonical input (upper-case letters, digits, underscores) is returned as is.
pub fn normalize_discipline(raw: &str) -> Option<String> {
    parse_discipline(raw)?.code()
}

fn event_code(phrase: &str) -> String {
    DISCIPLINE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == phrase)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| slug(phrase))
}

/// Deterministic fallback: drop the metre unit after distances, upper-case,
/// replace everything else with single underscores.
fn slug(phrase: &str) -> String {
    let without_unit = slug_unit_regex().replace_all(phrase, "${1}");
    let mut out = String::with_capacity(without_unit.len());
    let mut pending_separator = false;

    for c in without_unit.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c.to_ascii_uppercase());
        } else {
            pending_separator = true;
        }
    }

    out
}
