/*!
 Field normalizers

 Pure functions that turn upstream cell and heading text into the canonical
 enumerations stored on a record. None of them guess: text without a clear
 marker maps to `Gender::Unknown`, the 50m default pool or electronic timing.

 Discipline names have their own alias table in [`discipline`].
*/

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Gender, PoolLength, Timing};

pub mod discipline;

pub use discipline::{normalize_discipline, parse_discipline, DisciplineParts, EventClass};

const MALE_TOKENS: &[&str] = &["male", "men", "männer", "maenner", "herren", "boys"];
const FEMALE_TOKENS: &[&str] = &["female", "women", "frauen", "damen", "ladies", "girls"];
const MIXED_TOKENS: &[&str] = &["mixed", "mixte", "mix"];

/// Lower-case and split on anything that is not a letter or digit, after
/// dropping possessive suffixes (`Women's` -> `women`).
pub(crate) fn word_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace("'s", " ")
        .replace("’s", " ")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Gender named by a single word. Keywords match as prefixes so `Womens`
/// and `Herrenstaffel` count. Female keywords are tried first because
/// `women` contains `men`.
fn token_gender(token: &str) -> Option<Gender> {
    let starts = |set: &[&str]| set.iter().any(|k| token.starts_with(k));
    if starts(FEMALE_TOKENS) {
        Some(Gender::Female)
    } else if starts(MALE_TOKENS) {
        Some(Gender::Male)
    } else if starts(MIXED_TOKENS) {
        Some(Gender::Mixed)
    } else {
        None
    }
}

pub(crate) fn is_gender_word(token: &str) -> bool {
    token_gender(token).is_some()
}

/// Map a gender cell or heading to `M`, `F`, `X` or unknown.
///
/// Single-letter codes (`M`, `F`, `W`, `X`) only count when they are the whole
/// value, so distance units such as `100 m` never read as a gender. Text that
/// names both men and women without saying mixed is unknown.
pub fn normalize_gender(raw: &str) -> Gender {
    let trimmed = raw.trim().trim_end_matches('.').to_lowercase();
    match trimmed.as_str() {
        "m" => return Gender::Male,
        "f" | "w" => return Gender::Female,
        "x" => return Gender::Mixed,
        _ => {}
    }

    let found: Vec<Gender> = word_tokens(&trimmed)
        .iter()
        .filter_map(|t| token_gender(t))
        .collect();
    if found.contains(&Gender::Mixed) {
        return Gender::Mixed;
    }

    let male = found.contains(&Gender::Male);
    let female = found.contains(&Gender::Female);
    match (male, female) {
        (true, false) => Gender::Male,
        (false, true) => Gender::Female,
        _ => Gender::Unknown,
    }
}

fn short_course_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b25\s*-?\s*m(?:etres?|eters?)?\b|\bshort[\s-]*course\b|\bscm?\b|\bkurzbahn\b")
            .expect("valid regex")
    })
}

fn long_course_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b50\s*-?\s*m(?:etres?|eters?)?\b|\blong[\s-]*course\b|\blcm?\b|\blangbahn\b")
            .expect("valid regex")
    })
}

/// Detect the pool length from pool, section, heading or caption texts.
///
/// Texts are searched in the order given and the earliest marker wins. A bare
/// `25` or `50` (a pool column value) also counts. Defaults to 50m. Discipline
/// names must not be passed here: `4x25m` is a relay distance, not a pool.
pub fn detect_pool_length(texts: &[&str]) -> PoolLength {
    for text in texts {
        match text.trim() {
            "25" => return PoolLength::Short,
            "50" => return PoolLength::Long,
            _ => {}
        }

        let short = short_course_regex().find(text).map(|m| m.start());
        let long = long_course_regex().find(text).map(|m| m.start());
        match (short, long) {
            (Some(s), Some(l)) => {
                return if s <= l {
                    PoolLength::Short
                } else {
                    PoolLength::Long
                }
            }
            (Some(_), None) => return PoolLength::Short,
            (None, Some(_)) => return PoolLength::Long,
            (None, None) => {}
        }
    }

    PoolLength::default()
}

/// Hand timing when the text says `hand`, `manual` or `HT`; electronic otherwise.
pub fn detect_timing(raw: &str) -> Timing {
    let hand = word_tokens(raw)
        .iter()
        .any(|t| t.starts_with("hand") || t.starts_with("manual") || t == "ht");
    if hand {
        Timing::Hand
    } else {
        Timing::Electronic
    }
}

fn nation_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)\s*\(([A-Za-z]{3})\)\s*$").expect("valid regex"))
}

/// Split `"Jane Doe (GER)"` into the athlete name and an upper-case nation code.
pub fn extract_nation(raw: &str) -> (String, Option<String>) {
    let trimmed = raw.trim();
    match nation_suffix_regex().captures(trimmed) {
        Some(caps) if !caps[1].trim().is_empty() => (
            caps[1].trim().to_string(),
            Some(caps[2].to_uppercase()),
        ),
        _ => (trimmed.to_string(), None),
    }
}

fn time_annotation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\(?\b(?:wr|er|nr|cr|et|ht)\b\)?|[*†#]").expect("valid regex")
    })
}

/// Remove record and timing annotations (`WR`, `(HT)`, `*`) from a time cell.
pub fn strip_time_annotations(raw: &str) -> String {
    time_annotation_regex().replace_all(raw, " ").trim().to_string()
}
