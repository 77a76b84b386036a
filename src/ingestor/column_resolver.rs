/*!
 Column resolver

 Maps table header labels to canonical record fields using a declared
 synonym table. Resolution is a stable left-to-right scan:

  - each header is matched case-insensitively against the groups in table
    order; the first group with a synonym contained in the header wins
  - a field is claimed by the first header that resolves to it; later
    headers resolving to the same field are ignored
  - unmatched headers are ignored

 Group order matters where synonyms overlap: `timing` is listed before
 `time`, and the broad `name` synonym lives in the last group so that
 `Meet name` or `Club name` resolve to their own fields first.
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Canonical field a column can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnField {
    Timing,
    Date,
    Time,
    Meet,
    Nation,
    Club,
    City,
    Pool,
    Gender,
    Category,
    Discipline,
    Athlete,
}

impl ColumnField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnField::Timing => "timing",
            ColumnField::Date => "date",
            ColumnField::Time => "time",
            ColumnField::Meet => "meet",
            ColumnField::Nation => "nation",
            ColumnField::Club => "club",
            ColumnField::City => "city",
            ColumnField::Pool => "pool",
            ColumnField::Gender => "gender",
            ColumnField::Category => "category",
            ColumnField::Discipline => "discipline",
            ColumnField::Athlete => "athlete",
        }
    }
}

impl fmt::Display for ColumnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical field and the lower-case substrings that identify it.
pub struct SynonymGroup {
    pub field: ColumnField,
    pub synonyms: &'static [&'static str],
}

macro_rules! sg {
    ($field:expr, [$($syn:expr),* $(,)?]) => {
        SynonymGroup {
            field: $field,
            synonyms: &[$($syn),*],
        }
    };
}

/// Header dictionary for upstream record tables (English and German labels).
pub static RECORD_COLUMNS: &[SynonymGroup] = &[
    sg!(ColumnField::Timing, ["timing", "zeitnahme", "et/ht"]),
    sg!(ColumnField::Date, ["date", "datum"]),
    sg!(ColumnField::Time, ["time", "result", "zeit", "performance", "leistung"]),
    sg!(ColumnField::Meet, ["meet", "competition", "championship", "venue", "wettkampf", "veranstaltung"]),
    sg!(ColumnField::Nation, ["nation", "country", "noc", "land"]),
    sg!(ColumnField::Club, ["club", "team", "verein"]),
    sg!(ColumnField::City, ["city", "location", "place", "ort"]),
    sg!(ColumnField::Pool, ["pool", "course", "bahn"]),
    sg!(ColumnField::Gender, ["gender", "sex", "geschlecht"]),
    sg!(ColumnField::Category, ["category", "kategorie", "age group", "altersklasse"]),
    sg!(ColumnField::Discipline, ["event", "discipline", "disziplin", "wettbewerb"]),
    sg!(ColumnField::Athlete, ["athlete", "competitor", "swimmer", "holder", "name"]),
];

/// Column layout assumed for tables whose header row resolves neither a
/// discipline nor a time column (the federation's plain world-record tables).
pub static POSITIONAL_LAYOUT: &[ColumnField] = &[
    ColumnField::Discipline,
    ColumnField::Gender,
    ColumnField::Category,
    ColumnField::Athlete,
    ColumnField::Nation,
    ColumnField::Time,
    ColumnField::Date,
    ColumnField::Meet,
];

/// Minimum width for the positional layout to apply
pub const POSITIONAL_MIN_COLUMNS: usize = 6;

/// Resolved field -> column index mapping for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<ColumnField, usize>,
}

impl ColumnMap {
    pub fn get(&self, field: ColumnField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: ColumnField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Trimmed, non-empty cell text for a field in a row
    pub fn cell<'a>(&self, field: ColumnField, cells: &'a [String]) -> Option<&'a str> {
        let idx = self.get(field)?;
        cells
            .get(idx)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// Build a map from a fixed column order
    pub fn positional(layout: &[ColumnField]) -> Self {
        Self {
            columns: layout.iter().enumerate().map(|(i, f)| (*f, i)).collect(),
        }
    }

    fn claim(&mut self, field: ColumnField, idx: usize) -> bool {
        if self.columns.contains_key(&field) {
            return false;
        }
        self.columns.insert(field, idx);
        true
    }
}

pub struct ColumnResolver {
    groups: &'static [SynonymGroup],
}

impl ColumnResolver {
    pub fn new(groups: &'static [SynonymGroup]) -> Self {
        Self { groups }
    }

    /// Resolver over [`RECORD_COLUMNS`].
    pub fn global() -> &'static Self {
        static RESOLVER: OnceLock<ColumnResolver> = OnceLock::new();
        RESOLVER.get_or_init(|| ColumnResolver::new(RECORD_COLUMNS))
    }

    /// The field a single header label resolves to, ignoring prior claims.
    pub fn resolve_label(&self, label: &str) -> Option<ColumnField> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }
        self.groups
            .iter()
            .find(|group| group.synonyms.iter().any(|syn| label.contains(syn)))
            .map(|group| group.field)
    }

    /// Resolve a header row into a column map.
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> ColumnMap {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(field) = self.resolve_label(header.as_ref()) {
                map.claim(field, idx);
            }
        }
        map
    }
}
