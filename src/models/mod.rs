use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod sync;

pub use sync::*;

/// Which record list a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordScope {
    World,
    National,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "X")]
    Mixed,
    #[serde(rename = "unknown")]
    Unknown,
}

/// Pool length in metres. Only short (25m) and long (50m) course exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum PoolLength {
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timing {
    /// Electronic timing
    #[serde(rename = "ET")]
    Electronic,
    /// Hand (manual) timing
    #[serde(rename = "HT")]
    Hand,
}

impl RecordScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordScope::World => "world",
            RecordScope::National => "national",
        }
    }
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Mixed => "X",
            Gender::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Gender::Unknown)
    }

    /// Parse a gender code ignoring case, e.g. from a query string
    pub fn from_code(code: &str) -> Result<Self, String> {
        let code = code.trim();
        if code.eq_ignore_ascii_case("unknown") {
            Ok(Gender::Unknown)
        } else {
            code.to_ascii_uppercase().parse()
        }
    }
}

impl PoolLength {
    pub fn metres(&self) -> u16 {
        match self {
            PoolLength::Short => 25,
            PoolLength::Long => 50,
        }
    }
}

impl Default for PoolLength {
    fn default() -> Self {
        PoolLength::Long
    }
}

impl Timing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::Electronic => "ET",
            Timing::Hand => "HT",
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Timing::Electronic
    }
}

impl From<PoolLength> for u16 {
    fn from(pool: PoolLength) -> Self {
        pool.metres()
    }
}

impl TryFrom<u16> for PoolLength {
    type Error = String;

    fn try_from(metres: u16) -> Result<Self, Self::Error> {
        match metres {
            25 => Ok(PoolLength::Short),
            50 => Ok(PoolLength::Long),
            other => Err(format!("unsupported pool length: {}m", other)),
        }
    }
}

impl FromStr for RecordScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "world" => Ok(RecordScope::World),
            "national" => Ok(RecordScope::National),
            other => Err(format!("unknown record scope: {}", other)),
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            "X" => Ok(Gender::Mixed),
            "unknown" => Ok(Gender::Unknown),
            other => Err(format!("unknown gender code: {}", other)),
        }
    }
}

impl FromStr for Timing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ET" => Ok(Timing::Electronic),
            "HT" => Ok(Timing::Hand),
            other => Err(format!("unknown timing code: {}", other)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key of a persisted record. At most one row exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub record_scope: RecordScope,
    pub discipline_code: String,
    pub gender: Gender,
    pub pool_length: PoolLength,
    pub timing: Timing,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}m/{}",
            self.record_scope.as_str(),
            self.discipline_code,
            self.gender,
            self.pool_length.metres(),
            self.timing
        )
    }
}

/// An extracted, normalised row that has not been validated yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCandidate {
    pub record_scope: RecordScope,
    pub discipline_code: Option<String>,
    pub gender: Gender,
    pub pool_length: PoolLength,
    pub timing: Timing,
    pub time_millis: Option<u64>,
    pub athlete_name: Option<String>,
    pub nation: Option<String>,
    pub club: Option<String>,
    pub meet_name: Option<String>,
    pub city: Option<String>,
    pub record_date: Option<NaiveDate>,
    pub source_url: String,
    pub updated_at: DateTime<Utc>,
}

/// The persisted record entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub record_scope: RecordScope,
    pub discipline_code: String,
    pub gender: Gender,
    pub pool_length: PoolLength,
    pub timing: Timing,
    pub time_millis: u64,
    pub athlete_name: Option<String>,
    pub nation: Option<String>,
    pub club: Option<String>,
    pub meet_name: Option<String>,
    pub city: Option<String>,
    pub record_date: Option<NaiveDate>,
    pub source_url: String,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            record_scope: self.record_scope,
            discipline_code: self.discipline_code.clone(),
            gender: self.gender,
            pool_length: self.pool_length,
            timing: self.timing,
        }
    }
}

/// A stored record as returned by the listing API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub record: CanonicalRecord,
    /// Display form of `time_millis`, e.g. `1:05.32`
    pub time_display: String,
    pub created_at: DateTime<Utc>,
}

/// Optional filters for listing stored records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    pub scope: Option<RecordScope>,
    pub pool: Option<u16>,
    pub gender: Option<String>,
    pub disc: Option<String>,
    pub limit: Option<u32>,
}
