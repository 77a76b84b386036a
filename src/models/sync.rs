use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CanonicalRecord;

/// Why a parsed row did not become a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NoDiscipline,
    NoTime,
    NoGender,
    /// Fewer populated cells than a record needs
    ShortRow,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoDiscipline => "noDiscipline",
            SkipReason::NoTime => "noTime",
            SkipReason::NoGender => "noGender",
            SkipReason::ShortRow => "shortRow",
        }
    }
}

/// Skip counters by reason. `unknown_gender` counts rows that were accepted
/// without a detected gender (lenient policy) and is a warning, not a skip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipCounts {
    pub no_time: usize,
    pub no_discipline: usize,
    pub no_gender: usize,
    pub short_row: usize,
    pub unknown_gender: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NoDiscipline => self.no_discipline += 1,
            SkipReason::NoTime => self.no_time += 1,
            SkipReason::NoGender => self.no_gender += 1,
            SkipReason::ShortRow => self.short_row += 1,
        }
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        self.no_time += other.no_time;
        self.no_discipline += other.no_discipline;
        self.no_gender += other.no_gender;
        self.short_row += other.short_row;
        self.unknown_gender += other.unknown_gender;
    }

    /// Rows that were dropped (warnings excluded)
    pub fn total(&self) -> usize {
        self.no_time + self.no_discipline + self.no_gender + self.short_row
    }
}

/// Phases of a sync run. `Failed` is only reachable from `Fetching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Fetching,
    Extracting,
    Validating,
    Upserting,
    Reported,
    Failed,
}

/// What started a run. Only HTTP triggers carry a credential to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    Http,
    Scheduler,
    Cli,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Http => "http",
            SyncTrigger::Scheduler => "scheduler",
            SyncTrigger::Cli => "cli",
        }
    }
}

/// Live progress of the current (or most recent) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub run_id: Uuid,
    pub trigger: SyncTrigger,
    pub phase: SyncPhase,
    pub current_source: Option<String>,
    pub sources_total: usize,
    pub sources_done: usize,
    pub tables_found: usize,
    pub parsed_rows: usize,
    pub upserts: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Per-source outcome inside a run summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub url: String,
    pub fetched: bool,
    pub tables_found: usize,
    pub parsed_rows: usize,
    pub upserts: usize,
    pub inserted: usize,
    pub upsert_failed: usize,
    pub skipped: SkipCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A failure recorded against a source without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    pub url: String,
    /// `fetch` or `upsert`
    pub stage: String,
    /// Fetch error kind (`timeout`, `http`, ...) or `store`
    pub kind: String,
    pub message: String,
}

/// The single result of a sync run, emitted after every source was attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub ok: bool,
    pub run_id: Uuid,
    pub trigger: SyncTrigger,
    pub phase: SyncPhase,
    pub tables_found: usize,
    pub parsed_rows: usize,
    pub upserts: usize,
    pub inserted: usize,
    pub upsert_failed: usize,
    pub skipped: SkipCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SourceFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_upsert_error: Option<String>,
    pub sources: Vec<SourceReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<CanonicalRecord>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A stored run, as listed by the runs API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunRecord {
    pub id: Uuid,
    pub trigger: String,
    pub ok: bool,
    pub tables_found: i64,
    pub parsed_rows: i64,
    pub upserts: i64,
    pub source_failures: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_counts_serialise_with_reason_names() {
        let mut counts = SkipCounts::default();
        counts.record(SkipReason::NoTime);
        counts.record(SkipReason::NoTime);
        counts.record(SkipReason::NoGender);

        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json["noTime"], 2);
        assert_eq!(json["noGender"], 1);
        assert_eq!(json["noDiscipline"], 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_skip_counts_merge() {
        let mut a = SkipCounts {
            no_time: 1,
            unknown_gender: 2,
            ..Default::default()
        };
        let b = SkipCounts {
            no_time: 3,
            short_row: 1,
            ..Default::default()
        };
        a.merge(&b);

        assert_eq!(a.no_time, 4);
        assert_eq!(a.short_row, 1);
        assert_eq!(a.unknown_gender, 2);
        assert_eq!(a.total(), 5);
    }
}
