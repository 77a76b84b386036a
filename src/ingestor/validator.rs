//! Candidate validation

use crate::models::{CanonicalRecord, RecordCandidate, SkipReason};

/// Accepts candidates that carry every mandatory field.
///
/// With `strict_gender` a candidate without a detected gender is rejected;
/// otherwise it is accepted as `unknown` and the caller counts a warning.
#[derive(Debug, Clone, Copy)]
pub struct RecordValidator {
    pub strict_gender: bool,
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self {
            strict_gender: true,
        }
    }
}

impl RecordValidator {
    pub fn new(strict_gender: bool) -> Self {
        Self { strict_gender }
    }

    /// Turn a candidate into a record, or report the first missing field.
    pub fn validate(&self, candidate: RecordCandidate) -> Result<CanonicalRecord, SkipReason> {
        let discipline_code = match candidate.discipline_code {
            Some(code) if !code.is_empty() => code,
            _ => return Err(SkipReason::NoDiscipline),
        };

        let time_millis = match candidate.time_millis {
            Some(ms) if ms > 0 => ms,
            _ => return Err(SkipReason::NoTime),
        };

        if self.strict_gender && !candidate.gender.is_known() {
            return Err(SkipReason::NoGender);
        }

        Ok(CanonicalRecord {
            record_scope: candidate.record_scope,
            discipline_code,
            gender: candidate.gender,
            pool_length: candidate.pool_length,
            timing: candidate.timing,
            time_millis,
            athlete_name: candidate.athlete_name,
            nation: candidate.nation,
            club: candidate.club,
            meet_name: candidate.meet_name,
            city: candidate.city,
            record_date: candidate.record_date,
            source_url: candidate.source_url,
            updated_at: candidate.updated_at,
        })
    }

    pub fn is_valid(&self, candidate: &RecordCandidate) -> bool {
        self.check(candidate).is_ok()
    }

    /// The reason a candidate would be rejected, without consuming it.
    pub fn check(&self, candidate: &RecordCandidate) -> Result<(), SkipReason> {
        if candidate.discipline_code.as_deref().map_or(true, str::is_empty) {
            return Err(SkipReason::NoDiscipline);
        }
        if candidate.time_millis.map_or(true, |ms| ms == 0) {
            return Err(SkipReason::NoTime);
        }
        if self.strict_gender && !candidate.gender.is_known() {
            return Err(SkipReason::NoGender);
        }
        Ok(())
    }
}
