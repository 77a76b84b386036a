//! Batched, idempotent record persistence

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::UpsertError;
use crate::models::{CanonicalRecord, RecordKey};

/// Result of writing one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows inserted or replaced
    pub written: usize,
    /// Rows that did not exist before the batch
    pub inserted: usize,
}

/// Storage that can insert-or-replace records on their natural key.
///
/// A batch is applied atomically: either every record in it is written or
/// none is.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_batch(&self, batch: &[CanonicalRecord]) -> Result<BatchOutcome, UpsertError>;
}

/// Aggregate result of one `upsert` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub written: usize,
    pub inserted: usize,
    /// Records in batches the store rejected
    pub failed: usize,
    /// Candidates replaced by a later candidate with the same key
    pub deduplicated: usize,
    pub batches: usize,
    pub first_error: Option<String>,
}

pub struct UpsertSink {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
    max_in_flight: usize,
}

impl UpsertSink {
    pub fn new(store: Arc<dyn RecordStore>, batch_size: usize, max_in_flight: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Write records in batches.
    ///
    /// Records sharing a key are collapsed first (the later one wins, at the
    /// position of the first), so no two batches touch the same key and they
    /// can be dispatched concurrently. A rejected batch does not stop the
    /// remaining ones; its error is kept if it is the first.
    pub async fn upsert(&self, records: Vec<CanonicalRecord>) -> UpsertReport {
        let (records, deduplicated) = dedupe_by_key(records);
        let mut report = UpsertReport {
            deduplicated,
            ..Default::default()
        };
        if records.is_empty() {
            return report;
        }

        let batches: Vec<Vec<CanonicalRecord>> = records
            .chunks(self.batch_size)
            .map(<[CanonicalRecord]>::to_vec)
            .collect();
        report.batches = batches.len();

        let results: Vec<(usize, usize, Result<BatchOutcome, UpsertError>)> =
            stream::iter(batches.into_iter().enumerate().map(|(idx, batch)| {
                let store = Arc::clone(&self.store);
                async move {
                    let result = store.upsert_batch(&batch).await;
                    (idx, batch.len(), result)
                }
            }))
            .buffered(self.max_in_flight)
            .collect()
            .await;

        for (idx, len, result) in results {
            match result {
                Ok(outcome) => {
                    debug!(
                        "Batch {} written ({} rows, {} new)",
                        idx, outcome.written, outcome.inserted
                    );
                    report.written += outcome.written;
                    report.inserted += outcome.inserted;
                }
                Err(e) => {
                    warn!("Batch {} of {} records rejected: {}", idx, len, e);
                    report.failed += len;
                    if report.first_error.is_none() {
                        report.first_error = Some(e.to_string());
                    }
                }
            }
        }

        report
    }
}

/// Collapse records with equal keys, keeping the last value in first position.
fn dedupe_by_key(records: Vec<CanonicalRecord>) -> (Vec<CanonicalRecord>, usize) {
    let mut positions: HashMap<RecordKey, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
    let mut replaced = 0;

    for record in records {
        match positions.get(&record.key()) {
            Some(&pos) => {
                unique[pos] = record;
                replaced += 1;
            }
            None => {
                positions.insert(record.key(), unique.len());
                unique.push(record);
            }
        }
    }

    (unique, replaced)
}
