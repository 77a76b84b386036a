use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::errors::SyncError;
use crate::models::*;

pub type ProgressSender = broadcast::Sender<SyncProgress>;
pub type ProgressReceiver = broadcast::Receiver<SyncProgress>;

/// Tracks the current sync run and guarantees only one runs at a time.
#[derive(Clone)]
pub struct SyncStateManager {
    current: Arc<RwLock<Option<SyncProgress>>>,
    run_lock: Arc<Mutex<()>>,
    progress_tx: ProgressSender,
}

/// Held for the duration of a run; dropping it lets the next run start.
#[derive(Debug)]
pub struct SyncRunGuard {
    pub run_id: Uuid,
    _lock: OwnedMutexGuard<()>,
}

impl SyncStateManager {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            current: Arc::new(RwLock::new(None)),
            run_lock: Arc::new(Mutex::new(())),
            progress_tx,
        }
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.progress_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Claim the run slot, or fail with `AlreadyRunning`.
    pub async fn begin_run(
        &self,
        trigger: SyncTrigger,
        sources_total: usize,
    ) -> Result<SyncRunGuard, SyncError> {
        let lock = Arc::clone(&self.run_lock)
            .try_lock_owned()
            .map_err(|_| SyncError::AlreadyRunning)?;

        let now = Utc::now();
        let progress = SyncProgress {
            run_id: Uuid::new_v4(),
            trigger,
            phase: SyncPhase::Idle,
            current_source: None,
            sources_total,
            sources_done: 0,
            tables_found: 0,
            parsed_rows: 0,
            upserts: 0,
            started_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        };
        let run_id = progress.run_id;
        self.publish(progress).await;

        Ok(SyncRunGuard {
            run_id,
            _lock: lock,
        })
    }

    pub async fn set_phase(&self, phase: SyncPhase, current_source: Option<&str>) {
        self.modify(|p| {
            p.phase = phase;
            if let Some(url) = current_source {
                p.current_source = Some(url.to_string());
            }
        })
        .await;
    }

    /// Add one finished source's counters.
    pub async fn source_done(&self, tables_found: usize, parsed_rows: usize, upserts: usize) {
        self.modify(|p| {
            p.sources_done += 1;
            p.tables_found += tables_found;
            p.parsed_rows += parsed_rows;
            p.upserts += upserts;
        })
        .await;
    }

    pub async fn finish(&self, phase: SyncPhase, error: Option<String>) {
        self.modify(|p| {
            p.phase = phase;
            p.current_source = None;
            p.completed_at = Some(Utc::now());
            p.error = error;
        })
        .await;
    }

    /// Progress of the current run, or of the last one when idle.
    pub async fn current(&self) -> Option<SyncProgress> {
        self.current.read().await.clone()
    }

    async fn modify<F>(&self, update: F)
    where
        F: FnOnce(&mut SyncProgress),
    {
        let updated = {
            let mut current = self.current.write().await;
            match current.as_mut() {
                Some(progress) => {
                    update(progress);
                    progress.updated_at = Utc::now();
                    Some(progress.clone())
                }
                None => None,
            }
        };

        if let Some(progress) = updated {
            let _ = self.progress_tx.send(progress);
        }
    }

    async fn publish(&self, progress: SyncProgress) {
        *self.current.write().await = Some(progress.clone());
        let _ = self.progress_tx.send(progress);
    }
}

impl Default for SyncStateManager {
    fn default() -> Self {
        Self::new()
    }
}
