use anyhow::Result;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, trace, warn};

use super::orchestrator::{SyncOrchestrator, SyncRequest};
use crate::database::Database;
use crate::errors::SyncError;

/// Runs the sync on a cron schedule inside the server process.
pub struct SchedulerService {
    orchestrator: SyncOrchestrator,
    database: Database,
    schedule: Schedule,
    expression: String,
    run_missed_immediately: bool,
}

impl SchedulerService {
    pub fn new(
        orchestrator: SyncOrchestrator,
        database: Database,
        expression: &str,
        run_missed_immediately: bool,
    ) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .map_err(|e| anyhow::anyhow!("Invalid sync schedule '{}': {}", expression, e))?;

        Ok(Self {
            orchestrator,
            database,
            schedule,
            expression: expression.to_string(),
            run_missed_immediately,
        })
    }

    pub async fn start(self) -> Result<()> {
        info!("Starting sync scheduler (cron: {})", self.expression);

        let last_run = match self.database.last_run_finished_at().await {
            Ok(last) => last,
            Err(e) => {
                warn!("Could not read last sync run time: {}", e);
                None
            }
        };

        if self.run_missed_immediately && is_due(&self.schedule, last_run, Utc::now()) {
            match last_run {
                Some(last) => info!(
                    "Sync missed a scheduled run since {} - running immediately",
                    last.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => info!("No previous sync run recorded - running immediately"),
            }
            self.run_once().await;
        }

        let mut next_run = self.log_next_run();
        let mut interval = interval(Duration::from_secs(1));

        loop {
            interval.tick().await;
            trace!("Scheduler tick");

            let now = Utc::now();
            if next_run.map_or(false, |due| now >= due) {
                self.run_once().await;
                next_run = self.log_next_run();
            }
        }
    }

    async fn run_once(&self) {
        match self.orchestrator.run(SyncRequest::scheduled()).await {
            Ok(summary) if summary.ok => debug!(
                "Scheduled sync {} completed with {} upserts",
                summary.run_id, summary.upserts
            ),
            Ok(summary) => error!(
                "Scheduled sync {} could not reach any source ({} errors)",
                summary.run_id,
                summary.errors.len()
            ),
            Err(SyncError::AlreadyRunning) => {
                info!("Skipping scheduled sync, another run is in progress")
            }
            Err(e) => error!("Scheduled sync failed: {}", e),
        }
    }

    fn log_next_run(&self) -> Option<DateTime<Utc>> {
        let next = self.schedule.upcoming(Utc).next();
        match next {
            Some(time) => info!(
                "Next scheduled sync: {}",
                time.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => warn!("Sync schedule '{}' has no upcoming runs", self.expression),
        }
        next
    }
}

/// Whether a run is owed: the first scheduled time after the last run has
/// passed, or there never was a run.
pub fn is_due(schedule: &Schedule, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_run {
        Some(last) => schedule.after(&last).next().map_or(false, |due| now >= due),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn daily_at_three() -> Schedule {
        Schedule::from_str("0 0 3 * * *").unwrap()
    }

    #[test]
    fn test_missed_run_is_due() {
        let last = Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 5).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        assert!(is_due(&daily_at_three(), Some(last), next_day));
    }

    #[test]
    fn test_recent_run_is_not_due() {
        let last = Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 5).unwrap();
        let same_day = Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap();
        assert!(!is_due(&daily_at_three(), Some(last), same_day));
    }

    #[test]
    fn test_never_run_is_due() {
        assert!(is_due(&daily_at_three(), None, Utc::now()));
    }
}
