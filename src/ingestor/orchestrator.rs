//! Sync run orchestration
//!
//! A run walks every configured source in order: fetch, extract, validate,
//! upsert. Per-source failures are recorded in the summary and never abort
//! the run; only configuration and authorisation problems stop it before the
//! first fetch. The summary is produced once, after every source was tried.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use super::extractor::RecordExtractor;
use super::sink::{RecordStore, UpsertSink};
use super::state_manager::SyncStateManager;
use super::validator::RecordValidator;
use crate::config::{Config, SyncSettings};
use crate::errors::{ConfigError, SyncError};
use crate::models::*;
use crate::sources::MarkupFetcher;

/// Persists finished run summaries.
#[async_trait]
pub trait SyncRunLog: Send + Sync {
    async fn record_run(&self, summary: &SyncSummary) -> Result<(), sqlx::Error>;
}

/// How a run was requested.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub trigger: SyncTrigger,
    /// Secret presented by an HTTP caller
    pub credential: Option<String>,
    /// Include sample payloads in the summary
    pub debug: bool,
}

impl SyncRequest {
    pub fn http(credential: Option<String>, debug: bool) -> Self {
        Self {
            trigger: SyncTrigger::Http,
            credential,
            debug,
        }
    }

    pub fn scheduled() -> Self {
        Self {
            trigger: SyncTrigger::Scheduler,
            credential: None,
            debug: false,
        }
    }

    pub fn cli(debug: bool) -> Self {
        Self {
            trigger: SyncTrigger::Cli,
            credential: None,
            debug,
        }
    }
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    config: Arc<Config>,
    fetcher: Arc<dyn MarkupFetcher>,
    store: Arc<dyn RecordStore>,
    run_log: Option<Arc<dyn SyncRunLog>>,
    state: SyncStateManager,
}

/// What one source contributed to a run
struct SourceOutcome {
    report: SourceReport,
    failure: Option<SourceFailure>,
    upsert_error: Option<String>,
    samples: Vec<CanonicalRecord>,
}

impl SyncOrchestrator {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn MarkupFetcher>,
        store: Arc<dyn RecordStore>,
        state: SyncStateManager,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            store,
            run_log: None,
            state,
        }
    }

    pub fn with_run_log(mut self, run_log: Arc<dyn SyncRunLog>) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn state(&self) -> &SyncStateManager {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute one sync run and return its summary.
    ///
    /// Fails before fetching anything when the configuration is incomplete,
    /// an HTTP caller presents the wrong secret, or another run is active.
    /// A run in which no source could be fetched still returns a summary,
    /// with `ok == false` and phase `Failed`.
    pub async fn run(&self, request: SyncRequest) -> Result<SyncSummary, SyncError> {
        self.authorize(&request)?;
        let settings = SyncSettings::from_config(&self.config)?;

        let guard = self
            .state
            .begin_run(request.trigger, settings.sources.len())
            .await?;
        let run_id = guard.run_id;
        let started_at = Utc::now();
        info!(
            "Sync run {} started ({} trigger, {} sources)",
            run_id,
            request.trigger.as_str(),
            settings.sources.len()
        );

        let extractor = RecordExtractor::default();
        let validator = RecordValidator::new(settings.strict_gender);
        let sink = UpsertSink::new(
            Arc::clone(&self.store),
            settings.batch_size,
            settings.max_in_flight_batches,
        );
        let sample_size = if request.debug || settings.debug_samples {
            settings.sample_size
        } else {
            0
        };

        let mut summary = SyncSummary {
            ok: false,
            run_id,
            trigger: request.trigger,
            phase: SyncPhase::Fetching,
            tables_found: 0,
            parsed_rows: 0,
            upserts: 0,
            inserted: 0,
            upsert_failed: 0,
            skipped: SkipCounts::default(),
            errors: Vec::new(),
            first_upsert_error: None,
            sources: Vec::with_capacity(settings.sources.len()),
            samples: None,
            started_at,
            finished_at: started_at,
        };
        let mut samples: Vec<CanonicalRecord> = Vec::new();

        for url in &settings.sources {
            let remaining_samples = sample_size.saturating_sub(samples.len());
            let outcome = self
                .sync_source(url, &extractor, &validator, &sink, remaining_samples)
                .await;

            let report = outcome.report;
            summary.tables_found += report.tables_found;
            summary.parsed_rows += report.parsed_rows;
            summary.upserts += report.upserts;
            summary.inserted += report.inserted;
            summary.upsert_failed += report.upsert_failed;
            summary.skipped.merge(&report.skipped);
            summary.ok |= report.fetched;
            if summary.first_upsert_error.is_none() {
                summary.first_upsert_error = outcome.upsert_error;
            }
            summary.errors.extend(outcome.failure);
            samples.extend(outcome.samples);
            summary.sources.push(report);
        }

        let run_error = if summary.ok {
            summary.phase = SyncPhase::Reported;
            None
        } else {
            summary.phase = SyncPhase::Failed;
            Some(format!(
                "none of the {} configured sources could be fetched",
                settings.sources.len()
            ))
        };
        if sample_size > 0 {
            summary.samples = Some(samples);
        }
        summary.finished_at = Utc::now();

        if let Some(run_log) = &self.run_log {
            if let Err(e) = run_log.record_run(&summary).await {
                warn!("Failed to store summary of sync run {}: {}", run_id, e);
            }
        }

        self.state.finish(summary.phase, run_error.clone()).await;
        drop(guard);

        match run_error {
            None => info!(
                "Sync run {} finished in {}ms: {} tables, {} rows parsed, {} upserts ({} new), {} skipped, {} source errors",
                run_id,
                (summary.finished_at - started_at).num_milliseconds(),
                summary.tables_found,
                summary.parsed_rows,
                summary.upserts,
                summary.inserted,
                summary.skipped.total(),
                summary.errors.len()
            ),
            Some(message) => error!("Sync run {} failed: {}", run_id, message),
        }

        Ok(summary)
    }

    /// HTTP callers must present the configured secret. Other triggers run
    /// in-process and are trusted.
    fn authorize(&self, request: &SyncRequest) -> Result<(), SyncError> {
        if request.trigger != SyncTrigger::Http {
            return Ok(());
        }

        let secret = self.config.auth.secret().ok_or(ConfigError::MissingSecret)?;

        match request.credential.as_deref() {
            Some(presented) if constant_time_eq(presented.as_bytes(), secret.as_bytes()) => Ok(()),
            _ => {
                warn!("Rejected sync trigger with missing or invalid credential");
                Err(SyncError::Unauthorized)
            }
        }
    }

    async fn sync_source(
        &self,
        url: &str,
        extractor: &RecordExtractor,
        validator: &RecordValidator,
        sink: &UpsertSink,
        sample_limit: usize,
    ) -> SourceOutcome {
        let mut outcome = SourceOutcome {
            report: SourceReport {
                url: url.to_string(),
                ..Default::default()
            },
            failure: None,
            upsert_error: None,
            samples: Vec::new(),
        };

        self.state.set_phase(SyncPhase::Fetching, Some(url)).await;
        let markup = match self.fetcher.fetch(url).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Skipping source {}: {}", url, e);
                outcome.report.error = Some(e.to_string());
                outcome.failure = Some(SourceFailure {
                    url: url.to_string(),
                    stage: "fetch".to_string(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                self.state.source_done(0, 0, 0).await;
                return outcome;
            }
        };
        outcome.report.fetched = true;

        self.state.set_phase(SyncPhase::Extracting, None).await;
        let extraction = extractor.extract(&markup, url);
        let stats = extraction.stats.clone();
        outcome.report.tables_found = stats.tables_found;
        outcome.report.parsed_rows = stats.parsed_rows;
        outcome.report.skipped = stats.skipped;
        debug!(
            "Extracted {} candidates from {} ({} tables, {} unusable)",
            extraction.candidates.len(),
            url,
            stats.tables_found,
            stats.tables_skipped
        );

        self.state.set_phase(SyncPhase::Validating, None).await;
        let mut accepted = Vec::with_capacity(extraction.candidates.len());
        for candidate in extraction {
            match validator.validate(candidate) {
                Ok(record) => {
                    if !record.gender.is_known() {
                        outcome.report.skipped.unknown_gender += 1;
                    }
                    accepted.push(record);
                }
                Err(reason) => {
                    trace!("Skipped candidate from {}: {}", url, reason.as_str());
                    outcome.report.skipped.record(reason);
                }
            }
        }
        outcome.samples = accepted.iter().take(sample_limit).cloned().collect();

        self.state.set_phase(SyncPhase::Upserting, None).await;
        let upsert = sink.upsert(accepted).await;
        outcome.report.upserts = upsert.written;
        outcome.report.inserted = upsert.inserted;
        outcome.report.upsert_failed = upsert.failed;

        if upsert.failed > 0 {
            let message = upsert
                .first_error
                .clone()
                .unwrap_or_else(|| "batch rejected".to_string());
            outcome.report.error = Some(message.clone());
            outcome.failure = Some(SourceFailure {
                url: url.to_string(),
                stage: "upsert".to_string(),
                kind: "store".to_string(),
                message,
            });
            outcome.upsert_error = upsert.first_error;
        }

        info!(
            "Source {}: {} tables, {} rows, {} upserts, {} skipped",
            url,
            outcome.report.tables_found,
            outcome.report.parsed_rows,
            outcome.report.upserts,
            outcome.report.skipped.total()
        );
        self.state
            .source_done(
                outcome.report.tables_found,
                outcome.report.parsed_rows,
                outcome.report.upserts,
            )
            .await;

        outcome
    }
}

/// Compare secrets without short-circuiting on the first mismatching byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{FetchError, UpsertError};
    use crate::ingestor::sink::BatchOutcome;
    use crate::sources::StaticFetcher;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PAGE: &str = r#"
        <h2>Open - Women</h2>
        <table>
          <tr><th>Event</th><th>Athlete</th><th>Date</th><th>Time</th></tr>
          <tr><td>100m Rescue Medley</td><td>Jane Doe (AUS)</td><td>01-01-2020</td><td>1:05.32</td></tr>
          <tr><td>50m Manikin Carry</td><td>Ann Smith</td><td>02-02-2021</td><td>--</td></tr>
        </table>
    "#;

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<RecordKey, CanonicalRecord>>,
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn upsert_batch(&self, batch: &[CanonicalRecord]) -> Result<BatchOutcome, UpsertError> {
            let mut rows = self.rows.lock().unwrap();
            let mut inserted = 0;
            for record in batch {
                if rows.insert(record.key(), record.clone()).is_none() {
                    inserted += 1;
                }
            }
            Ok(BatchOutcome {
                written: batch.len(),
                inserted,
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn upsert_batch(&self, _batch: &[CanonicalRecord]) -> Result<BatchOutcome, UpsertError> {
            Err(UpsertError::BatchRejected {
                batch: 0,
                message: "disk full".to_string(),
            })
        }
    }

    fn config(sources: &str) -> Config {
        let mut config = Config::default();
        config.sync.sources = sources.to_string();
        config.auth.sync_secret = Some("s3cret".to_string());
        config
    }

    fn orchestrator(config: Config, fetcher: StaticFetcher, store: Arc<dyn RecordStore>) -> SyncOrchestrator {
        SyncOrchestrator::new(config, Arc::new(fetcher), store, SyncStateManager::new())
    }

    #[tokio::test]
    async fn test_run_processes_source_and_counts_skips() {
        let store = Arc::new(MemoryStore::default());
        let sync = orchestrator(
            config("https://a.example/wr"),
            StaticFetcher::new().with_page("https://a.example/wr", PAGE),
            store.clone(),
        );

        let summary = sync.run(SyncRequest::cli(false)).await.unwrap();
        assert!(summary.ok);
        assert_eq!(summary.phase, SyncPhase::Reported);
        assert_eq!(summary.tables_found, 1);
        assert_eq!(summary.parsed_rows, 2);
        assert_eq!(summary.upserts, 1);
        assert_eq!(summary.skipped.no_time, 1);
        assert!(summary.samples.is_none());

        let rows = store.rows.lock().unwrap();
        let record = rows.values().next().unwrap();
        assert_eq!(record.discipline_code, "100_MEDLEY");
        assert_eq!(record.gender, Gender::Female);
        assert_eq!(record.nation.as_deref(), Some("AUS"));
        assert_eq!(record.time_millis, 65_320);
    }

    #[tokio::test]
    async fn test_http_trigger_requires_matching_secret() {
        let sync = orchestrator(
            config("https://a.example/wr"),
            StaticFetcher::new().with_page("https://a.example/wr", PAGE),
            Arc::new(MemoryStore::default()),
        );

        assert!(matches!(
            sync.run(SyncRequest::http(Some("wrong".into()), false)).await,
            Err(SyncError::Unauthorized)
        ));
        assert!(matches!(
            sync.run(SyncRequest::http(None, false)).await,
            Err(SyncError::Unauthorized)
        ));

        let summary = sync
            .run(SyncRequest::http(Some("s3cret".into()), true))
            .await
            .unwrap();
        assert_eq!(summary.samples.map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn test_http_trigger_with_blank_secret_is_a_config_error() {
        let mut config = config("https://a.example/wr");
        config.auth.sync_secret = Some("  ".to_string());
        let sync = orchestrator(config, StaticFetcher::new(), Arc::new(MemoryStore::default()));

        assert!(matches!(
            sync.run(SyncRequest::http(Some("  ".into()), false)).await,
            Err(SyncError::Config(ConfigError::MissingSecret))
        ));
    }

    #[tokio::test]
    async fn test_http_trigger_without_configured_secret_is_a_config_error() {
        let mut config = config("https://a.example/wr");
        config.auth.sync_secret = None;
        let sync = orchestrator(config, StaticFetcher::new(), Arc::new(MemoryStore::default()));

        assert!(matches!(
            sync.run(SyncRequest::http(Some("anything".into()), false)).await,
            Err(SyncError::Config(ConfigError::MissingSecret))
        ));
        // In-process triggers do not need the secret
        assert!(sync.run(SyncRequest::scheduled()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_sources_fail_before_fetching() {
        let sync = orchestrator(config(""), StaticFetcher::new(), Arc::new(MemoryStore::default()));
        assert!(matches!(
            sync.run(SyncRequest::cli(false)).await,
            Err(SyncError::Config(ConfigError::MissingSources))
        ));
        assert!(sync.state().current().await.is_none());
    }

    #[tokio::test]
    async fn test_all_sources_failing_marks_run_failed() {
        let sync = orchestrator(
            config("https://a.example/wr,https://b.example/wr"),
            StaticFetcher::new().with_error(
                "https://a.example/wr",
                FetchError::Timeout {
                    url: "https://a.example/wr".into(),
                },
            ),
            Arc::new(MemoryStore::default()),
        );

        let summary = sync.run(SyncRequest::cli(false)).await.unwrap();
        assert!(!summary.ok);
        assert_eq!(summary.phase, SyncPhase::Failed);
        assert_eq!(summary.errors.len(), 2);
        assert_eq!(summary.errors[0].kind, "timeout");
        assert_eq!(summary.errors[1].kind, "http");

        let progress = sync.state().current().await.unwrap();
        assert_eq!(progress.phase, SyncPhase::Failed);
        assert_eq!(progress.sources_done, 2);
        assert!(progress.error.is_some());
    }

    #[tokio::test]
    async fn test_upsert_failures_are_reported_without_failing_the_run() {
        let sync = orchestrator(
            config("https://a.example/wr"),
            StaticFetcher::new().with_page("https://a.example/wr", PAGE),
            Arc::new(FailingStore),
        );

        let summary = sync.run(SyncRequest::cli(false)).await.unwrap();
        assert!(summary.ok);
        assert_eq!(summary.upserts, 0);
        assert_eq!(summary.upsert_failed, 1);
        assert_eq!(summary.errors[0].stage, "upsert");
        assert!(summary.first_upsert_error.unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let sync = orchestrator(
            config("https://a.example/wr"),
            StaticFetcher::new().with_page("https://a.example/wr", PAGE),
            Arc::new(MemoryStore::default()),
        );

        let _held = sync.state().begin_run(SyncTrigger::Cli, 1).await.unwrap();
        assert!(matches!(
            sync.run(SyncRequest::scheduled()).await,
            Err(SyncError::AlreadyRunning)
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
