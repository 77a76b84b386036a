use std::sync::Arc;

use lsranks_sync::config::{Config, DatabaseConfig};
use lsranks_sync::database::Database;
use lsranks_sync::errors::FetchError;
use lsranks_sync::ingestor::{SyncOrchestrator, SyncRequest, SyncStateManager};
use lsranks_sync::models::{Gender, PoolLength, RecordFilter, SyncPhase, Timing};
use lsranks_sync::sources::StaticFetcher;

const SOURCE_A: &str = "https://a.example/records/world";
const SOURCE_B: &str = "https://b.example/records/world";

const TWO_TABLES: &str = r#"
<html><body>
  <h2>Open – Women</h2>
  <table>
    <thead><tr><th>Event</th><th>Athlete</th><th>Date</th><th>Time</th></tr></thead>
    <tbody>
      <tr><td>Open - 100m Rescue Medley - Women</td><td>Jane Doe</td><td>01-01-2020</td><td>1:05.32</td></tr>
    </tbody>
  </table>

  <h2>Open – Men</h2>
  <table>
    <thead><tr><th>Event</th><th>Athlete</th><th>Date</th><th>Time</th></tr></thead>
    <tbody>
      <tr><td>Open - 50m Manikin Carry - Men</td><td>John Roe</td><td>02-02-2021</td><td>--</td></tr>
    </tbody>
  </table>
</body></html>
"#;

const NO_TIME_COLUMN: &str = r#"
<h2>Open – Men</h2>
<table>
  <tr><th>Event</th><th>Athlete</th><th>Nation</th><th>Date</th></tr>
  <tr><td>200m Obstacle Swim</td><td>John Roe</td><td>ITA</td><td>14-09-2018</td></tr>
  <tr><td>100m Manikin Tow with Fins</td><td>Max Muster</td><td>GER</td><td>2019-07-01</td></tr>
</table>
"#;

async fn memory_database() -> Database {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
    })
    .await
    .unwrap();
    database.migrate().await.unwrap();
    database
}

fn config(sources: &[&str]) -> Config {
    let mut config = Config::default();
    config.sync.sources = sources.join("\n");
    config.auth.sync_secret = Some("test-secret".to_string());
    config
}

fn orchestrator(config: Config, fetcher: StaticFetcher, database: &Database) -> SyncOrchestrator {
    SyncOrchestrator::new(
        config,
        Arc::new(fetcher),
        Arc::new(database.clone()),
        SyncStateManager::new(),
    )
    .with_run_log(Arc::new(database.clone()))
}

#[tokio::test]
async fn test_end_to_end_two_table_fixture() {
    let database = memory_database().await;
    let sync = orchestrator(
        config(&[SOURCE_A]),
        StaticFetcher::new().with_page(SOURCE_A, TWO_TABLES),
        &database,
    );

    let summary = sync.run(SyncRequest::cli(false)).await.unwrap();
    assert!(summary.ok);
    assert_eq!(summary.phase, SyncPhase::Reported);
    assert_eq!(summary.tables_found, 2);
    assert_eq!(summary.parsed_rows, 2);
    assert_eq!(summary.upserts, 1);
    assert_eq!(summary.skipped.no_time, 1);
    assert!(summary.errors.is_empty());

    let records = database.list_records(&RecordFilter::default()).await.unwrap();
    assert_eq!(records.len(), 1);

    let stored = &records[0];
    assert_eq!(stored.record.time_millis, 65_320);
    assert_eq!(stored.record.gender, Gender::Female);
    assert_eq!(stored.record.discipline_code, "100_MEDLEY");
    assert_eq!(stored.record.pool_length, PoolLength::Long);
    assert_eq!(stored.record.timing, Timing::Electronic);
    assert_eq!(stored.record.athlete_name.as_deref(), Some("Jane Doe"));
    assert_eq!(stored.record.source_url, SOURCE_A);
    assert_eq!(stored.time_display, "1:05.32");

    let runs = database.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, summary.run_id);
    assert_eq!(runs[0].trigger, "cli");
}

#[tokio::test]
async fn test_repeated_run_does_not_duplicate_records() {
    let database = memory_database().await;
    let sync = orchestrator(
        config(&[SOURCE_A]),
        StaticFetcher::new().with_page(SOURCE_A, TWO_TABLES),
        &database,
    );

    let first = sync.run(SyncRequest::cli(false)).await.unwrap();
    let second = sync.run(SyncRequest::cli(false)).await.unwrap();

    assert_eq!(first.inserted, 1);
    assert_eq!(second.upserts, 1);
    assert_eq!(second.inserted, 0);
    assert_eq!(database.count_records().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_source_does_not_abort_run() {
    let database = memory_database().await;
    let sync = orchestrator(
        config(&[SOURCE_A, SOURCE_B]),
        StaticFetcher::new()
            .with_error(
                SOURCE_A,
                FetchError::Transport {
                    url: SOURCE_A.to_string(),
                    message: "connection refused".to_string(),
                },
            )
            .with_page(SOURCE_B, TWO_TABLES),
        &database,
    );

    let summary = sync.run(SyncRequest::scheduled()).await.unwrap();
    assert!(summary.ok);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].url, SOURCE_A);
    assert_eq!(summary.errors[0].stage, "fetch");
    assert_eq!(summary.upserts, 1);

    assert_eq!(summary.sources.len(), 2);
    assert!(!summary.sources[0].fetched);
    assert!(summary.sources[1].fetched);

    let records = database.list_records(&RecordFilter::default()).await.unwrap();
    assert_eq!(records[0].record.source_url, SOURCE_B);
}

#[tokio::test]
async fn test_table_without_time_column_stores_nothing() {
    let database = memory_database().await;
    let sync = orchestrator(
        config(&[SOURCE_A]),
        StaticFetcher::new().with_page(SOURCE_A, NO_TIME_COLUMN),
        &database,
    );

    let summary = sync.run(SyncRequest::cli(false)).await.unwrap();
    assert_eq!(summary.parsed_rows, 2);
    assert_eq!(summary.skipped.no_time, 2);
    assert_eq!(summary.upserts, 0);
    assert_eq!(database.count_records().await.unwrap(), 0);
}

#[tokio::test]
async fn test_debug_request_includes_samples() {
    let database = memory_database().await;
    let sync = orchestrator(
        config(&[SOURCE_A]),
        StaticFetcher::new().with_page(SOURCE_A, TWO_TABLES),
        &database,
    );

    let summary = sync.run(SyncRequest::cli(true)).await.unwrap();
    let samples = summary.samples.expect("samples requested");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].discipline_code, "100_MEDLEY");

    let json = serde_json::to_value(&sync.run(SyncRequest::cli(false)).await.unwrap()).unwrap();
    assert!(json.get("samples").is_none());
    assert_eq!(json["skipped"]["noTime"], 1);
}
