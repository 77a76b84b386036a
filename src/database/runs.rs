use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::records::parse_stored_datetime;
use super::{decode_error, Database};
use crate::ingestor::orchestrator::SyncRunLog;
use crate::models::{SyncRunRecord, SyncSummary};
use crate::utils::DateTimeParser;

impl Database {
    pub async fn save_run(&self, summary: &SyncSummary) -> Result<(), sqlx::Error> {
        let payload =
            serde_json::to_string(summary).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, trigger_kind, ok, tables_found, parsed_rows, upserts,
                source_failures, summary, started_at, finished_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(summary.run_id.to_string())
        .bind(summary.trigger.as_str())
        .bind(summary.ok)
        .bind(summary.tables_found as i64)
        .bind(summary.parsed_rows as i64)
        .bind(summary.upserts as i64)
        .bind(summary.errors.len() as i64)
        .bind(payload)
        .bind(DateTimeParser::format_for_storage(&summary.started_at))
        .bind(DateTimeParser::format_for_storage(&summary.finished_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent runs first
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<SyncRunRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, trigger_kind, ok, tables_found, parsed_rows, upserts,
                   source_failures, summary, started_at, finished_at
            FROM sync_runs
            ORDER BY finished_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit.max(1)))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_run).collect()
    }

    pub async fn last_run_finished_at(&self) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let raw: Option<String> = sqlx::query_scalar("SELECT MAX(finished_at) FROM sync_runs")
            .fetch_one(&self.pool)
            .await?;

        raw.map(|value| {
            DateTimeParser::parse_flexible(&value).map_err(|e| decode_error("finished_at", e))
        })
        .transpose()
    }
}

#[async_trait]
impl SyncRunLog for Database {
    async fn record_run(&self, summary: &SyncSummary) -> Result<(), sqlx::Error> {
        self.save_run(summary).await
    }
}

fn row_to_run(row: &SqliteRow) -> Result<SyncRunRecord, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let summary: String = row.try_get("summary")?;

    Ok(SyncRunRecord {
        id: Uuid::parse_str(&id).map_err(|e| decode_error("id", e))?,
        trigger: row.try_get("trigger_kind")?,
        ok: row.try_get("ok")?,
        tables_found: row.try_get("tables_found")?,
        parsed_rows: row.try_get("parsed_rows")?,
        upserts: row.try_get("upserts")?,
        source_failures: row.try_get("source_failures")?,
        started_at: parse_stored_datetime(row, "started_at")?,
        finished_at: parse_stored_datetime(row, "finished_at")?,
        summary: serde_json::from_str(&summary).map_err(|e| decode_error("summary", e))?,
    })
}
