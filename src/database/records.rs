use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::debug;

use super::{decode_error, Database};
use crate::errors::UpsertError;
use crate::ingestor::sink::{BatchOutcome, RecordStore};
use crate::models::{
    CanonicalRecord, Gender, PoolLength, RecordFilter, RecordScope, StoredRecord, Timing,
};
use crate::utils::{format_millis, DateTimeParser};

pub const DEFAULT_LIST_LIMIT: u32 = 1000;
pub const MAX_LIST_LIMIT: u32 = 5000;

const UPSERT_SQL: &str = r#"
    INSERT INTO records (
        record_scope, discipline_code, gender, pool_length, timing,
        time_ms, athlete_name, nation, club, meet_name, city, record_date,
        source_url, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (record_scope, discipline_code, gender, pool_length, timing) DO UPDATE SET
        time_ms = excluded.time_ms,
        athlete_name = excluded.athlete_name,
        nation = excluded.nation,
        club = excluded.club,
        meet_name = excluded.meet_name,
        city = excluded.city,
        record_date = excluded.record_date,
        source_url = excluded.source_url,
        updated_at = excluded.updated_at
    RETURNING created_at
"#;

impl Database {
    /// Insert or replace a batch of records inside one transaction.
    pub async fn upsert_records(
        &self,
        batch: &[CanonicalRecord],
    ) -> Result<BatchOutcome, UpsertError> {
        let now = DateTimeParser::format_for_storage(&Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for record in batch {
            let time_ms = i64::try_from(record.time_millis).map_err(|_| {
                UpsertError::BatchRejected {
                    batch: 0,
                    message: format!("time out of range for {}", record.key()),
                }
            })?;

            // An updated row keeps its original created_at
            let created_at: String = sqlx::query_scalar(UPSERT_SQL)
                .bind(record.record_scope.as_str())
                .bind(&record.discipline_code)
                .bind(record.gender.as_str())
                .bind(i64::from(record.pool_length.metres()))
                .bind(record.timing.as_str())
                .bind(time_ms)
                .bind(&record.athlete_name)
                .bind(&record.nation)
                .bind(&record.club)
                .bind(&record.meet_name)
                .bind(&record.city)
                .bind(record.record_date.map(|d| d.format("%Y-%m-%d").to_string()))
                .bind(&record.source_url)
                .bind(&now)
                .bind(DateTimeParser::format_for_storage(&record.updated_at))
                .fetch_one(&mut *tx)
                .await?;
            if created_at == now {
                inserted += 1;
            }
        }

        tx.commit().await?;

        let outcome = BatchOutcome {
            written: batch.len(),
            inserted,
        };
        debug!(
            "Upserted batch of {} records ({} new)",
            outcome.written, outcome.inserted
        );
        Ok(outcome)
    }

    /// List stored records, ordered by discipline, gender and pool length.
    pub async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>, sqlx::Error> {
        let scope = filter.scope.unwrap_or(RecordScope::World);
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, record_scope, discipline_code, gender, pool_length, timing, time_ms, \
             athlete_name, nation, club, meet_name, city, record_date, source_url, \
             created_at, updated_at FROM records WHERE record_scope = ",
        );
        query.push_bind(scope.as_str());

        if let Some(pool) = filter.pool {
            query.push(" AND pool_length = ").push_bind(i64::from(pool));
        }
        if let Some(gender) = filter.gender.as_deref().filter(|g| !g.is_empty()) {
            let gender = Gender::from_code(gender).map_err(sqlx::Error::Protocol)?;
            query.push(" AND gender = ").push_bind(gender.as_str());
        }
        if let Some(disc) = filter.disc.as_deref().filter(|d| !d.is_empty()) {
            query.push(" AND discipline_code = ").push_bind(disc.to_uppercase());
        }

        query
            .push(" ORDER BY discipline_code, gender, pool_length, timing LIMIT ")
            .push_bind(i64::from(limit));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_stored_record).collect()
    }

    pub async fn count_records(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn upsert_batch(&self, batch: &[CanonicalRecord]) -> Result<BatchOutcome, UpsertError> {
        self.upsert_records(batch).await
    }
}

fn row_to_stored_record(row: &SqliteRow) -> Result<StoredRecord, sqlx::Error> {
    let scope: String = row.try_get("record_scope")?;
    let gender: String = row.try_get("gender")?;
    let pool_length: i64 = row.try_get("pool_length")?;
    let timing: String = row.try_get("timing")?;
    let time_ms: i64 = row.try_get("time_ms")?;
    let record_date: Option<String> = row.try_get("record_date")?;

    let pool_length = u16::try_from(pool_length).map_err(|e| decode_error("pool_length", e))?;
    let pool_length =
        PoolLength::try_from(pool_length).map_err(|e| decode_error("pool_length", e))?;
    let time_millis = u64::try_from(time_ms).map_err(|e| decode_error("time_ms", e))?;
    let record_date = record_date
        .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| decode_error("record_date", e))?;

    let record = CanonicalRecord {
        record_scope: scope
            .parse::<RecordScope>()
            .map_err(|e| decode_error("record_scope", e))?,
        discipline_code: row.try_get("discipline_code")?,
        gender: gender
            .parse::<Gender>()
            .map_err(|e| decode_error("gender", e))?,
        pool_length,
        timing: timing
            .parse::<Timing>()
            .map_err(|e| decode_error("timing", e))?,
        time_millis,
        athlete_name: row.try_get("athlete_name")?,
        nation: row.try_get("nation")?,
        club: row.try_get("club")?,
        meet_name: row.try_get("meet_name")?,
        city: row.try_get("city")?,
        record_date,
        source_url: row.try_get("source_url")?,
        updated_at: parse_stored_datetime(row, "updated_at")?,
    };

    Ok(StoredRecord {
        id: row.try_get("id")?,
        time_display: format_millis(record.time_millis),
        created_at: parse_stored_datetime(row, "created_at")?,
        record,
    })
}

pub(crate) fn parse_stored_datetime(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    DateTimeParser::parse_flexible(&raw).map_err(|e| decode_error(column, e))
}
