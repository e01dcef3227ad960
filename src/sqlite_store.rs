//! SQLite-backed [`ChartStore`] implementation.
//!
//! Maps each [`ChartStore`] operation onto the `songs` table created by
//! [`migrate`](crate::migrate). Timestamps are stored as Unix milliseconds.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use chart_harness_core::models::{
    ChartEntry, ChartRecord, ChartSummary, IdentityKey, NewChartRecord, UpsertOutcome,
};
use chart_harness_core::store::ChartStore;

/// Maximum ids bound into a single `DELETE ... IN (...)` statement.
const DELETE_BATCH: usize = 500;

const SELECT_COLUMNS: &str =
    "SELECT id, title, artist, ranking, chart_name, chart_date, created_at FROM songs";

/// SQLite implementation of the [`ChartStore`] trait.
pub struct SqliteChartStore {
    pool: SqlitePool,
}

impl SqliteChartStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {}", ms))
}

fn row_to_record(row: &SqliteRow) -> Result<ChartRecord> {
    let ranking: i64 = row.try_get("ranking")?;
    Ok(ChartRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        ranking: u32::try_from(ranking).map_err(|_| anyhow!("invalid ranking: {}", ranking))?,
        chart_name: row.try_get("chart_name")?,
        chart_date: from_millis(row.try_get("chart_date")?)?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn rows_to_records(rows: &[SqliteRow]) -> Result<Vec<ChartRecord>> {
    rows.iter().map(row_to_record).collect()
}

#[async_trait]
impl ChartStore for SqliteChartStore {
    async fn upsert_entry(&self, entry: &ChartEntry, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        // The UPDATE runs first so the transaction holds the write lock
        // before the identity lookup.
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE songs SET ranking = ?, chart_date = ?
            WHERE id = (
                SELECT id FROM songs
                WHERE title = ? AND artist = ? AND chart_name = ?
                ORDER BY chart_date DESC, id DESC
                LIMIT 1
            )
            RETURNING id
            "#,
        )
        .bind(i64::from(entry.rank))
        .bind(now.timestamp_millis())
        .bind(&entry.title)
        .bind(&entry.artist)
        .bind(&entry.chart_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match updated {
            Some(id) => UpsertOutcome::Updated(id),
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO songs (title, artist, ranking, chart_name, chart_date, created_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&entry.title)
                .bind(&entry.artist)
                .bind(i64::from(entry.rank))
                .bind(&entry.chart_id)
                .bind(now.timestamp_millis())
                .bind(now.timestamp_millis())
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Inserted(result.last_insert_rowid())
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn insert(&self, record: &NewChartRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO songs (title, artist, ranking, chart_name, chart_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.title)
        .bind(&record.artist)
        .bind(i64::from(record.ranking))
        .bind(&record.chart_name)
        .bind(record.chart_date.timestamp_millis())
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<ChartRecord>> {
        let row = sqlx::query(&format!(
            "{} WHERE title = ? AND artist = ? AND chart_name = ? \
             ORDER BY chart_date DESC, id DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(&key.title)
        .bind(&key.artist)
        .bind(&key.chart_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list_all(&self) -> Result<Vec<ChartRecord>> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows_to_records(&rows)
    }

    async fn list_by_chart(&self, chart_name: &str) -> Result<Vec<ChartRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE chart_name = ? ORDER BY ranking ASC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(chart_name)
        .fetch_all(&self.pool)
        .await?;
        rows_to_records(&rows)
    }

    async fn list_by_artist(&self, artist: &str) -> Result<Vec<ChartRecord>> {
        let rows = sqlx::query(&format!("{} WHERE artist = ? ORDER BY id", SELECT_COLUMNS))
            .bind(artist)
            .fetch_all(&self.pool)
            .await?;
        rows_to_records(&rows)
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = 0u64;
        for batch in ids.chunks(DELETE_BATCH) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM songs WHERE id IN (");
            let mut separated = query.separated(", ");
            for id in batch {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            deleted += query.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(deleted)
    }

    async fn delete_by_chart(&self, chart_name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM songs WHERE chart_name = ?")
            .bind(chart_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM songs").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn chart_summaries(&self) -> Result<Vec<ChartSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT chart_name, COUNT(*) AS records, MAX(chart_date) AS latest
            FROM songs
            GROUP BY chart_name
            ORDER BY chart_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let records: i64 = row.try_get("records")?;
                let latest: Option<i64> = row.try_get("latest")?;
                Ok(ChartSummary {
                    chart_name: row.try_get("chart_name")?,
                    records: records as u64,
                    latest_chart_date: latest.map(from_millis).transpose()?,
                })
            })
            .collect()
    }
}
