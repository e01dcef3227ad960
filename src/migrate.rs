use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the `songs` and `crawl_locks` tables and their indexes. Safe to
/// run repeatedly.
///
/// The identity key `(title, artist, chart_name)` is indexed but not
/// unique: duplicates are tolerated at write time and collapsed by cleanup.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            ranking INTEGER NOT NULL,
            chart_name TEXT NOT NULL,
            chart_date INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_songs_identity ON songs(title, artist, chart_name)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_chart_rank ON songs(chart_name, ranking)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist)")
        .execute(pool)
        .await?;

    // One row per chart with a crawl run in flight.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_locks (
            chart_name TEXT PRIMARY KEY,
            holder TEXT NOT NULL,
            acquired_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
