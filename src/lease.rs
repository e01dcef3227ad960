//! Per-chart crawl leases.
//!
//! A crawl run takes its chart's lease before the first stage and gives it
//! back when the run ends. A second trigger for the same chart finds the
//! lease held and is rejected as busy.
//!
//! | Implementation | Scope |
//! |----------------|-------|
//! | [`SqliteChartLeases`] | Every process sharing the database (used by `charts`) |
//! | [`LocalChartLeases`] | One process (library use, tests) |
//!
//! A SQLite lease whose holder died is taken over once it is older than
//! `crawl.lease_stale_secs`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

/// A held lease. Pass it back to [`ChartLeases::release`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lease {
    pub chart: String,
    pub holder: String,
}

impl Lease {
    fn new(chart: &str) -> Self {
        Self {
            chart: chart.to_string(),
            holder: format!(
                "{}-{}-{}",
                std::process::id(),
                NEXT_HOLDER.fetch_add(1, Ordering::Relaxed),
                Utc::now().timestamp_millis()
            ),
        }
    }
}

#[async_trait]
pub trait ChartLeases: Send + Sync {
    /// Take the chart's lease without waiting. `None` while another run holds it.
    async fn try_acquire(&self, chart: &str) -> Result<Option<Lease>>;

    /// Give the lease back. A lease that was taken over is left alone.
    async fn release(&self, lease: &Lease) -> Result<()>;
}

/// In-process leases.
#[derive(Default)]
pub struct LocalChartLeases {
    held: Mutex<HashSet<String>>,
}

impl LocalChartLeases {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChartLeases for LocalChartLeases {
    async fn try_acquire(&self, chart: &str) -> Result<Option<Lease>> {
        let mut held = self.held.lock().map_err(|_| anyhow!("lease table poisoned"))?;
        if !held.insert(chart.to_string()) {
            return Ok(None);
        }
        Ok(Some(Lease::new(chart)))
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        let mut held = self.held.lock().map_err(|_| anyhow!("lease table poisoned"))?;
        held.remove(&lease.chart);
        Ok(())
    }
}

/// Leases stored as rows of the `crawl_locks` table, keyed by chart.
pub struct SqliteChartLeases {
    pool: SqlitePool,
    stale_after: Duration,
}

impl SqliteChartLeases {
    pub fn new(pool: SqlitePool, stale_after: Duration) -> Self {
        Self { pool, stale_after }
    }
}

#[async_trait]
impl ChartLeases for SqliteChartLeases {
    async fn try_acquire(&self, chart: &str) -> Result<Option<Lease>> {
        let lease = Lease::new(chart);
        let now = Utc::now();

        // Inserts a fresh row, or replaces one whose holder went stale.
        let result = sqlx::query(
            r#"
            INSERT INTO crawl_locks (chart_name, holder, acquired_at)
            VALUES (?, ?, ?)
            ON CONFLICT(chart_name) DO UPDATE
                SET holder = excluded.holder, acquired_at = excluded.acquired_at
                WHERE crawl_locks.acquired_at < ?
            "#,
        )
        .bind(&lease.chart)
        .bind(&lease.holder)
        .bind(now.timestamp_millis())
        .bind((now - self.stale_after).timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(lease))
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        sqlx::query("DELETE FROM crawl_locks WHERE chart_name = ? AND holder = ?")
            .bind(&lease.chart)
            .bind(&lease.holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
