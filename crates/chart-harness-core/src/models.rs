//! Core data models used throughout Chart Harness.
//!
//! A [`ChartEntry`] is produced by an extractor for a single crawl run and
//! discarded once reconciled. A [`ChartRecord`] is the persisted form, one
//! per identity key (`title`, `artist`, `chart_name`) after cleanup.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Artist placeholder emitted by broken source markup. Rows carrying it are
/// rejected at extraction and purged from the store.
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// A ranked song candidate extracted from a chart document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartEntry {
    pub title: String,
    pub artist: String,
    pub rank: u32,
    pub chart_id: String,
    pub observed_at: DateTime<Utc>,
}

impl ChartEntry {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        rank: u32,
        chart_id: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            rank,
            chart_id: chart_id.into(),
            observed_at,
        }
    }
}

/// A persisted chart row.
///
/// `id` and `created_at` never change after insertion; `ranking` and
/// `chart_date` reflect the most recent observation only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRecord {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub ranking: u32,
    pub chart_name: String,
    pub chart_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A record that has not been assigned an id yet.
///
/// Raw inserts bypass the identity lookup, which is how duplicate identity
/// keys can exist until the duplicate-collapse pass runs.
#[derive(Debug, Clone)]
pub struct NewChartRecord {
    pub title: String,
    pub artist: String,
    pub ranking: u32,
    pub chart_name: String,
    pub chart_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewChartRecord {
    /// Build a record first observed at `now`.
    pub fn observed(entry: &ChartEntry, now: DateTime<Utc>) -> Self {
        Self {
            title: entry.title.clone(),
            artist: entry.artist.clone(),
            ranking: entry.rank,
            chart_name: entry.chart_id.clone(),
            chart_date: now,
            created_at: now,
        }
    }

    pub fn with_id(self, id: i64) -> ChartRecord {
        ChartRecord {
            id,
            title: self.title,
            artist: self.artist,
            ranking: self.ranking,
            chart_name: self.chart_name,
            chart_date: self.chart_date,
            created_at: self.created_at,
        }
    }
}

/// The `(title, artist, chart_name)` tuple that identifies a song on a chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub title: String,
    pub artist: String,
    pub chart_name: String,
}

impl IdentityKey {
    pub fn of(record: &ChartRecord) -> Self {
        Self {
            title: record.title.clone(),
            artist: record.artist.clone(),
            chart_name: record.chart_name.clone(),
        }
    }

    pub fn of_entry(entry: &ChartEntry) -> Self {
        Self {
            title: entry.title.clone(),
            artist: entry.artist.clone(),
            chart_name: entry.chart_id.clone(),
        }
    }
}

/// Result of an identity-keyed upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => *id,
        }
    }
}

/// Per-chart aggregate used by the status probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartSummary {
    pub chart_name: String,
    pub records: u64,
    pub latest_chart_date: Option<DateTime<Utc>>,
}

/// Orders records newest first: descending `chart_date`, then descending
/// `id` so that the later insert wins a timestamp tie.
pub fn newest_first(a: &ChartRecord, b: &ChartRecord) -> std::cmp::Ordering {
    b.chart_date
        .cmp(&a.chart_date)
        .then_with(|| b.id.cmp(&a.id))
}
