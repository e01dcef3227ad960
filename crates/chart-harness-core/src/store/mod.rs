//! Storage abstraction for Chart Harness.
//!
//! The [`ChartStore`] trait defines every persistence operation the
//! reconcile and cleanup engines need, so the same pipeline runs against
//! SQLite in production and [`memory::InMemoryChartStore`] in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Atomicity
//!
//! - [`upsert_entry`](ChartStore::upsert_entry) performs the identity
//!   lookup and the write as one atomic unit.
//! - [`delete_ids`](ChartStore::delete_ids) removes the whole id set at
//!   once; readers never observe a half-applied cleanup pass.
//!
//! Uniqueness of the identity key is *not* enforced at write time;
//! [`insert`](ChartStore::insert) can create duplicates that the cleanup
//! engine later collapses.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    ChartEntry, ChartRecord, ChartSummary, IdentityKey, NewChartRecord, UpsertOutcome,
};

/// Abstract keyed store of [`ChartRecord`]s.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_entry`](ChartStore::upsert_entry) | Identity-keyed insert or in-place update |
/// | [`insert`](ChartStore::insert) | Raw insert without identity lookup |
/// | [`find_by_identity`](ChartStore::find_by_identity) | Newest record for a key |
/// | [`list_all`](ChartStore::list_all) | Full listing |
/// | [`list_by_chart`](ChartStore::list_by_chart) | One chart, ranking ascending |
/// | [`list_by_artist`](ChartStore::list_by_artist) | All records of one artist |
/// | [`delete_ids`](ChartStore::delete_ids) | Atomic batch delete |
/// | [`delete_by_chart`](ChartStore::delete_by_chart) | Per-chart purge |
/// | [`delete_all`](ChartStore::delete_all) | Full purge |
/// | [`chart_summaries`](ChartStore::chart_summaries) | Per-chart counts |
#[async_trait]
pub trait ChartStore: Send + Sync {
    /// Look up `entry`'s identity key; update `ranking` and `chart_date`
    /// of the newest match in place, or insert a new record with
    /// `chart_date = created_at = now`.
    async fn upsert_entry(&self, entry: &ChartEntry, now: DateTime<Utc>) -> Result<UpsertOutcome>;

    /// Insert a record without consulting the identity key.
    async fn insert(&self, record: &NewChartRecord) -> Result<i64>;

    /// Return the newest record with this identity key, if any.
    async fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<ChartRecord>>;

    /// All records, in id order.
    async fn list_all(&self) -> Result<Vec<ChartRecord>>;

    /// All records of one chart, ordered by ranking ascending (ties by id).
    async fn list_by_chart(&self, chart_name: &str) -> Result<Vec<ChartRecord>>;

    /// All records whose artist equals `artist` exactly.
    async fn list_by_artist(&self, artist: &str) -> Result<Vec<ChartRecord>>;

    /// Delete the given ids as one unit. Unknown ids are ignored.
    ///
    /// Returns the number of rows actually removed.
    async fn delete_ids(&self, ids: &[i64]) -> Result<u64>;

    /// Delete every record of one chart. Returns the count removed.
    async fn delete_by_chart(&self, chart_name: &str) -> Result<u64>;

    /// Delete every record. Returns the count removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Record counts and latest observation per chart, ordered by name.
    async fn chart_summaries(&self) -> Result<Vec<ChartSummary>>;
}
