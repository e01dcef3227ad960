//! In-memory [`ChartStore`] implementation for testing and dry runs.
//!
//! Keeps every record in a `BTreeMap` keyed by id behind a single
//! `std::sync::RwLock`, so each trait call is atomic with respect to the
//! others.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    newest_first, ChartEntry, ChartRecord, ChartSummary, IdentityKey, NewChartRecord,
    UpsertOutcome,
};

use super::ChartStore;

struct State {
    next_id: i64,
    rows: BTreeMap<i64, ChartRecord>,
}

impl State {
    fn insert(&mut self, record: NewChartRecord) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.insert(id, record.with_id(id));
        id
    }

    fn newest_match(&self, key: &IdentityKey) -> Option<&ChartRecord> {
        self.rows
            .values()
            .filter(|r| {
                r.title == key.title && r.artist == key.artist && r.chart_name == key.chart_name
            })
            .min_by(|a, b| newest_first(a, b))
    }
}

/// In-memory store with auto-incrementing ids starting at 1.
pub struct InMemoryChartStore {
    state: RwLock<State>,
}

impl InMemoryChartStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
        }
    }

    /// Seed the store with records whose ids are kept as given.
    ///
    /// New ids continue after the largest seeded id.
    pub fn from_records(records: impl IntoIterator<Item = ChartRecord>) -> Self {
        let rows: BTreeMap<i64, ChartRecord> = records.into_iter().map(|r| (r.id, r)).collect();
        let next_id = rows.keys().next_back().map(|id| id + 1).unwrap_or(1);
        Self {
            state: RwLock::new(State { next_id, rows }),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryChartStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartStore for InMemoryChartStore {
    async fn upsert_entry(&self, entry: &ChartEntry, now: DateTime<Utc>) -> Result<UpsertOutcome> {
        let mut state = self.state.write().unwrap();
        let key = IdentityKey::of_entry(entry);
        if let Some(id) = state.newest_match(&key).map(|r| r.id) {
            if let Some(row) = state.rows.get_mut(&id) {
                row.ranking = entry.rank;
                row.chart_date = now;
            }
            return Ok(UpsertOutcome::Updated(id));
        }
        let id = state.insert(NewChartRecord::observed(entry, now));
        Ok(UpsertOutcome::Inserted(id))
    }

    async fn insert(&self, record: &NewChartRecord) -> Result<i64> {
        Ok(self.state.write().unwrap().insert(record.clone()))
    }

    async fn find_by_identity(&self, key: &IdentityKey) -> Result<Option<ChartRecord>> {
        Ok(self.state.read().unwrap().newest_match(key).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ChartRecord>> {
        Ok(self.state.read().unwrap().rows.values().cloned().collect())
    }

    async fn list_by_chart(&self, chart_name: &str) -> Result<Vec<ChartRecord>> {
        let state = self.state.read().unwrap();
        let mut rows: Vec<ChartRecord> = state
            .rows
            .values()
            .filter(|r| r.chart_name == chart_name)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.ranking, r.id));
        Ok(rows)
    }

    async fn list_by_artist(&self, artist: &str) -> Result<Vec<ChartRecord>> {
        let state = self.state.read().unwrap();
        Ok(state
            .rows
            .values()
            .filter(|r| r.artist == artist)
            .cloned()
            .collect())
    }

    async fn delete_ids(&self, ids: &[i64]) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let removed = ids
            .iter()
            .filter(|id| state.rows.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn delete_by_chart(&self, chart_name: &str) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let before = state.rows.len();
        state.rows.retain(|_, r| r.chart_name != chart_name);
        Ok((before - state.rows.len()) as u64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut state = self.state.write().unwrap();
        let count = state.rows.len() as u64;
        state.rows.clear();
        Ok(count)
    }

    async fn chart_summaries(&self) -> Result<Vec<ChartSummary>> {
        let state = self.state.read().unwrap();
        let mut by_chart: BTreeMap<&str, ChartSummary> = BTreeMap::new();
        for row in state.rows.values() {
            let summary = by_chart
                .entry(row.chart_name.as_str())
                .or_insert_with(|| ChartSummary {
                    chart_name: row.chart_name.clone(),
                    records: 0,
                    latest_chart_date: None,
                });
            summary.records += 1;
            summary.latest_chart_date = summary.latest_chart_date.max(Some(row.chart_date));
        }
        Ok(by_chart.into_values().collect())
    }
}
