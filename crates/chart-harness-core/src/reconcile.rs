//! Identity-keyed upsert engine.
//!
//! Merges a normalized crawl batch into a [`ChartStore`]:
//!
//! 1. Collapse candidates sharing `(chart, rank)`; the entry encountered
//!    last in extraction order wins.
//! 2. For every survivor, upsert by `(title, artist, chart_name)`. A match
//!    has its `ranking` and `chart_date` overwritten in place (no history
//!    is kept); otherwise a new record is inserted.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{ChartEntry, UpsertOutcome};
use crate::store::ChartStore;

/// Counts produced by one [`reconcile`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub inserted: u64,
    pub updated: u64,
    /// Candidates dropped because a later entry claimed the same rank.
    pub collapsed: u64,
}

impl ReconcileReport {
    pub fn written(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Collapse entries by `(chart_id, rank)`, last one wins.
///
/// The result is ordered by chart id, then rank ascending.
pub fn collapse_by_rank(entries: Vec<ChartEntry>) -> Vec<ChartEntry> {
    let mut by_rank: BTreeMap<(String, u32), ChartEntry> = BTreeMap::new();
    for entry in entries {
        by_rank.insert((entry.chart_id.clone(), entry.rank), entry);
    }
    by_rank.into_values().collect()
}

/// Upsert a batch of normalized entries.
///
/// Each individual upsert is atomic inside the store; the batch as a whole
/// is not. An error aborts the remaining writes and is returned as-is.
pub async fn reconcile(
    store: &dyn ChartStore,
    entries: Vec<ChartEntry>,
    now: DateTime<Utc>,
) -> Result<ReconcileReport> {
    let candidates = entries.len() as u64;
    let survivors = collapse_by_rank(entries);
    let mut report = ReconcileReport {
        collapsed: candidates - survivors.len() as u64,
        ..Default::default()
    };

    for entry in &survivors {
        match store.upsert_entry(entry, now).await? {
            UpsertOutcome::Inserted(id) => {
                report.inserted += 1;
                info!(
                    chart = %entry.chart_id,
                    rank = entry.rank,
                    id,
                    "new song: {} - {}",
                    entry.artist,
                    entry.title
                );
            }
            UpsertOutcome::Updated(id) => {
                report.updated += 1;
                debug!(
                    chart = %entry.chart_id,
                    rank = entry.rank,
                    id,
                    "updated song: {} - {}",
                    entry.artist,
                    entry.title
                );
            }
        }
    }

    Ok(report)
}
