//! `charts cleanup` entry points.
//!
//! Thin wrappers over [`chart_harness_core::cleanup`] that pick the pass,
//! run it against the configured store, and print the counts.

use anyhow::{bail, Result};

use chart_harness_core::cleanup::{
    auto_cleanup, collapse_duplicates, collapse_same_rank, purge_all, purge_chart,
    purge_invalid, purge_unknown_artists, CleanupReport,
};
use chart_harness_core::store::ChartStore;

/// Which cleanup operation to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupTarget {
    Unknown,
    Duplicates,
    SameRank(String),
    Invalid,
    Auto,
    Chart(String),
    /// Full purge. Refused unless `confirmed`.
    All { confirmed: bool },
}

/// What a cleanup run removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted { operation: &'static str, deleted: u64 },
    Auto(CleanupReport),
}

impl CleanupOutcome {
    pub fn deleted(&self) -> u64 {
        match self {
            CleanupOutcome::Deleted { deleted, .. } => *deleted,
            CleanupOutcome::Auto(report) => report.total(),
        }
    }
}

/// Run one cleanup operation. `charts` is the set the auto-cleanup
/// same-rank pass covers.
pub async fn run_cleanup(
    store: &dyn ChartStore,
    target: &CleanupTarget,
    charts: &[String],
) -> Result<CleanupOutcome> {
    let (operation, deleted) = match target {
        CleanupTarget::Unknown => ("unknown-artist purge", purge_unknown_artists(store).await?),
        CleanupTarget::Duplicates => ("duplicate collapse", collapse_duplicates(store).await?),
        CleanupTarget::SameRank(chart) => {
            ("same-rank collapse", collapse_same_rank(store, chart).await?)
        }
        CleanupTarget::Invalid => ("invalid purge", purge_invalid(store).await?),
        CleanupTarget::Chart(chart) => ("chart purge", purge_chart(store, chart).await?),
        CleanupTarget::All { confirmed } => {
            if !confirmed {
                bail!("refusing to delete every record without --yes");
            }
            ("full purge", purge_all(store).await?)
        }
        CleanupTarget::Auto => {
            return Ok(CleanupOutcome::Auto(auto_cleanup(store, charts).await?));
        }
    };
    Ok(CleanupOutcome::Deleted { operation, deleted })
}

pub fn print_outcome(outcome: &CleanupOutcome) {
    match outcome {
        CleanupOutcome::Deleted { operation, deleted } => {
            println!("cleanup {}", operation);
            println!("  deleted: {}", deleted);
        }
        CleanupOutcome::Auto(report) => {
            println!("cleanup auto");
            println!("  unknown artists: {}", report.unknown);
            println!("  duplicates: {}", report.duplicates);
            println!("  same rank: {}", report.same_rank);
            println!("  invalid: {}", report.invalid);
            println!("  total deleted: {}", report.total());
        }
    }
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_harness_core::models::NewChartRecord;
    use chart_harness_core::store::memory::InMemoryChartStore;
    use chrono::Utc;

    fn record(title: &str, artist: &str, rank: u32) -> NewChartRecord {
        let now = Utc::now();
        NewChartRecord {
            title: title.to_string(),
            artist: artist.to_string(),
            ranking: rank,
            chart_name: "oricon".to_string(),
            chart_date: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn full_purge_needs_confirmation() {
        let store = InMemoryChartStore::new();
        store.insert(&record("Pretender", "Official髭男dism", 1)).await.unwrap();

        let refused = run_cleanup(&store, &CleanupTarget::All { confirmed: false }, &[]).await;
        assert!(refused.is_err());
        assert_eq!(store.len(), 1);

        let outcome = run_cleanup(&store, &CleanupTarget::All { confirmed: true }, &[])
            .await
            .unwrap();
        assert_eq!(outcome.deleted(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn auto_reports_each_pass() {
        let store = InMemoryChartStore::new();
        store.insert(&record("Mystery", "Unknown", 1)).await.unwrap();
        store.insert(&record("Echo", "Echo", 2)).await.unwrap();
        store.insert(&record("Plazma", "米津玄師", 3)).await.unwrap();

        let charts = vec!["oricon".to_string()];
        let outcome = run_cleanup(&store, &CleanupTarget::Auto, &charts).await.unwrap();
        let CleanupOutcome::Auto(report) = outcome else {
            panic!("expected auto report");
        };
        assert_eq!(report.unknown, 1);
        assert_eq!(report.invalid, 1);
        assert_eq!(store.len(), 1);
    }
}
