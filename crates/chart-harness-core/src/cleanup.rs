//! Multi-pass cleanup engine.
//!
//! Four independent, idempotent passes plus two explicit purges:
//!
//! | Pass | Removes |
//! |------|---------|
//! | [`purge_unknown_artists`] | records whose artist is `"Unknown"` |
//! | [`collapse_duplicates`] | all but the newest record per identity key |
//! | [`collapse_same_rank`] | all but the newest record per ranking within one chart |
//! | [`purge_invalid`] | blank or one-character fields, title equal to artist |
//! | [`purge_chart`] | every record of one chart |
//! | [`purge_all`] | every record |
//!
//! Each pass reads a snapshot, computes its deletion set, and applies it
//! with a single [`ChartStore::delete_ids`] call. [`auto_cleanup`] chains
//! the four passes; running it twice with no new data deletes nothing the
//! second time.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::models::{newest_first, ChartRecord, IdentityKey, UNKNOWN_ARTIST};
use crate::normalize::is_valid_pair;
use crate::store::ChartStore;

/// Aggregate deletion counts from [`auto_cleanup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub unknown: u64,
    pub duplicates: u64,
    pub same_rank: u64,
    pub invalid: u64,
}

impl CleanupReport {
    pub fn total(&self) -> u64 {
        self.unknown + self.duplicates + self.same_rank + self.invalid
    }
}

/// Ids of every record in `groups` except the newest of each group.
fn all_but_newest<K>(groups: HashMap<K, Vec<ChartRecord>>) -> Vec<i64> {
    let mut doomed = Vec::new();
    for (_, mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(newest_first);
        doomed.extend(group.iter().skip(1).map(|r| r.id));
    }
    doomed.sort_unstable();
    doomed
}

/// Delete records whose artist is the `"Unknown"` placeholder.
pub async fn purge_unknown_artists(store: &dyn ChartStore) -> Result<u64> {
    let ids: Vec<i64> = store
        .list_by_artist(UNKNOWN_ARTIST)
        .await?
        .iter()
        .map(|r| r.id)
        .collect();
    let deleted = store.delete_ids(&ids).await?;
    info!(deleted, "purged unknown-artist records");
    Ok(deleted)
}

/// Keep only the newest record per `(title, artist, chart_name)`.
pub async fn collapse_duplicates(store: &dyn ChartStore) -> Result<u64> {
    let mut groups: HashMap<IdentityKey, Vec<ChartRecord>> = HashMap::new();
    for record in store.list_all().await? {
        groups.entry(IdentityKey::of(&record)).or_default().push(record);
    }
    let ids = all_but_newest(groups);
    let deleted = store.delete_ids(&ids).await?;
    info!(deleted, "collapsed duplicate records");
    Ok(deleted)
}

/// Keep only the newest record per ranking within `chart_name`.
pub async fn collapse_same_rank(store: &dyn ChartStore, chart_name: &str) -> Result<u64> {
    let mut groups: HashMap<u32, Vec<ChartRecord>> = HashMap::new();
    for record in store.list_by_chart(chart_name).await? {
        groups.entry(record.ranking).or_default().push(record);
    }
    let ids = all_but_newest(groups);
    let deleted = store.delete_ids(&ids).await?;
    info!(chart = chart_name, deleted, "collapsed same-rank records");
    Ok(deleted)
}

/// Delete records with blank or one-character fields, or title == artist.
pub async fn purge_invalid(store: &dyn ChartStore) -> Result<u64> {
    let ids: Vec<i64> = store
        .list_all()
        .await?
        .iter()
        .filter(|r| !is_valid_pair(&r.title, &r.artist))
        .map(|r| r.id)
        .collect();
    let deleted = store.delete_ids(&ids).await?;
    info!(deleted, "purged invalid records");
    Ok(deleted)
}

/// Delete every record of one chart.
pub async fn purge_chart(store: &dyn ChartStore, chart_name: &str) -> Result<u64> {
    let deleted = store.delete_by_chart(chart_name).await?;
    info!(chart = chart_name, deleted, "purged chart");
    Ok(deleted)
}

/// Delete the entire store.
pub async fn purge_all(store: &dyn ChartStore) -> Result<u64> {
    let deleted = store.delete_all().await?;
    info!(deleted, "purged all records");
    Ok(deleted)
}

/// Run every pass in order: unknown artists, duplicates, same-rank for each
/// of `charts`, invalid records.
pub async fn auto_cleanup<S: AsRef<str>>(
    store: &dyn ChartStore,
    charts: &[S],
) -> Result<CleanupReport> {
    let unknown = purge_unknown_artists(store).await?;
    let duplicates = collapse_duplicates(store).await?;
    let mut same_rank = 0;
    for chart in charts {
        same_rank += collapse_same_rank(store, chart.as_ref()).await?;
    }
    let invalid = purge_invalid(store).await?;

    let report = CleanupReport {
        unknown,
        duplicates,
        same_rank,
        invalid,
    };
    info!(
        unknown,
        duplicates,
        same_rank,
        invalid,
        total = report.total(),
        "auto-cleanup finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewChartRecord;
    use crate::store::memory::InMemoryChartStore;
    use chrono::{DateTime, Duration, Utc};
    use std::collections::HashSet;

    fn record(title: &str, artist: &str, rank: u32, chart: &str, at: DateTime<Utc>) -> NewChartRecord {
        NewChartRecord {
            title: title.to_string(),
            artist: artist.to_string(),
            ranking: rank,
            chart_name: chart.to_string(),
            chart_date: at,
            created_at: at,
        }
    }

    async fn seed(store: &InMemoryChartStore, records: Vec<NewChartRecord>) -> Vec<i64> {
        let mut ids = Vec::new();
        for r in records {
            ids.push(store.insert(&r).await.unwrap());
        }
        ids
    }

    #[tokio::test]
    async fn unknown_artists_are_purged() {
        let store = InMemoryChartStore::new();
        let now = Utc::now();
        seed(
            &store,
            vec![
                record("Song A", "Unknown", 1, "oricon", now),
                record("Song B", "Unknown", 2, "billboard-japan", now),
                record("Song C", "Real Band", 3, "oricon", now),
            ],
        )
        .await;

        assert_eq!(purge_unknown_artists(&store).await.unwrap(), 2);
        let rows = store.list_all().await.unwrap();
        assert!(rows.iter().all(|r| r.artist != UNKNOWN_ARTIST));
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn duplicates_collapse_to_newest() {
        let store = InMemoryChartStore::new();
        let old = Utc::now() - Duration::days(2);
        let mid = Utc::now() - Duration::days(1);
        let new = Utc::now();
        let ids = seed(
            &store,
            vec![
                record("Pretender", "Official Band", 4, "oricon", old),
                record("Pretender", "Official Band", 2, "oricon", new),
                record("Pretender", "Official Band", 3, "oricon", mid),
                record("Pretender", "Official Band", 1, "billboard-japan", old),
            ],
        )
        .await;

        assert_eq!(collapse_duplicates(&store).await.unwrap(), 2);
        let rows = store.list_all().await.unwrap();
        let surviving: HashSet<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(surviving, HashSet::from([ids[1], ids[3]]));

        let keys: HashSet<IdentityKey> = rows.iter().map(IdentityKey::of).collect();
        assert_eq!(keys.len(), rows.len());
    }

    #[tokio::test]
    async fn timestamp_tie_keeps_later_insert() {
        let store = InMemoryChartStore::new();
        let now = Utc::now();
        let ids = seed(
            &store,
            vec![
                record("Idol", "YOASOBI", 1, "oricon", now),
                record("Idol", "YOASOBI", 1, "oricon", now),
            ],
        )
        .await;

        assert_eq!(collapse_duplicates(&store).await.unwrap(), 1);
        assert_eq!(store.list_all().await.unwrap()[0].id, ids[1]);
    }

    #[tokio::test]
    async fn same_rank_collapse_is_per_chart() {
        let store = InMemoryChartStore::new();
        let old = Utc::now() - Duration::hours(6);
        let new = Utc::now();
        seed(
            &store,
            vec![
                record("Old One", "Band", 1, "oricon", old),
                record("New One", "Band", 1, "oricon", new),
                record("Two", "Band", 2, "oricon", old),
                record("Other Chart", "Band", 1, "billboard-japan", old),
            ],
        )
        .await;

        assert_eq!(collapse_same_rank(&store, "oricon").await.unwrap(), 1);
        let oricon = store.list_by_chart("oricon").await.unwrap();
        let titles: Vec<_> = oricon.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["New One", "Two"]);
        assert_eq!(store.list_by_chart("billboard-japan").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_records_are_purged() {
        let store = InMemoryChartStore::new();
        let now = Utc::now();
        seed(
            &store,
            vec![
                record("", "Band", 1, "oricon", now),
                record("Song", "  ", 2, "oricon", now),
                record("X", "Band", 3, "oricon", now),
                record("Song", "B", 4, "oricon", now),
                record("Mirror", "Mirror", 5, "oricon", now),
                record("Fine Song", "Fine Band", 6, "oricon", now),
            ],
        )
        .await;

        assert_eq!(purge_invalid(&store).await.unwrap(), 5);
        let rows = store.list_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Fine Song");
    }

    #[tokio::test]
    async fn explicit_purges_return_counts() {
        let store = InMemoryChartStore::new();
        let now = Utc::now();
        seed(
            &store,
            vec![
                record("Song A", "Band", 1, "oricon", now),
                record("Song B", "Band", 2, "oricon", now),
                record("Song C", "Band", 1, "billboard-japan", now),
            ],
        )
        .await;

        assert_eq!(purge_chart(&store, "oricon").await.unwrap(), 2);
        assert_eq!(purge_chart(&store, "oricon").await.unwrap(), 0);
        assert_eq!(purge_all(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn auto_cleanup_is_idempotent() {
        let store = InMemoryChartStore::new();
        let old = Utc::now() - Duration::days(1);
        let new = Utc::now();
        seed(
            &store,
            vec![
                record("Ghost", "Unknown", 9, "oricon", new),
                record("Pretender", "Official Band", 2, "oricon", old),
                record("Pretender", "Official Band", 1, "oricon", new),
                record("Marigold", "Aimyon", 1, "oricon", old),
                record("Echo", "Echo", 4, "billboard-japan", new),
                record("Idol", "YOASOBI", 1, "billboard-japan", new),
            ],
        )
        .await;

        let charts = ["billboard-japan", "oricon"];
        let first = auto_cleanup(&store, &charts).await.unwrap();
        assert_eq!(
            first,
            CleanupReport {
                unknown: 1,
                duplicates: 1,
                same_rank: 1,
                invalid: 1,
            }
        );
        assert_eq!(first.total(), 4);

        let second = auto_cleanup(&store, &charts).await.unwrap();
        assert_eq!(second.total(), 0);

        let rows = store.list_all().await.unwrap();
        let titles: HashSet<&str> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, HashSet::from(["Pretender", "Idol"]));
    }
}
