//! Read model and manual additions (`charts list`, `charts add`).

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use chart_harness_core::models::{ChartEntry, ChartRecord, UpsertOutcome};
use chart_harness_core::normalize::validate;
use chart_harness_core::store::ChartStore;

/// One chart ordered by ranking, or the full listing in id order.
pub async fn list_songs(store: &dyn ChartStore, chart: Option<&str>) -> Result<Vec<ChartRecord>> {
    match chart {
        Some(chart) => store.list_by_chart(chart).await,
        None => store.list_all().await,
    }
}

pub fn print_songs(records: &[ChartRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No songs.");
        return Ok(());
    }

    println!(
        "{:>6} {:>4}  {:<16} {:<32} {:<24} {}",
        "ID", "RANK", "CHART", "TITLE", "ARTIST", "CHART DATE"
    );
    for r in records {
        println!(
            "{:>6} {:>4}  {:<16} {:<32} {:<24} {}",
            r.id,
            r.ranking,
            r.chart_name,
            r.title,
            r.artist,
            r.chart_date.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("{} songs", records.len());
    Ok(())
}

/// Validate and upsert one song by hand.
///
/// Goes through the same identity-keyed upsert as a crawl, so adding a song
/// that already exists moves its ranking instead of duplicating it.
pub async fn add_song(
    store: &dyn ChartStore,
    title: &str,
    artist: &str,
    rank: u32,
    chart: &str,
    now: DateTime<Utc>,
) -> Result<UpsertOutcome> {
    let entry = validate(ChartEntry::new(title, artist, rank, chart, now))
        .map_err(|reason| anyhow!("rejected: {}", reason))?;
    store.upsert_entry(&entry, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_harness_core::store::memory::InMemoryChartStore;

    #[tokio::test]
    async fn add_then_readd_updates_in_place() {
        let store = InMemoryChartStore::new();
        let first = add_song(&store, "Pretender", "Official髭男dism", 3, "oricon", Utc::now())
            .await
            .unwrap();
        let second = add_song(&store, "Pretender", "Official髭男dism", 1, "oricon", Utc::now())
            .await
            .unwrap();

        assert!(matches!(first, UpsertOutcome::Inserted(_)));
        assert_eq!(second, UpsertOutcome::Updated(first.id()));
        let listed = list_songs(&store, Some("oricon")).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].ranking, 1);
    }

    #[tokio::test]
    async fn invalid_song_is_refused() {
        let store = InMemoryChartStore::new();
        let err = add_song(&store, "Echo", "Echo", 1, "oricon", Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("title equals artist"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn per_chart_listing_is_ranked() {
        let store = InMemoryChartStore::new();
        for (title, rank) in [("Third", 3), ("First", 1), ("Second", 2)] {
            add_song(&store, title, "Someone", rank, "oricon", Utc::now())
                .await
                .unwrap();
        }
        add_song(&store, "Elsewhere", "Someone", 1, "billboard-japan", Utc::now())
            .await
            .unwrap();

        let ranked: Vec<u32> = list_songs(&store, Some("oricon"))
            .await
            .unwrap()
            .iter()
            .map(|r| r.ranking)
            .collect();
        assert_eq!(ranked, vec![1, 2, 3]);
        assert_eq!(list_songs(&store, None).await.unwrap().len(), 4);
    }
}
