//! Oricon weekly ranking.
//!
//! Each song is a `.media-box` card holding `p.media-rank`,
//! `li.media-title` and `li.media-artist`.

use scraper::{ElementRef, Html};

use chart_harness_core::normalize::RowRejection;

use crate::extract::{
    collect_rows, first_text, loose_rows, read_loose_row, selector, ChartExtractor, RawRow,
    RowContext, RowOutcome, Strategy,
};

pub struct OriconExtractor;

fn read_card(row: ElementRef<'_>) -> Result<RawRow, RowRejection> {
    let rank =
        first_text(row, &selector("p.media-rank")).ok_or(RowRejection::MissingField("rank"))?;
    let title =
        first_text(row, &selector("li.media-title")).ok_or(RowRejection::MissingField("title"))?;
    let artist = first_text(row, &selector("li.media-artist"))
        .ok_or(RowRejection::MissingField("artist"))?;
    Ok(RawRow {
        rank,
        title,
        artist,
    })
}

impl ChartExtractor for OriconExtractor {
    fn name(&self) -> &str {
        "oricon"
    }

    fn description(&self) -> &str {
        "Oricon ranking cards"
    }

    fn primary(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome> {
        let cards = selector(".media-box");
        collect_rows(doc.select(&cards), ceiling, ctx, Strategy::Primary, read_card)
    }

    fn fallback(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome> {
        let cards = selector("[class*=media-box], [class*=rank-box], section[class*=rank]");
        collect_rows(
            loose_rows(doc, &cards),
            ceiling,
            ctx,
            Strategy::Fallback,
            read_loose_row,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Ceilings;
    use chrono::Utc;

    fn card(rank: &str, title: &str, artist: &str) -> String {
        format!(
            r#"<section class="box-rank-entry"><div class="media-box">
                <p class="media-rank">{rank}</p>
                <ul><li class="media-title">{title}</li><li class="media-artist">{artist}</li></ul>
            </div></section>"#
        )
    }

    fn extract(doc: &str) -> crate::extract::Extraction {
        OriconExtractor.extract(doc, "oricon", Ceilings::default(), Utc::now())
    }

    #[test]
    fn reads_ranking_cards() {
        let doc = [
            card("1", "Plazma", "米津玄師"),
            card("2", "ダーリン", "Mrs. GREEN APPLE"),
            card("3", "IRIS OUT", "米津玄師"),
        ]
        .concat();
        let out = extract(&doc);

        assert_eq!(out.strategy, Strategy::Primary);
        let ranks: Vec<u32> = out.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(out.entries[0].artist, "米津玄師");
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn rank_digits_bleeding_into_title_are_stripped() {
        let out = extract(&card("7", "7  Bling-Bang-Bang-Born", "Creepy Nuts"));
        assert_eq!(out.entries[0].title, "Bling-Bang-Bang-Born");
    }

    #[test]
    fn unknown_artist_and_malformed_rank_are_skipped() {
        let doc = [
            card("1", "Plazma", "米津玄師"),
            card("2", "Mystery Song", "Unknown"),
            card("12abc", "Broken", "Someone"),
        ]
        .concat();
        let out = extract(&doc);

        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.skipped.len(), 2);
        assert!(out.skipped.contains(&RowRejection::UnknownArtist));
    }

    #[test]
    fn ceiling_stops_collection() {
        let doc: String = (1..=60)
            .map(|i| card(&i.to_string(), &format!("Song {i}"), &format!("Artist {i}")))
            .collect();
        let out = extract(&doc);
        assert_eq!(out.entries.len(), 50);
    }

    #[test]
    fn fallback_reads_renamed_cards() {
        let doc: String = (1..=3)
            .map(|i| {
                format!(
                    r#"<div class="rank-box-wide"><span class="num-rank">{i}</span><h3 class="song-title">Song {i}</h3><p class="artist-name">Artist {i}</p></div>"#
                )
            })
            .collect();
        let out = extract(&doc);

        assert_eq!(out.strategy, Strategy::Fallback);
        assert_eq!(out.entries.len(), 3);
        assert_eq!(out.entries[2].artist, "Artist 3");
    }
}
