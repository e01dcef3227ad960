//! Billboard Japan Hot 100.
//!
//! The chart table renders one `<tr class="rankN">` per song with the rank
//! in `td.rank_td span` and the song fields in `p.musuc_title` (sic) and
//! `p.artist_name`. The fallback ignores the rank cell class and reads the
//! first `span` of any `tbody tr` whose class starts with `rank`.

use scraper::{ElementRef, Html};

use chart_harness_core::normalize::RowRejection;

use crate::extract::{
    all_text, collect_rows, first_text, selector, ChartExtractor, RawRow, RowContext, RowOutcome,
    Strategy,
};

pub struct BillboardJapanExtractor;

fn read_primary_row(row: ElementRef<'_>) -> Result<RawRow, RowRejection> {
    let rank = first_text(row, &selector("td.rank_td span"))
        .ok_or(RowRejection::MissingField("rank"))?;
    let title = first_text(row, &selector("p.musuc_title"))
        .ok_or(RowRejection::MissingField("title"))?;
    let artist = first_text(row, &selector("p.artist_name"))
        .ok_or(RowRejection::MissingField("artist"))?;
    Ok(RawRow {
        rank,
        title,
        artist,
    })
}

fn read_fallback_row(row: ElementRef<'_>) -> Result<RawRow, RowRejection> {
    let rank = first_text(row, &selector("span")).ok_or(RowRejection::MissingField("rank"))?;
    let title =
        all_text(row, &selector("p.musuc_title")).ok_or(RowRejection::MissingField("title"))?;
    let artist =
        all_text(row, &selector("p.artist_name")).ok_or(RowRejection::MissingField("artist"))?;
    Ok(RawRow {
        rank,
        title,
        artist,
    })
}

impl ChartExtractor for BillboardJapanExtractor {
    fn name(&self) -> &str {
        "billboard-japan"
    }

    fn description(&self) -> &str {
        "Billboard Japan Hot 100 table"
    }

    fn primary(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome> {
        let rows = selector("tr[class*=rank]");
        collect_rows(
            doc.select(&rows),
            ceiling,
            ctx,
            Strategy::Primary,
            read_primary_row,
        )
    }

    fn fallback(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome> {
        let rows = selector("tbody tr");
        let ranked = doc
            .select(&rows)
            .filter(|tr| tr.value().attr("class").is_some_and(|c| c.starts_with("rank")));
        collect_rows(ranked, ceiling, ctx, Strategy::Fallback, read_fallback_row)
    }
}
