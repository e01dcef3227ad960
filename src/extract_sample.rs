//! The sample chart layout used by [`SAMPLE_CHART_HTML`](crate::fetch::SAMPLE_CHART_HTML)
//! and local fixture files: `.song-item` rows with `.rank`, `.title` and
//! `.artist` children.

use scraper::{ElementRef, Html};

use chart_harness_core::normalize::RowRejection;

use crate::extract::{
    collect_rows, first_text, loose_rows, read_loose_row, selector, ChartExtractor, RawRow,
    RowContext, RowOutcome, Strategy,
};

pub struct SampleExtractor;

fn read_item(row: ElementRef<'_>) -> Result<RawRow, RowRejection> {
    let rank = first_text(row, &selector(".rank")).ok_or(RowRejection::MissingField("rank"))?;
    let title = first_text(row, &selector(".title")).ok_or(RowRejection::MissingField("title"))?;
    let artist =
        first_text(row, &selector(".artist")).ok_or(RowRejection::MissingField("artist"))?;
    Ok(RawRow {
        rank,
        title,
        artist,
    })
}

impl ChartExtractor for SampleExtractor {
    fn name(&self) -> &str {
        "sample"
    }

    fn description(&self) -> &str {
        "Generic .song-item layout (built-in sample, local fixtures)"
    }

    fn primary(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome> {
        let items = selector(".song-item");
        collect_rows(doc.select(&items), ceiling, ctx, Strategy::Primary, read_item)
    }

    fn fallback(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome> {
        let items = selector("[class*=song], [class*=item]");
        collect_rows(
            loose_rows(doc, &items),
            ceiling,
            ctx,
            Strategy::Fallback,
            read_loose_row,
        )
    }
}
