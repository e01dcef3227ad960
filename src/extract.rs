//! Chart extraction: raw HTML → ranked [`ChartEntry`] candidates.
//!
//! Every chart source has one [`ChartExtractor`] variant with two parsing
//! modes:
//!
//! - a **primary** strategy using the source's exact structural selectors,
//! - a **fallback** strategy with looser selectors, run over the same
//!   document (with a lower ceiling) only when the primary strategy yields
//!   no valid entries.
//!
//! Each row produces a [`RowOutcome`]: a valid entry or a typed
//! [`RowRejection`]. A malformed row is logged and skipped; it never aborts
//! the run. Collection stops at the first rank above the active ceiling.
//!
//! # Variants
//!
//! | Name | Module |
//! |------|--------|
//! | `billboard-japan` | [`extract_billboard`](crate::extract_billboard) |
//! | `oricon` | [`extract_oricon`](crate::extract_oricon) |
//! | `sample` | [`extract_sample`](crate::extract_sample) |

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{info, warn};

use chart_harness_core::models::ChartEntry;
use chart_harness_core::normalize::{parse_rank, strip_rank_prefix, validate, RowRejection};

use crate::extract_billboard::BillboardJapanExtractor;
use crate::extract_oricon::OriconExtractor;
use crate::extract_sample::SampleExtractor;

/// Result of reading one chart row.
pub type RowOutcome = Result<ChartEntry, RowRejection>;

/// Which strategy produced the entries of an [`Extraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Primary,
    Fallback,
    /// Neither strategy produced an entry.
    None,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Primary => write!(f, "primary"),
            Strategy::Fallback => write!(f, "fallback"),
            Strategy::None => write!(f, "none"),
        }
    }
}

/// Rank ceilings for the two strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ceilings {
    pub primary: u32,
    pub fallback: u32,
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            primary: 50,
            fallback: 20,
        }
    }
}

/// Entries and skip reasons from one document.
#[derive(Debug)]
pub struct Extraction {
    pub entries: Vec<ChartEntry>,
    pub skipped: Vec<RowRejection>,
    pub strategy: Strategy,
}

/// Chart id and timestamp stamped onto every entry of a run.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub chart_id: &'a str,
    pub observed_at: DateTime<Utc>,
}

/// The three raw fields read from a row before validation.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub rank: String,
    pub title: String,
    pub artist: String,
}

/// A per-source extraction strategy pair.
pub trait ChartExtractor: Send + Sync {
    /// Variant name referenced by `charts.<id>.extractor`.
    fn name(&self) -> &str;

    /// One-line description for `charts status`.
    fn description(&self) -> &str;

    /// Source-specific structural selectors.
    fn primary(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome>;

    /// Looser selectors, tried only when [`primary`](ChartExtractor::primary)
    /// yields no valid entry.
    fn fallback(&self, doc: &Html, ceiling: u32, ctx: &RowContext<'_>) -> Vec<RowOutcome>;

    /// Parse `document` and run primary, then fallback if needed.
    fn extract(
        &self,
        document: &str,
        chart_id: &str,
        ceilings: Ceilings,
        observed_at: DateTime<Utc>,
    ) -> Extraction {
        let doc = Html::parse_document(document);
        let ctx = RowContext {
            chart_id,
            observed_at,
        };

        let (entries, mut skipped) = split_outcomes(self.primary(&doc, ceilings.primary, &ctx));
        if !entries.is_empty() {
            return Extraction {
                entries,
                skipped,
                strategy: Strategy::Primary,
            };
        }

        info!(
            chart = chart_id,
            extractor = self.name(),
            "primary strategy found nothing, trying fallback"
        );
        let (entries, more) = split_outcomes(self.fallback(&doc, ceilings.fallback, &ctx));
        skipped.extend(more);
        let strategy = if entries.is_empty() {
            Strategy::None
        } else {
            Strategy::Fallback
        };
        Extraction {
            entries,
            skipped,
            strategy,
        }
    }
}

fn split_outcomes(outcomes: Vec<RowOutcome>) -> (Vec<ChartEntry>, Vec<RowRejection>) {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(entry) => entries.push(entry),
            Err(reason) => skipped.push(reason),
        }
    }
    (entries, skipped)
}

/// Parse a selector known at compile time.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Element text with whitespace runs collapsed to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first descendant matching `sel`.
pub fn first_text(row: ElementRef<'_>, sel: &Selector) -> Option<String> {
    row.select(sel).next().map(element_text)
}

/// Text of every descendant matching `sel`, joined by spaces.
pub fn all_text(row: ElementRef<'_>, sel: &Selector) -> Option<String> {
    let parts: Vec<String> = row.select(sel).map(element_text).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Innermost elements matching `sel` that hold a full loose row.
///
/// A candidate must carry rank, title and artist descendants (see
/// [`read_loose_row`]). Wrappers around several rows are dropped, and so
/// are field elements whose class shares the row keyword, such as
/// `song-title` inside `div.song`.
pub fn loose_rows<'a>(doc: &'a Html, sel: &Selector) -> Vec<ElementRef<'a>> {
    let holds_row = |el: ElementRef<'_>| read_loose_row(el).is_ok();
    doc.select(sel)
        .filter(|row| holds_row(*row))
        .filter(|row| !row.select(sel).any(holds_row))
        .collect()
}

/// Turn raw row fields into a validated entry.
///
/// Strips bled rank digits from title and artist, then applies the
/// normalizer's validity rules.
pub fn finish_row(rank: u32, raw: &RawRow, ctx: &RowContext<'_>) -> RowOutcome {
    validate(ChartEntry::new(
        strip_rank_prefix(&raw.title),
        strip_rank_prefix(&raw.artist),
        rank,
        ctx.chart_id,
        ctx.observed_at,
    ))
}

/// Read rows in document order until the ceiling is passed.
///
/// `read` extracts the raw fields of one row; a row whose rank exceeds
/// `ceiling` stops collection.
pub fn collect_rows<'a, I, F>(
    rows: I,
    ceiling: u32,
    ctx: &RowContext<'_>,
    strategy: Strategy,
    read: F,
) -> Vec<RowOutcome>
where
    I: IntoIterator<Item = ElementRef<'a>>,
    F: Fn(ElementRef<'a>) -> Result<RawRow, RowRejection>,
{
    let mut out = Vec::new();
    for (index, row) in rows.into_iter().enumerate() {
        let outcome = read(row).and_then(|raw| {
            let rank = parse_rank(&raw.rank)?;
            Ok((rank, raw))
        });
        let (rank, raw) = match outcome {
            Ok(pair) => pair,
            Err(reason) => {
                warn!(chart = ctx.chart_id, %strategy, row = index, %reason, "skipped row");
                out.push(Err(reason));
                continue;
            }
        };

        if rank > ceiling {
            break;
        }

        let result = finish_row(rank, &raw, ctx);
        if let Err(reason) = &result {
            warn!(
                chart = ctx.chart_id,
                %strategy,
                rank,
                title = %raw.title,
                artist = %raw.artist,
                %reason,
                "rejected row"
            );
        }
        out.push(result);
    }
    out
}

/// Loose row reader shared by fallback strategies: the first descendants
/// whose class contains `rank`, `title`, and `artist`.
pub fn read_loose_row(row: ElementRef<'_>) -> Result<RawRow, RowRejection> {
    let rank_sel = selector("[class*=rank]");
    let title_sel = selector("[class*=title]");
    let artist_sel = selector("[class*=artist]");

    let rank = first_text(row, &rank_sel).ok_or(RowRejection::MissingField("rank"))?;
    let title = first_text(row, &title_sel).ok_or(RowRejection::MissingField("title"))?;
    let artist = first_text(row, &artist_sel).ok_or(RowRejection::MissingField("artist"))?;
    Ok(RawRow {
        rank,
        title,
        artist,
    })
}

/// Extractor variants selectable by name.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn ChartExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Registry with every built-in variant.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BillboardJapanExtractor));
        registry.register(Box::new(OriconExtractor));
        registry.register(Box::new(SampleExtractor));
        registry
    }

    /// Add a variant. A later registration replaces one with the same name.
    pub fn register(&mut self, extractor: Box<dyn ChartExtractor>) {
        self.extractors.retain(|e| e.name() != extractor.name());
        self.extractors.push(extractor);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ChartExtractor> {
        self.extractors
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
