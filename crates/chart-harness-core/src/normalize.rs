//! Entry normalization and validation.
//!
//! Validation is total: every candidate either becomes a clean
//! [`ChartEntry`] or yields a typed [`RowRejection`]. Malformed input is an
//! expected outcome, never an error that aborts a crawl.
//!
//! # Rules
//!
//! | Rule | Rejection |
//! |------|-----------|
//! | rank text must be ASCII digits | [`RowRejection::MalformedRank`] |
//! | rank must be positive | [`RowRejection::RankOutOfRange`] |
//! | title and artist must not be blank | [`RowRejection::BlankField`] |
//! | title and artist must be longer than one character | [`RowRejection::TooShort`] |
//! | title must differ from artist | [`RowRejection::TitleEqualsArtist`] |
//! | artist must not be `"Unknown"` | [`RowRejection::UnknownArtist`] |

use thiserror::Error;
use tracing::warn;

use crate::models::{ChartEntry, UNKNOWN_ARTIST};

/// Why a single row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("malformed rank text {0:?}")]
    MalformedRank(String),
    #[error("rank {0} out of range")]
    RankOutOfRange(u64),
    #[error("blank {0}")]
    BlankField(&'static str),
    #[error("{0} too short")]
    TooShort(&'static str),
    #[error("title equals artist")]
    TitleEqualsArtist,
    #[error("artist is the \"Unknown\" placeholder")]
    UnknownArtist,
}

/// Parse rank text. Only a run of ASCII digits with surrounding whitespace
/// is accepted; `"12abc"` and `"-3"` are malformed, `"0"` is out of range.
pub fn parse_rank(text: &str) -> Result<u32, RowRejection> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RowRejection::MalformedRank(trimmed.to_string()));
    }
    let value: u64 = trimmed
        .parse()
        .map_err(|_| RowRejection::MalformedRank(trimmed.to_string()))?;
    match u32::try_from(value) {
        Ok(0) => Err(RowRejection::RankOutOfRange(0)),
        Ok(rank) => Ok(rank),
        Err(_) => Err(RowRejection::RankOutOfRange(value)),
    }
}

/// Remove rank digits that bled into a text field (`"12 Pretender"` →
/// `"Pretender"`).
pub fn strip_rank_prefix(text: &str) -> String {
    text.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim()
        .to_string()
}

/// Whether a title/artist pair satisfies the validity invariant.
///
/// Shared by [`validate`] and the invalid-record purge so the two can never
/// disagree.
pub fn is_valid_pair(title: &str, artist: &str) -> bool {
    check_pair(title.trim(), artist.trim()).is_ok()
}

fn check_pair(title: &str, artist: &str) -> Result<(), RowRejection> {
    if title.is_empty() {
        return Err(RowRejection::BlankField("title"));
    }
    if artist.is_empty() {
        return Err(RowRejection::BlankField("artist"));
    }
    if title.chars().count() <= 1 {
        return Err(RowRejection::TooShort("title"));
    }
    if artist.chars().count() <= 1 {
        return Err(RowRejection::TooShort("artist"));
    }
    if title == artist {
        return Err(RowRejection::TitleEqualsArtist);
    }
    Ok(())
}

/// Trim and validate one candidate entry.
pub fn validate(entry: ChartEntry) -> Result<ChartEntry, RowRejection> {
    let title = entry.title.trim().to_string();
    let artist = entry.artist.trim().to_string();

    if entry.rank == 0 {
        return Err(RowRejection::RankOutOfRange(0));
    }
    check_pair(&title, &artist)?;
    if artist == UNKNOWN_ARTIST {
        return Err(RowRejection::UnknownArtist);
    }

    Ok(ChartEntry {
        title,
        artist,
        ..entry
    })
}

/// Output of [`normalize_batch`].
#[derive(Debug, Default)]
pub struct Normalized {
    /// Valid entries, in input order.
    pub entries: Vec<ChartEntry>,
    /// Rejected candidates with their reason.
    pub rejected: Vec<(ChartEntry, RowRejection)>,
}

/// Validate a batch, preserving order and dropping invalid candidates.
pub fn normalize_batch(candidates: Vec<ChartEntry>) -> Normalized {
    let mut out = Normalized::default();
    for candidate in candidates {
        match validate(candidate.clone()) {
            Ok(entry) => out.entries.push(entry),
            Err(reason) => {
                warn!(
                    chart = %candidate.chart_id,
                    rank = candidate.rank,
                    title = %candidate.title,
                    artist = %candidate.artist,
                    %reason,
                    "rejected chart entry"
                );
                out.rejected.push((candidate, reason));
            }
        }
    }
    out
}
