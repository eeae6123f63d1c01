//! Verse segmentation and windowing
//!
//! A song's lyric text is split on `'\n'` into verses. Verses are recomputed
//! on every request and never stored.

use serde::{Deserialize, Serialize};

const DELIMITER: char = '\n';

/// Split lyric text into verses.
///
/// Blank lines stay as empty verses and nothing is trimmed, so joining the
/// result with `'\n'` gives back the input.
pub fn segment(text: &str) -> Vec<String> {
    text.split(DELIMITER).map(str::to_string).collect()
}

/// Half-open range `[start, end)` of verse indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseWindow {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("page out of range")]
pub struct PageOutOfRange;

/// Compute the verse window for `offset` pages of `page_size` verses.
///
/// The start index is `offset * page_size`; the end is clamped to `total`.
pub fn window(total: usize, page_size: usize, offset: usize) -> Result<VerseWindow, PageOutOfRange> {
    let start = offset.saturating_mul(page_size);
    if start >= total {
        return Err(PageOutOfRange);
    }
    let end = start.saturating_add(page_size).min(total);
    Ok(VerseWindow { start, end })
}

/// How the verses endpoint maps `page`/`pageSize` onto the verse list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagingMode {
    /// The row offset derived from the page is reused both as the store
    /// offset and as the page index fed to [`window`], so the first verse
    /// of page `p` is `(p - 1) * size * size`. Kept for client compatibility.
    #[default]
    Legacy,
    /// Page `p` covers verses `[(p - 1) * size, p * size)` of the first match.
    Page,
}

/// Row offset for a 1-based page.
pub fn page_offset(page: u32, page_size: u32) -> u32 {
    page.saturating_sub(1).saturating_mul(page_size)
}
