//! Budget-fitting chunked reads
//!
//! A chunked read returns the whole document as consecutive page chunks.
//! The chunk size starts small and keeps halving until the serialized
//! response fits the token budget; when even single-page chunks don't fit,
//! the caller gets page 1 alone, hard-truncated.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::extractor::{run_blocking, PageRange, PdfDocument};
use crate::error::Result;
use crate::utils::truncate_chars;

/// Chunk sizes start here even when the caller asks for more.
pub const MAX_INITIAL_CHUNK_SIZE: usize = 2;

/// Rough characters-per-token ratio used for budgeting.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub start_page: usize,
    pub end_page: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSet {
    pub total_pages: usize,
    pub chunk_size: usize,
    pub chunks: Vec<Chunk>,
    /// Only page 1, cut to the character limit
    pub truncated: bool,
}

/// Split `[1, total]` into consecutive ranges of `size` pages; the last one
/// may be shorter.
pub fn chunk_ranges(total: usize, size: usize) -> Vec<PageRange> {
    if size == 0 {
        return Vec::new();
    }
    (0..total.div_ceil(size))
        .map(|i| PageRange {
            start: i * size + 1,
            end: ((i + 1) * size).min(total),
        })
        .collect()
}

pub fn estimate_tokens<T: Serialize>(value: &T) -> usize {
    serde_json::to_string_pretty(value)
        .map(|s| s.len() / CHARS_PER_TOKEN)
        .unwrap_or(usize::MAX)
}

/// Largest chunk size (starting at `min(requested, 2)`, halving) whose
/// chunk set fits `budget` tokens. Sizes whose production fails are
/// skipped like oversized ones. `None` once the size would drop below 1.
pub fn fit_chunks<F, E>(requested: usize, budget: usize, mut produce: F) -> Option<ChunkSet>
where
    F: FnMut(usize) -> std::result::Result<ChunkSet, E>,
    E: std::fmt::Display,
{
    let mut size = requested.clamp(1, MAX_INITIAL_CHUNK_SIZE);
    while size >= 1 {
        match produce(size) {
            Ok(set) => {
                let tokens = estimate_tokens(&set);
                if tokens <= budget {
                    debug!(chunk_size = size, tokens, budget, "Chunk set fits budget");
                    return Some(set);
                }
                debug!(chunk_size = size, tokens, budget, "Chunk set over budget, shrinking");
            }
            Err(e) => {
                warn!(chunk_size = size, error = %e, "Chunk extraction failed, shrinking");
            }
        }
        size /= 2;
    }
    None
}

impl PdfDocument {
    /// Every page of the document in `chunk_size`-page chunks.
    pub fn chunked(&self, chunk_size: usize) -> Result<ChunkSet> {
        let total = self.page_count();
        let chunks = chunk_ranges(total, chunk_size)
            .into_iter()
            .map(|range| {
                Ok(Chunk {
                    start_page: range.start,
                    end_page: range.end,
                    text: self.range_text(range)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ChunkSet {
            total_pages: total,
            chunk_size,
            chunks,
            truncated: false,
        })
    }

    /// Budget-fitted chunks, or the truncated first page when nothing fits.
    pub fn chunked_within_budget(&self, requested: usize, budget: usize, truncate_at: usize) -> Result<ChunkSet> {
        if let Some(set) = fit_chunks(requested, budget, |size| self.chunked(size)) {
            return Ok(set);
        }

        let first = self.resolve_range(Some(1), Some(1))?;
        let text = self.range_text(first)?;
        warn!(
            path = %self.path().display(),
            total_pages = self.page_count(),
            "No chunk size fits the budget, returning truncated first page"
        );
        Ok(ChunkSet {
            total_pages: self.page_count(),
            chunk_size: 1,
            chunks: vec![Chunk {
                start_page: 1,
                end_page: 1,
                text: truncate_chars(&text, truncate_at).to_string(),
            }],
            truncated: true,
        })
    }
}

pub async fn read_chunked(path: &Path, requested: usize, budget: usize, truncate_at: usize) -> Result<ChunkSet> {
    let owned = path.to_path_buf();
    run_blocking(path, move || {
        PdfDocument::open(&owned)?.chunked_within_budget(requested, budget, truncate_at)
    })
    .await
}
