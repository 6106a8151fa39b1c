//! PDF acquisition and text extraction for research papers
//!
//! Pipeline:
//! 1. `fetcher` downloads a PDF (with one open-access fallback hop for
//!    paywalled publishers, resolved through `arxiv`)
//! 2. `storage` persists it under a name from `filename`
//! 3. `extractor` reads page ranges; `chunker` fits them into a token budget
//!
//! `arxiv` and `semantic_scholar` also back the search tools.

pub mod arxiv;
pub mod chunker;
pub mod extractor;
pub mod fetcher;
pub mod filename;
pub mod paywall;
pub mod semantic_scholar;
pub mod validate;

use serde::{Deserialize, Serialize};

/// One search hit, normalized across sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperResult {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    /// ISO date when the source provides one
    pub published: Option<String>,
    pub url: String,
    pub pdf_url: Option<String>,
    pub doi: Option<String>,
    /// "arxiv" or "semantic_scholar"
    pub source: String,
}

/// Collapse runs of whitespace (feeds wrap titles and abstracts).
pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
