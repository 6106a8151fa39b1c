//! arXiv export API client
//!
//! Backs the `search_arxiv` tool and the open-access fallback for paywalled
//! downloads. No API key required; arXiv asks for polite request rates.
//! API docs: https://info.arxiv.org/help/api/user-manual.html

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{normalize_whitespace, PaperResult};
use crate::error::{PaperError, Result};

const PDF_MIME: &str = "application/pdf";
const FALLBACK_MAX_RESULTS: u32 = 5;

static NEW_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}\.\d{4,5})(?:v\d+)?").expect("static regex"));
static OLD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z\-]+(?:\.[A-Z]{2})?/\d{7})").expect("static regex"));

// ─── Atom feed ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@type", default)]
    mime: Option<String>,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

impl AtomEntry {
    fn pdf_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.mime.as_deref() == Some(PDF_MIME))
            .map(|l| l.href.as_str())
    }

    fn doi(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.title.as_deref() == Some("doi"))
            .map(|l| {
                l.href
                    .trim_start_matches("http://dx.doi.org/")
                    .trim_start_matches("https://doi.org/")
                    .to_string()
            })
    }

    fn into_result(self) -> PaperResult {
        let pdf_url = self.pdf_link().map(str::to_string);
        let doi = self.doi();
        let id = extract_arxiv_id(&self.id).unwrap_or_else(|| self.id.clone());
        let year = self
            .published
            .as_deref()
            .and_then(|p| p.get(0..4))
            .and_then(|y| y.parse().ok());

        PaperResult {
            id,
            title: normalize_whitespace(&self.title),
            authors: self.authors.into_iter().map(|a| normalize_whitespace(&a.name)).collect(),
            abstract_text: self.summary.as_deref().map(normalize_whitespace),
            year,
            published: self.published,
            url: self.id,
            pdf_url,
            doi,
            source: "arxiv".to_string(),
        }
    }
}

fn parse_feed(xml: &str) -> Result<Vec<AtomEntry>> {
    let feed: AtomFeed = quick_xml::de::from_str(xml)
        .map_err(|e| PaperError::search("arXiv", format!("invalid Atom feed: {}", e)))?;
    Ok(feed.entries)
}

/// Extract an arXiv ID from an abs/pdf URL or bare identifier
///
/// - `http://arxiv.org/abs/2301.12345v2` → `2301.12345`
/// - `arXiv:hep-th/9901001` → `hep-th/9901001`
pub fn extract_arxiv_id(text: &str) -> Option<String> {
    if let Some(caps) = NEW_ID_RE.captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    OLD_ID_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Drop punctuation so a title survives arXiv's query parser.
fn strip_punctuation(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    normalize_whitespace(&cleaned)
}

// ─── Client ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ArxivClient {
    client: Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn query(&self, search_query: &str, max_results: u32) -> Result<Vec<AtomEntry>> {
        debug!(search_query, max_results, "arXiv query");
        let max = max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", search_query),
                ("start", "0"),
                ("max_results", max.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| PaperError::search("arXiv", e))?;

        if !response.status().is_success() {
            return Err(PaperError::search(
                "arXiv",
                format!("API returned status {}", response.status()),
            ));
        }

        let xml = response
            .text()
            .await
            .map_err(|e| PaperError::search("arXiv", format!("failed to read response: {}", e)))?;
        parse_feed(&xml)
    }

    /// Keyword search over all fields, most relevant first.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<PaperResult>> {
        let entries = self.query(&format!("all:{}", query), max_results).await?;
        Ok(entries.into_iter().map(AtomEntry::into_result).collect())
    }

    /// Look for an open-access PDF of `title`.
    ///
    /// Tries an exact title phrase first, then the punctuation-free words.
    /// Any failure counts as "not found": this is a best-effort helper and
    /// never fails the caller.
    pub async fn find_open_access(&self, title: &str) -> Option<String> {
        let attempts = [
            format!("ti:\"{}\"", title),
            format!("ti:{}", strip_punctuation(title)),
        ];

        for search_query in &attempts {
            match self.query(search_query, FALLBACK_MAX_RESULTS).await {
                Ok(entries) if entries.is_empty() => {
                    debug!(search_query, "No arXiv entries for title");
                }
                Ok(entries) => {
                    let link = entries[0].pdf_link().map(str::to_string);
                    debug!(search_query, ?link, "arXiv fallback lookup");
                    return link;
                }
                Err(e) => {
                    warn!(search_query, error = %e, "arXiv fallback lookup failed");
                    return None;
                }
            }
        }
        None
    }
}
