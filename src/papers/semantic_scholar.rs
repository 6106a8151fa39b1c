//! Semantic Scholar Graph API client
//!
//! Rate limit: shared pool without a key (expect 429s under load)
//! API key: optional, sent as `x-api-key`
//! API docs: https://api.semanticscholar.org/api-docs/graph

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{normalize_whitespace, PaperResult};
use crate::error::{PaperError, Result};

const SEARCH_FIELDS: &str = "title,authors,year,abstract,url,openAccessPdf,externalIds,publicationDate";
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawPaper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaper {
    paper_id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    url: Option<String>,
    publication_date: Option<String>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
    open_access_pdf: Option<RawOpenAccessPdf>,
    external_ids: Option<RawExternalIds>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

impl From<RawPaper> for PaperResult {
    fn from(raw: RawPaper) -> Self {
        let url = raw
            .url
            .unwrap_or_else(|| format!("https://www.semanticscholar.org/paper/{}", raw.paper_id));
        Self {
            id: raw.paper_id,
            title: raw.title.as_deref().map(normalize_whitespace).unwrap_or_default(),
            authors: raw.authors.into_iter().filter_map(|a| a.name).collect(),
            abstract_text: raw.abstract_text,
            year: raw.year,
            published: raw.publication_date,
            url,
            pdf_url: raw
                .open_access_pdf
                .and_then(|p| p.url)
                .filter(|u| !u.is_empty()),
            doi: raw.external_ids.and_then(|ids| ids.doi),
            source: "semantic_scholar".to_string(),
        }
    }
}

/// Newest first; papers without a year go last. Stable for equal years.
pub fn sort_by_year_desc(papers: &mut [PaperResult]) {
    papers.sort_by(|a, b| b.year.cmp(&a.year));
}

#[derive(Clone)]
pub struct SemanticScholarClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Relevance search, re-sorted newest first. `year` accepts the API's
    /// `2019` or `2016-2020` forms.
    pub async fn search(&self, query: &str, max_results: u32, year: Option<&str>) -> Result<Vec<PaperResult>> {
        let limit = max_results.clamp(1, MAX_LIMIT).to_string();
        let mut params = vec![("query", query), ("limit", limit.as_str()), ("fields", SEARCH_FIELDS)];
        if let Some(year) = year.filter(|y| !y.trim().is_empty()) {
            params.push(("year", year));
        }
        debug!(query, limit = %limit, ?year, "Semantic Scholar search");

        let mut request = self
            .client
            .get(format!("{}/paper/search", self.base_url))
            .query(&params);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaperError::search("Semantic Scholar", e))?;

        if !response.status().is_success() {
            return Err(PaperError::search(
                "Semantic Scholar",
                format!("API returned status {}", response.status()),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| PaperError::search("Semantic Scholar", format!("failed to parse response: {}", e)))?;

        let mut papers: Vec<PaperResult> = body.data.into_iter().map(PaperResult::from).collect();
        sort_by_year_desc(&mut papers);
        Ok(papers)
    }
}
