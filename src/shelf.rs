//! Pipeline operations shared by the MCP tools and the CLI
//!
//! Every method returns a serializable payload; the MCP layer pretty-prints
//! it as the tool result and the CLI prints it as JSON or plain text.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::papers::arxiv::ArxivClient;
use crate::papers::chunker::{read_chunked, ChunkSet};
use crate::papers::extractor::{extract_text, ExtractedRange};
use crate::papers::fetcher::PdfFetcher;
use crate::papers::semantic_scholar::SemanticScholarClient;
use crate::papers::PaperResult;
use crate::settings::Settings;
use crate::storage::Storage;

/// Default window for `download_and_read`
pub const DEFAULT_READ_START: usize = 1;
pub const DEFAULT_READ_END: usize = 10;
pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct DownloadPayload {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextRange {
    pub start_page: usize,
    pub end_page: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadPayload {
    pub path: PathBuf,
    pub total_pages: usize,
    pub start_page: usize,
    pub end_page: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_range: Option<NextRange>,
    pub text: String,
}

impl ReadPayload {
    fn new(path: PathBuf, read: ExtractedRange) -> Self {
        Self {
            path,
            total_pages: read.total_pages,
            start_page: read.range.start,
            end_page: read.range.end,
            has_more: read.has_more(),
            next_range: None,
            text: read.text,
        }
    }

    /// Attach the following window of `width` pages, if any pages remain.
    fn with_next_range(mut self, width: usize) -> Self {
        self.next_range = next_range(self.end_page, width, self.total_pages);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkedPayload {
    pub path: PathBuf,
    #[serde(flatten)]
    pub set: ChunkSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListPayload {
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupPayload {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReadOutcome {
    Range(ReadPayload),
    Chunked(ChunkedPayload),
}

/// One source's share of a combined search; a failing source doesn't sink
/// the other.
#[derive(Debug, Clone, Serialize)]
pub struct SourceResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<PaperResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Vec<PaperResult>>> for SourceResults {
    fn from(result: Result<Vec<PaperResult>>) -> Self {
        match result {
            Ok(papers) => Self {
                results: Some(papers),
                error: None,
            },
            Err(e) => Self {
                results: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedSearch {
    pub arxiv: SourceResults,
    pub semantic_scholar: SourceResults,
}

/// The window after `end` with the same `width`, clamped to `total`.
pub fn next_range(end: usize, width: usize, total: usize) -> Option<NextRange> {
    if end >= total {
        return None;
    }
    let start_page = end + 1;
    Some(NextRange {
        start_page,
        end_page: (end + width.max(1)).min(total),
    })
}

#[derive(Clone)]
pub struct Shelf {
    fetcher: PdfFetcher,
    arxiv: ArxivClient,
    semantic: SemanticScholarClient,
    token_budget: usize,
    truncate_chars: usize,
}

impl Shelf {
    pub fn new(settings: &Settings) -> std::result::Result<Self, String> {
        let client = settings.http_client()?;
        let storage = Storage::new(&settings.storage_dir);
        let arxiv = ArxivClient::new(client.clone(), settings.arxiv_api_url.clone());
        let semantic = SemanticScholarClient::new(
            client.clone(),
            settings.semantic_scholar_api_url.clone(),
            settings.semantic_scholar_api_key.clone(),
        );
        let fetcher = PdfFetcher::new(client, storage, arxiv.clone(), settings.max_pdf_bytes);
        Ok(Self {
            fetcher,
            arxiv,
            semantic,
            token_budget: settings.token_budget,
            truncate_chars: settings.truncate_chars,
        })
    }

    pub fn storage(&self) -> &Storage {
        self.fetcher.storage()
    }

    pub async fn download_pdf(&self, url: &str, filename: Option<&str>) -> Result<DownloadPayload> {
        let path = self.fetcher.download(url, filename).await?;
        Ok(DownloadPayload { path })
    }

    pub async fn read_range(&self, path: &Path, start: Option<usize>, end: Option<usize>) -> Result<ReadPayload> {
        let read = extract_text(path, start, end).await?;
        info!(
            path = %path.display(),
            start = read.range.start,
            end = read.range.end,
            total = read.total_pages,
            "Read PDF pages"
        );
        Ok(ReadPayload::new(path.to_path_buf(), read))
    }

    pub async fn read_chunked(&self, path: &Path, chunk_size: Option<usize>) -> Result<ChunkedPayload> {
        let requested = chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1);
        let set = read_chunked(path, requested, self.token_budget, self.truncate_chars).await?;
        info!(
            path = %path.display(),
            chunk_size = set.chunk_size,
            chunks = set.chunks.len(),
            truncated = set.truncated,
            "Read PDF in chunks"
        );
        Ok(ChunkedPayload {
            path: path.to_path_buf(),
            set,
        })
    }

    pub async fn read_pdf_text(
        &self,
        path: &Path,
        start: Option<usize>,
        end: Option<usize>,
        chunked: bool,
        chunk_size: Option<usize>,
    ) -> Result<ReadOutcome> {
        if chunked {
            self.read_chunked(path, chunk_size).await.map(ReadOutcome::Chunked)
        } else {
            self.read_range(path, start, end).await.map(ReadOutcome::Range)
        }
    }

    pub async fn download_and_read(
        &self,
        url: &str,
        filename: Option<&str>,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<ReadPayload> {
        let start = start.unwrap_or(DEFAULT_READ_START).max(1);
        let end = end.unwrap_or(DEFAULT_READ_END);
        let width = end.saturating_sub(start) + 1;

        let path = self.fetcher.download(url, filename).await?;
        let payload = self.read_range(&path, Some(start), Some(end)).await?;
        Ok(payload.with_next_range(width))
    }

    pub async fn list_downloaded(&self) -> Result<ListPayload> {
        let files = self.storage().list_pdfs().await?;
        Ok(ListPayload { files })
    }

    pub async fn cleanup(&self) -> Result<CleanupPayload> {
        let removed = self.storage().cleanup().await?;
        Ok(CleanupPayload { removed })
    }

    pub async fn search_arxiv(&self, query: &str, max_results: Option<u32>) -> Result<Vec<PaperResult>> {
        self.arxiv
            .search(query, max_results.unwrap_or(DEFAULT_SEARCH_LIMIT))
            .await
    }

    pub async fn search_semantic_scholar(
        &self,
        query: &str,
        max_results: Option<u32>,
        year: Option<&str>,
    ) -> Result<Vec<PaperResult>> {
        self.semantic
            .search(query, max_results.unwrap_or(DEFAULT_SEARCH_LIMIT), year)
            .await
    }

    /// Both sources concurrently.
    pub async fn search_all(&self, query: &str, max_results: Option<u32>, year: Option<&str>) -> CombinedSearch {
        let (arxiv, semantic) = tokio::join!(
            self.search_arxiv(query, max_results),
            self.search_semantic_scholar(query, max_results, year),
        );
        CombinedSearch {
            arxiv: arxiv.into(),
            semantic_scholar: semantic.into(),
        }
    }
}
