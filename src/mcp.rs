//! MCP (Model Context Protocol) server for papershelf.
//! Provides 8 tools: 5 for the download/read pipeline, 3 for paper search.
//! Launch: `papershelf mcp-server --stdio`
//!
//! Every tool parameter is wrapped in `Parameters<T>`; plain structs don't
//! satisfy rmcp's `IntoToolRoute` in v0.15.
//!
//! Tool failures never become protocol errors: each one is an `is_error`
//! result carrying the message, so the calling agent can read and recover.

use std::path::PathBuf;

use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PaperError;
use crate::settings::Settings;
use crate::shelf::Shelf;

// ─── Parameter Structs ───────────────────────────────────────────────────────

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct DownloadParams {
    /// URL of the PDF to download
    url: String,
    /// Filename to store it under (".pdf" is appended when missing)
    filename: Option<String>,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct ReadParams {
    /// Path to a local PDF, e.g. one returned by download_pdf
    path: String,
    /// First page to read, 1-based (default: 1)
    start_page: Option<usize>,
    /// Last page to read, inclusive (default: last page)
    end_page: Option<usize>,
    /// Return the whole document as page chunks sized to fit the context (default: false)
    chunked: Option<bool>,
    /// Preferred pages per chunk when chunked (default: 10)
    chunk_size: Option<usize>,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct DownloadAndReadParams {
    /// URL of the PDF to download
    url: String,
    /// Filename to store it under
    filename: Option<String>,
    /// First page to read (default: 1)
    start_page: Option<usize>,
    /// Last page to read, inclusive (default: 10)
    end_page: Option<usize>,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct ListParams {}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct CleanupParams {}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct ArxivSearchParams {
    /// Free-text query
    query: String,
    /// Maximum number of results (default: 10)
    max_results: Option<u32>,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct SemanticSearchParams {
    /// Free-text query
    query: String,
    /// Maximum number of results (default: 10, max: 100)
    max_results: Option<u32>,
    /// Year filter: "2019" or a range like "2016-2020"
    year: Option<String>,
}

// ─── Tools ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Tools {
    tool_router: ToolRouter<Self>,
    shelf: Shelf,
}

impl Tools {
    fn tool_error(msg: impl Into<String>) -> CallToolResult {
        let mut result = CallToolResult::success(vec![Content::text(msg.into())]);
        result.is_error = Some(true);
        result
    }

    fn tool_ok(value: &impl Serialize) -> CallToolResult {
        let json = serde_json::to_string_pretty(value).unwrap_or_default();
        CallToolResult::success(vec![Content::text(json)])
    }

    fn respond<T: Serialize>(tool: &str, result: Result<T, PaperError>) -> CallToolResult {
        match result {
            Ok(value) => Self::tool_ok(&value),
            Err(e) => {
                warn!(tool, error = %e, "Tool call failed");
                Self::tool_error(e.to_string())
            }
        }
    }
}

// ─── Tool Implementations ────────────────────────────────────────────────────

#[tool_router]
impl Tools {
    fn new(shelf: Shelf) -> Self {
        Self {
            tool_router: Self::tool_router(),
            shelf,
        }
    }

    // ── Pipeline Tools ───────────────────────────────────────────────────

    #[tool(description = "Download a PDF from a URL into local storage. If a paywalled publisher refuses, an open-access copy is looked up on arXiv and downloaded instead. Returns the local path.")]
    async fn download_pdf(
        &self,
        Parameters(p): Parameters<DownloadParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(url = %p.url, "download_pdf");
        let result = self.shelf.download_pdf(&p.url, p.filename.as_deref()).await;
        Ok(Self::respond("download_pdf", result))
    }

    #[tool(description = "Extract text from a local PDF. Reads a page range, or with chunked=true the whole document split into page chunks sized to fit the context window.")]
    async fn read_pdf_text(
        &self,
        Parameters(p): Parameters<ReadParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(path = %p.path, chunked = p.chunked.unwrap_or(false), "read_pdf_text");
        let result = self
            .shelf
            .read_pdf_text(
                &PathBuf::from(&p.path),
                p.start_page,
                p.end_page,
                p.chunked.unwrap_or(false),
                p.chunk_size,
            )
            .await;
        Ok(Self::respond("read_pdf_text", result))
    }

    #[tool(description = "Download a PDF and read a page range from it in one step (default pages 1-10). Includes next_range when more pages remain.")]
    async fn download_and_read(
        &self,
        Parameters(p): Parameters<DownloadAndReadParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(url = %p.url, "download_and_read");
        let result = self
            .shelf
            .download_and_read(&p.url, p.filename.as_deref(), p.start_page, p.end_page)
            .await;
        Ok(Self::respond("download_and_read", result))
    }

    #[tool(description = "List downloaded PDFs (absolute paths).")]
    async fn list_downloaded(
        &self,
        Parameters(_p): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(Self::respond("list_downloaded", self.shelf.list_downloaded().await))
    }

    #[tool(description = "Delete every downloaded file. Returns how many were removed.")]
    async fn cleanup(
        &self,
        Parameters(_p): Parameters<CleanupParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(Self::respond("cleanup", self.shelf.cleanup().await))
    }

    // ── Search Tools ─────────────────────────────────────────────────────

    #[tool(description = "Search arXiv. Results include a pdf_url that download_pdf accepts.")]
    async fn search_arxiv(
        &self,
        Parameters(p): Parameters<ArxivSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.shelf.search_arxiv(&p.query, p.max_results).await;
        Ok(Self::respond("search_arxiv", result.map(|results| serde_json::json!({
            "results": results,
            "total": results.len(),
        }))))
    }

    #[tool(description = "Search Semantic Scholar, newest first. pdf_url is set when an open-access PDF is known.")]
    async fn search_semantic_scholar(
        &self,
        Parameters(p): Parameters<SemanticSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .shelf
            .search_semantic_scholar(&p.query, p.max_results, p.year.as_deref())
            .await;
        Ok(Self::respond("search_semantic_scholar", result.map(|results| serde_json::json!({
            "results": results,
            "total": results.len(),
        }))))
    }

    #[tool(description = "Search arXiv and Semantic Scholar at once. A failing source reports an error without hiding the other's results.")]
    async fn search_all(
        &self,
        Parameters(p): Parameters<SemanticSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let combined = self
            .shelf
            .search_all(&p.query, p.max_results, p.year.as_deref())
            .await;
        Ok(Self::tool_ok(&combined))
    }
}

// ─── ServerHandler ───────────────────────────────────────────────────────────

#[tool_handler]
impl ServerHandler for Tools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "papershelf: find papers, download their PDFs and read them page by page. \
                 Downloads are stored in {}.",
                self.shelf.storage().dir().display()
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ─── Entry Point ─────────────────────────────────────────────────────────────

pub async fn run_mcp_server(settings: Settings) -> Result<(), String> {
    let shelf = Shelf::new(&settings)?;
    info!(storage = %shelf.storage().dir().display(), "Starting MCP server on stdio");
    let tools = Tools::new(shelf);

    let service = tools
        .serve(stdio())
        .await
        .map_err(|e| format!("MCP server error: {}", e))?;
    service
        .waiting()
        .await
        .map_err(|e| format!("MCP server terminated: {}", e))?;
    Ok(())
}
