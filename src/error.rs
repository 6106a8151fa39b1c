//! Error types shared by the fetch, extraction and search layers.

use std::path::PathBuf;

/// Errors surfaced by the PDF pipeline and the search clients.
///
/// Every variant renders to a message suitable for the tool boundary; the MCP
/// layer turns these into error markers instead of propagating them.
#[derive(Debug, thiserror::Error)]
pub enum PaperError {
    /// Referenced local file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Downloaded bytes do not start with the PDF signature.
    #[error("Downloaded file from {0} is not a valid PDF")]
    InvalidFormat(String),

    /// Network fetch failed (timeout, DNS, non-2xx).
    #[error("Failed to download {url}: {reason}")]
    Transport { url: String, reason: String },

    /// PDF structure failed to parse.
    #[error("Failed to read PDF {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    /// Requested page range is empty or outside the document.
    #[error("Invalid page range {start}-{end} (document has {total} pages)")]
    InvalidRange { start: usize, end: usize, total: usize },

    /// Search backend failed or returned something unparseable.
    #[error("{source_name} search failed: {reason}")]
    Search { source_name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PaperError {
    pub fn transport(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::Extraction {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn search(source_name: &str, reason: impl std::fmt::Display) -> Self {
        Self::Search {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PaperError>;
