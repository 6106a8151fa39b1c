//! PDF download with open-access fallback
//!
//! Flow for one `download` call:
//! 1. GET the URL (bounded timeout, explicit user-agent) and check the bytes
//!    are a PDF
//! 2. On transport failure or a non-PDF body from a paywalled publisher,
//!    guess the title, look for an open-access copy on arXiv and try that URL
//!    instead. At most one such hop: `Attempt::Fallback` has no successor.
//! 3. Persist under a derived filename; the storage layer deletes anything
//!    that doesn't carry the PDF signature on disk

use std::path::PathBuf;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::arxiv::ArxivClient;
use super::filename::resolve_filename;
use super::paywall::{derive_title, is_paywalled};
use super::validate::is_valid_pdf;
use crate::error::{PaperError, Result};
use crate::storage::Storage;

/// Which source a fetch is reading from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The URL the caller asked for
    Primary,
    /// An open-access substitute found after the primary failed
    Fallback,
}

impl Attempt {
    /// The attempt allowed after this one fails, if any.
    pub fn next(self) -> Option<Attempt> {
        match self {
            Attempt::Primary => Some(Attempt::Fallback),
            Attempt::Fallback => None,
        }
    }
}

#[derive(Clone)]
pub struct PdfFetcher {
    client: Client,
    storage: Storage,
    resolver: ArxivClient,
    max_bytes: usize,
}

impl PdfFetcher {
    pub fn new(client: Client, storage: Storage, resolver: ArxivClient, max_bytes: usize) -> Self {
        Self {
            client,
            storage,
            resolver,
            max_bytes,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Download `url` into storage and return the absolute local path.
    ///
    /// `filename` only applies to the primary URL; a fallback download is
    /// named after the open-access source it actually came from.
    pub async fn download(&self, url: &str, filename: Option<&str>) -> Result<PathBuf> {
        let mut attempt = Attempt::Primary;
        let mut target = url.to_string();
        let mut hint = filename.map(str::to_string);

        loop {
            match self.fetch(&target, attempt).await {
                Ok(bytes) => {
                    let name = resolve_filename(&target, hint.as_deref());
                    return self.storage.persist_pdf(&name, &bytes, &target).await;
                }
                Err(err) => {
                    let Some(next) = attempt.next() else {
                        return Err(err);
                    };
                    let Some(fallback) = self.open_access_url(&target, hint.as_deref(), &err).await else {
                        return Err(err);
                    };
                    info!(original = %target, fallback = %fallback, "Retrying via open-access copy");
                    attempt = next;
                    target = fallback;
                    hint = None;
                }
            }
        }
    }

    /// GET `url` and return the body if it is a PDF.
    async fn fetch(&self, url: &str, attempt: Attempt) -> Result<Vec<u8>> {
        debug!(url, ?attempt, "Fetching PDF");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/pdf,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| PaperError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaperError::transport(url, format!("HTTP status {}", status)));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(PaperError::transport(url, format!("PDF too large: {} MB", len / 1024 / 1024)));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PaperError::transport(url, format!("failed to read body: {}", e)))?;

        if bytes.len() > self.max_bytes {
            return Err(PaperError::transport(
                url,
                format!("PDF too large: {} MB", bytes.len() / 1024 / 1024),
            ));
        }
        if !is_valid_pdf(&bytes) {
            return Err(PaperError::InvalidFormat(url.to_string()));
        }
        Ok(bytes.to_vec())
    }

    /// Open-access substitute for a failed paywalled download, if one can be
    /// found. Never fails: every problem just means "no fallback".
    async fn open_access_url(&self, url: &str, hint: Option<&str>, err: &PaperError) -> Option<String> {
        if !matches!(err, PaperError::Transport { .. } | PaperError::InvalidFormat(_)) {
            return None;
        }
        if !is_paywalled(url) {
            debug!(url, "Not a known paywalled publisher, no fallback");
            return None;
        }
        let Some(title) = derive_title(url, hint) else {
            debug!(url, "No usable title for open-access lookup");
            return None;
        };

        warn!(url, error = %err, title = %title, "Paywalled download failed, searching open-access copy");
        let found = self.resolver.find_open_access(&title).await;
        if found.is_none() {
            info!(title = %title, "No open-access copy found");
        }
        found
    }
}
