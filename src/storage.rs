//! Local PDF storage
//!
//! One flat directory shared by every request. Created lazily on first write
//! and never locked; writes land under a unique `.part` name and are renamed
//! into place so a reader never sees a half-written PDF.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::error::{PaperError, Result};
use crate::papers::validate::{is_valid_pdf, PDF_MAGIC};

const PARTIAL_SUFFIX: &str = ".part";

#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let dir = std::path::absolute(&dir).unwrap_or(dir);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if needed. Safe to call any number of times.
    pub async fn ensure(&self) -> Result<&Path> {
        fs::create_dir_all(&self.dir).await?;
        Ok(&self.dir)
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Write `bytes` under `filename`, then check the signature of what
    /// actually reached the disk. Invalid content is deleted before the
    /// error is returned, so the directory only ever holds real PDFs.
    pub async fn persist_pdf(&self, filename: &str, bytes: &[u8], source_url: &str) -> Result<PathBuf> {
        self.ensure().await?;
        let final_path = self.path_for(filename);
        let tmp_path = self
            .dir
            .join(format!(".{}{}", uuid::Uuid::new_v4(), PARTIAL_SUFFIX));

        // Every failure past this point removes the partial file.
        if let Err(e) = stage(&tmp_path, &final_path, bytes, source_url).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        info!(path = %final_path.display(), bytes = bytes.len(), "Saved PDF");
        Ok(final_path)
    }

    /// Absolute paths of every `.pdf` file, sorted by name.
    pub async fn list_pdfs(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_pdf = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false);
            if is_pdf && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete every file in the directory. Returns how many were removed;
    /// an empty or missing directory is not an error.
    pub async fn cleanup(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        debug!(dir = %self.dir.display(), removed, "Cleaned storage directory");
        Ok(removed)
    }
}

async fn stage(tmp_path: &Path, final_path: &Path, bytes: &[u8], source_url: &str) -> Result<()> {
    fs::write(tmp_path, bytes).await?;
    if !has_pdf_signature(tmp_path).await? {
        return Err(PaperError::InvalidFormat(source_url.to_string()));
    }
    fs::rename(tmp_path, final_path).await?;
    Ok(())
}

async fn has_pdf_signature(path: &Path) -> Result<bool> {
    let mut file = fs::File::open(path).await?;
    let mut head = [0u8; PDF_MAGIC.len()];
    let mut read = 0;
    while read < head.len() {
        let n = file.read(&mut head[read..]).await?;
        if n == 0 {
            break;
        }
        read += n;
    }
    Ok(is_valid_pdf(&head[..read]))
}
