//! Runtime settings
//!
//! Loaded once at startup from an optional JSON file, then overridden by
//! environment variables. The resulting `Settings` value is passed to every
//! component explicitly; nothing reads it from global state.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the system temp dir; stable so repeated runs reuse it.
pub const STORAGE_DIR_NAME: &str = "papershelf_pdfs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Where downloaded PDFs live (default: `<temp>/papershelf_pdfs`)
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Sent on every request; some index servers reject default agents
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_arxiv_api_url")]
    pub arxiv_api_url: String,
    #[serde(default = "default_semantic_scholar_api_url")]
    pub semantic_scholar_api_url: String,
    #[serde(default)]
    pub semantic_scholar_api_key: Option<String>,
    /// Ceiling on estimated tokens for one chunked response
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Hard limit for the single-page fallback when nothing fits the budget
    #[serde(default = "default_truncate_chars")]
    pub truncate_chars: usize,
    /// Larger downloads are rejected before touching the disk
    #[serde(default = "default_max_pdf_bytes")]
    pub max_pdf_bytes: usize,
}

fn default_storage_dir() -> PathBuf {
    std::env::temp_dir().join(STORAGE_DIR_NAME)
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; papershelf/{}; research-paper fetcher)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_http_timeout() -> u64 {
    30
}

fn default_arxiv_api_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_semantic_scholar_api_url() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}

fn default_token_budget() -> usize {
    15_000
}

fn default_truncate_chars() -> usize {
    80_000
}

fn default_max_pdf_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            user_agent: default_user_agent(),
            http_timeout_secs: default_http_timeout(),
            arxiv_api_url: default_arxiv_api_url(),
            semantic_scholar_api_url: default_semantic_scholar_api_url(),
            semantic_scholar_api_key: None,
            token_budget: default_token_budget(),
            truncate_chars: default_truncate_chars(),
            max_pdf_bytes: default_max_pdf_bytes(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults when the file
    /// is absent. A file that exists but doesn't parse is an error.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse settings {}: {}", path.display(), e))
    }

    /// Resolve settings for a process: `.env`, then the config file (explicit
    /// path or `PAPERSHELF_CONFIG`), then environment overrides.
    pub fn from_env(config_path: Option<&Path>) -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let env_path = std::env::var("PAPERSHELF_CONFIG").ok().map(PathBuf::from);
        let mut settings = match config_path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::load(&path)?,
            None => Settings::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply `PAPERSHELF_*` style overrides from a lookup function.
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("PAPERSHELF_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(agent) = get("PAPERSHELF_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(secs) = get("PAPERSHELF_HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.http_timeout_secs = secs;
        }
        if let Some(key) = get("SEMANTIC_SCHOLAR_API_KEY") {
            self.semantic_scholar_api_key = Some(key);
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Shared HTTP client with the configured timeout and user-agent.
    pub fn http_client(&self) -> Result<reqwest::Client, String> {
        reqwest::Client::builder()
            .timeout(self.http_timeout())
            .user_agent(self.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))
    }
}
