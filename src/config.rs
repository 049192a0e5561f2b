use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::loader::{BlobSource, DirSource, HttpSource, LoaderConfig};

/// Runtime settings, read once from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    /// Base URL the static files are served from.
    pub base_url: String,
    /// When set, blobs are read from this directory instead of over HTTP.
    pub data_dir: Option<PathBuf>,
    pub metadata_path: String,
    pub theme_dir: String,
    pub fetch_timeout_ms: u64,
    pub scroll_attempts: u32,
    pub scroll_delay_ms: u64,
    /// Reference date for the recency window; `None` means today.
    pub as_of: Option<NaiveDate>,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/".to_string(),
            data_dir: None,
            metadata_path: "metadata.json".to_string(),
            theme_dir: "theme_details".to_string(),
            fetch_timeout_ms: 15_000,
            scroll_attempts: 20,
            scroll_delay_ms: 50,
            as_of: None,
        }
    }
}

impl ExplorerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: std::env::var("EXPLORER_BASE_URL").unwrap_or(d.base_url),
            data_dir: std::env::var("EXPLORER_DATA_DIR").ok().filter(|v| !v.is_empty()).map(PathBuf::from),
            metadata_path: std::env::var("EXPLORER_METADATA_PATH").unwrap_or(d.metadata_path),
            theme_dir: std::env::var("EXPLORER_THEME_DIR").unwrap_or(d.theme_dir),
            fetch_timeout_ms: std::env::var("EXPLORER_FETCH_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.fetch_timeout_ms),
            scroll_attempts: std::env::var("EXPLORER_SCROLL_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.scroll_attempts),
            scroll_delay_ms: std::env::var("EXPLORER_SCROLL_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.scroll_delay_ms),
            as_of: std::env::var("EXPLORER_AS_OF").ok().and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok()),
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            metadata_path: self.metadata_path.clone(),
            theme_dir: self.theme_dir.clone(),
            timeout: Duration::from_millis(self.fetch_timeout_ms),
        }
    }

    pub fn scroll_delay(&self) -> Duration {
        Duration::from_millis(self.scroll_delay_ms)
    }

    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }

    /// The directory source when `data_dir` is set, HTTP otherwise.
    pub fn build_source(&self) -> Result<Arc<dyn BlobSource>> {
        Ok(match &self.data_dir {
            Some(dir) => Arc::new(DirSource::new(dir.clone())),
            None => Arc::new(HttpSource::new(&self.base_url)?),
        })
    }
}
