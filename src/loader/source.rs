use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use url::Url;

use super::LoadError;

/// Where static blobs come from.
#[async_trait]
pub trait BlobSource: Send + Sync {
    /// Human-readable location of `path`, used in errors and logs.
    fn locate(&self, path: &str) -> String;

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, LoadError>;
}

/// Static files served over HTTP next to the page.
pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base).with_context(|| format!("invalid base url {}", base))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().build().context("building http client")?;
        Ok(Self { client, base })
    }

    fn url_for(&self, path: &str) -> Result<Url, LoadError> {
        self.base.join(path).map_err(|e| LoadError::Network {
            url: format!("{}{}", self.base, path),
            status: None,
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl BlobSource for HttpSource {
    fn locate(&self, path: &str) -> String {
        self.url_for(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}", self.base, path))
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let url = self.url_for(path)?;
        let network = |status: Option<u16>, detail: String| LoadError::Network {
            url: url.to_string(),
            status,
            detail,
        };

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network(None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(network(
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("request failed").to_string(),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| network(Some(status.as_u16()), e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// Blobs read from a local directory laid out like the served site.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobSource for DirSource {
    fn locate(&self, path: &str) -> String {
        self.root.join(path).display().to_string()
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let full = self.root.join(path);
        tokio::fs::read(&full).await.map_err(|e| LoadError::Network {
            url: full.display().to_string(),
            status: None,
            detail: e.to_string(),
        })
    }
}
