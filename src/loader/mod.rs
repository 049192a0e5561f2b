//! Fetch, decompress, parse and validate pipeline for the explorer's blobs.
//!
//! Theme detail loads are deduplicated per grouping key: a second caller for
//! a key already in flight awaits the same shared future. Finished loads,
//! successful or not, leave the in-flight map, so a failed key can be
//! requested again.

mod error;
mod slug;
mod source;

pub use error::LoadError;
pub use slug::slug;
pub use source::{BlobSource, DirSource, HttpSource};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::logging::{log_load_failed, log_load_finished, log_load_started, v_str, ProfileScope};
use crate::model::{MetadataBundle, ThemeDetailBundle, ThemeDetailRecord, REQUIRED_METADATA_KEYS};

pub type ThemeLoad = Result<Arc<ThemeDetailBundle>, LoadError>;
type SharedThemeLoad = Shared<BoxFuture<'static, ThemeLoad>>;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub metadata_path: String,
    pub theme_dir: String,
    pub timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            metadata_path: "metadata.json".to_string(),
            theme_dir: "theme_details".to_string(),
            timeout: Duration::from_millis(15_000),
        }
    }
}

pub struct DataLoader {
    source: Arc<dyn BlobSource>,
    cfg: LoaderConfig,
    in_flight: Mutex<HashMap<String, SharedThemeLoad>>,
}

impl DataLoader {
    pub fn new(source: Arc<dyn BlobSource>, cfg: LoaderConfig) -> Self {
        Self {
            source,
            cfg,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Relative path of the detail blob for a grouping key.
    pub fn theme_path(&self, grouping_key: &str) -> String {
        format!("{}/{}.json.gz", self.cfg.theme_dir.trim_end_matches('/'), slug(grouping_key))
    }

    /// Number of distinct theme loads currently running.
    pub fn in_flight_count(&self) -> usize {
        self.lock_in_flight().len()
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, SharedThemeLoad>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn load_metadata(&self) -> Result<MetadataBundle, LoadError> {
        let path = self.cfg.metadata_path.clone();
        let location = self.source.locate(&path);
        log_load_started("metadata", &location);
        let _scope = ProfileScope::with_context("load_metadata", &[("location", v_str(&location))]);

        let result = async {
            let bytes = fetch_with_timeout(self.source.as_ref(), &path, self.cfg.timeout).await?;
            let text = String::from_utf8(bytes).map_err(|e| LoadError::Parse {
                url: location.clone(),
                detail: e.to_string(),
            })?;
            parse_metadata(&location, &text)
        }
        .await;

        match &result {
            Ok(bundle) => log_load_finished("metadata", &location, bundle.model_summary.len()),
            Err(e) => log_load_failed("metadata", e.kind(), &e.to_string()),
        }
        result
    }

    /// Load the detail blob for one theme, sharing any load already in flight.
    pub async fn load_theme_detail(&self, grouping_key: &str) -> ThemeLoad {
        let shared = {
            let mut in_flight = self.lock_in_flight();
            match in_flight.get(grouping_key) {
                Some(existing) => existing.clone(),
                None => {
                    let fut = fetch_theme(
                        self.source.clone(),
                        self.theme_path(grouping_key),
                        grouping_key.to_string(),
                        self.cfg.timeout,
                    )
                    .boxed()
                    .shared();
                    in_flight.insert(grouping_key.to_string(), fut.clone());
                    fut
                }
            }
        };

        let result = shared.clone().await;

        let mut in_flight = self.lock_in_flight();
        if in_flight
            .get(grouping_key)
            .map(|current| current.ptr_eq(&shared))
            .unwrap_or(false)
        {
            in_flight.remove(grouping_key);
        }
        result
    }
}

async fn fetch_with_timeout(
    source: &dyn BlobSource,
    path: &str,
    timeout: Duration,
) -> Result<Vec<u8>, LoadError> {
    match tokio::time::timeout(timeout, source.fetch(path)).await {
        Ok(result) => result,
        Err(_) => Err(LoadError::Network {
            url: source.locate(path),
            status: None,
            detail: format!("timed out after {} ms", timeout.as_millis()),
        }),
    }
}

async fn fetch_theme(
    source: Arc<dyn BlobSource>,
    path: String,
    grouping_key: String,
    timeout: Duration,
) -> ThemeLoad {
    let location = source.locate(&path);
    log_load_started("theme_detail", &location);
    let _scope = ProfileScope::with_context(
        "load_theme_detail",
        &[("grouping_key", v_str(&grouping_key))],
    );

    let result = async {
        let bytes = fetch_with_timeout(source.as_ref(), &path, timeout).await?;
        let text = gunzip(&location, &bytes)?;
        parse_theme_detail(&location, &grouping_key, &text)
    }
    .await;

    match &result {
        Ok(bundle) => log_load_finished("theme_detail", &location, bundle.records.len()),
        Err(e) => log_load_failed("theme_detail", e.kind(), &e.to_string()),
    }
    result.map(Arc::new)
}

pub fn gunzip(location: &str, bytes: &[u8]) -> Result<String, LoadError> {
    let mut text = String::new();
    flate2::read::GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(|e| LoadError::Decompression {
            url: location.to_string(),
            detail: e.to_string(),
        })?;
    Ok(text)
}

/// Parse the metadata document, naming the first missing top-level key.
pub fn parse_metadata(location: &str, text: &str) -> Result<MetadataBundle, LoadError> {
    let doc: Value = serde_json::from_str(text).map_err(|e| LoadError::Parse {
        url: location.to_string(),
        detail: e.to_string(),
    })?;
    let Some(fields) = doc.as_object() else {
        return Err(LoadError::Schema {
            url: location.to_string(),
            field: "$".to_string(),
            detail: "must be a JSON object".to_string(),
        });
    };
    if let Some(missing) = REQUIRED_METADATA_KEYS.iter().find(|k| !fields.contains_key(**k)) {
        return Err(LoadError::missing_field(location, missing));
    }
    serde_json::from_value(doc).map_err(|e| LoadError::Schema {
        url: location.to_string(),
        field: "$".to_string(),
        detail: e.to_string(),
    })
}

/// Parse a decompressed theme detail document and sort its records.
pub fn parse_theme_detail(
    location: &str,
    grouping_key: &str,
    text: &str,
) -> Result<ThemeDetailBundle, LoadError> {
    let mut doc: Value = serde_json::from_str(text).map_err(|e| LoadError::Parse {
        url: location.to_string(),
        detail: e.to_string(),
    })?;
    let records = match doc.get_mut("records") {
        Some(v) if v.is_array() => v.take(),
        Some(_) => {
            return Err(LoadError::Schema {
                url: location.to_string(),
                field: "records".to_string(),
                detail: "is not an array".to_string(),
            })
        }
        None => return Err(LoadError::missing_field(location, "records")),
    };
    let records: Vec<ThemeDetailRecord> =
        serde_json::from_value(records).map_err(|e| LoadError::Schema {
            url: location.to_string(),
            field: "records".to_string(),
            detail: e.to_string(),
        })?;
    Ok(ThemeDetailBundle::new(grouping_key, records))
}
