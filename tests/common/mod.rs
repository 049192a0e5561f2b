#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use compliance_explorer::loader::{BlobSource, DataLoader, DirSource, LoadError, LoaderConfig};
use compliance_explorer::nav::{
    ControllerConfig, MemoryHistory, NavigationController, Region, Runtime, ViewModel, ViewRenderer,
};
use compliance_explorer::route::ViewKind;
use flate2::{write::GzEncoder, Compression};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn gz(text: &str) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    enc.finish().unwrap()
}

fn stat(domain: &str, c: u64, k: u64, d: u64) -> Value {
    json!({"domain": domain, "c": c, "k": k, "e": 0, "d": d, "r": 0})
}

pub fn metadata_json() -> Value {
    json!({
        "complianceOrder": ["COMPLETE", "EVASIVE", "DENIAL", "ERROR"],
        "model_metadata": {
            "acme/v1": {"release_date": "2024-05-01", "creator": "Acme", "open_weights": true},
            "beta": {"release_date": "2023-02-01", "creator": "Beta"}
        },
        "stats": {"models": 2, "themes": 2, "judgments": 6, "complete": 3},
        "model_summary": [
            {"model": "acme/v1", "num_responses": 3, "pct_complete_overall": 66.7,
             "pct_evasive": 0.0, "pct_denial": 33.3, "pct_error": 0.0, "release_date": "2024-05-01"},
            {"model": "beta", "num_responses": 3, "pct_complete_overall": 33.3,
             "pct_evasive": 0.0, "pct_denial": 66.7, "pct_error": 0.0, "release_date": "2023-02-01"}
        ],
        "question_theme_summary": [
            {"grouping_key": "theme-42", "domain": "safety", "num_responses": 3, "num_models": 2,
             "pct_complete_overall": 66.7, "pct_evasive": 0.0, "pct_denial": 33.3, "pct_error": 0.0},
            {"grouping_key": "theme-7", "domain": "policy", "num_responses": 3, "num_models": 2,
             "pct_complete_overall": 33.3, "pct_evasive": 0.0, "pct_denial": 66.7, "pct_error": 0.0}
        ],
        "model_theme_summary": {
            "acme/v1": {"theme-42": stat("safety", 2, 2, 0), "theme-7": stat("policy", 1, 0, 1)},
            "beta": {"theme-42": stat("safety", 1, 0, 1), "theme-7": stat("policy", 2, 1, 1)}
        }
    })
}

fn record(key: &str, domain: &str, model: &str, anchor: &str, variation: &str, compliance: &str) -> Value {
    json!({
        "model": model, "domain": domain, "variation": variation, "grouping_key": key,
        "compliance": compliance, "anchor_id": anchor, "response_text": "response",
        "question_text": "question", "judge_analysis": "analysis"
    })
}

pub fn theme_json(key: &str) -> Value {
    let domain = if key == "theme-42" { "safety" } else { "policy" };
    json!({"records": [
        record(key, domain, "beta", "model-beta", "1", "DENIAL"),
        record(key, domain, "acme/v1", "model-acme-v1", "2", "COMPLETE"),
        record(key, domain, "acme/v1", "model-acme-v1", "1", "COMPLETE"),
    ]})
}

pub fn write_theme(dir: &Path, key: &str) {
    let theme_dir = dir.join("theme_details");
    fs::create_dir_all(&theme_dir).unwrap();
    fs::write(theme_dir.join(format!("{}.json.gz", key)), gz(&theme_json(key).to_string())).unwrap();
}

/// Metadata plus both theme blobs, laid out like the served site.
pub fn write_site(dir: &Path) {
    fs::write(dir.join("metadata.json"), metadata_json().to_string()).unwrap();
    write_theme(dir, "theme-42");
    write_theme(dir, "theme-7");
}

/// Directory source whose fetches can be held back per path, and which
/// records every path it was asked for.
pub struct GatedSource {
    inner: DirSource,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    fetched: Mutex<Vec<String>>,
}

impl GatedSource {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: DirSource::new(root),
            gates: Mutex::new(HashMap::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(path.to_string(), gate.clone());
        gate
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        self.fetched.lock().unwrap().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl BlobSource for GatedSource {
    fn locate(&self, path: &str) -> String {
        self.inner.locate(path)
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        self.fetched.lock().unwrap().push(path.to_string());
        let gate = self.gates.lock().unwrap().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.fetch(path).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Teardown(ViewKind),
    Render(ViewKind),
    Loading(Region),
    Error(Region, String),
}

/// Widget layer stand-in that records every call.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub calls: Vec<Call>,
    pub current: Option<ViewModel>,
    pub scroll_attempts: usize,
    pub scrolled: Vec<String>,
}

impl RecordingRenderer {
    pub fn renders(&self) -> Vec<ViewKind> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Render(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(Region, String)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Error(region, msg) => Some((*region, msg.clone())),
                _ => None,
            })
            .collect()
    }
}

impl ViewRenderer for RecordingRenderer {
    fn teardown(&mut self, view: ViewKind) {
        self.calls.push(Call::Teardown(view));
        self.current = None;
    }

    fn render(&mut self, view: &ViewModel) {
        self.calls.push(Call::Render(view.kind()));
        self.current = Some(view.clone());
    }

    fn show_loading(&mut self, region: Region, _message: &str) {
        self.calls.push(Call::Loading(region));
    }

    fn show_error(&mut self, region: Region, message: &str) {
        self.calls.push(Call::Error(region, message.to_string()));
    }

    fn scroll_to(&mut self, anchor: &str) -> bool {
        self.scroll_attempts += 1;
        let found = self.current.as_ref().map(|v| v.has_anchor(anchor)).unwrap_or(false);
        if found {
            self.scrolled.push(anchor.to_string());
        }
        found
    }
}

pub type TestRuntime = Runtime<MemoryHistory, RecordingRenderer>;

pub fn runtime(source: Arc<dyn BlobSource>, start: &str) -> TestRuntime {
    let cfg = ControllerConfig {
        scroll_attempts: 3,
        as_of: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    };
    let loader = DataLoader::new(source, LoaderConfig::default());
    Runtime::new(
        NavigationController::new(cfg),
        Arc::new(loader),
        MemoryHistory::new(start),
        RecordingRenderer::default(),
        Duration::from_millis(1),
    )
}

/// Start the runtime and wait for the metadata load to land.
pub async fn booted(source: Arc<dyn BlobSource>, start: &str) -> TestRuntime {
    let mut rt = runtime(source, start);
    rt.start();
    assert!(rt.process_next().await);
    rt
}
