//! Structured logging for the explorer core.
//!
//! Every record is one JSON object per line on stderr, carrying a session id,
//! a monotonically increasing sequence number and a domain so that a single
//! navigation can be followed from URL change to render.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Route,      // Fragment decode/encode
    Loader,     // Fetch, decompress, parse
    Filter,     // Derived rows
    Navigation, // Transitions, redirects, stale results
    Render,     // Widget lifecycle, scroll polling
    System,     // Startup, shutdown
    Profile,    // Timing scopes
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Route => "route",
            Domain::Loader => "loader",
            Domain::Filter => "filter",
            Domain::Navigation => "navigation",
            Domain::Render => "render",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Sequence counter and session
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static SESSION_ID: OnceLock<String> = OnceLock::new();
static MIN_LEVEL: OnceLock<Level> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

/// Identifier shared by every record of this process.
pub fn session_id() -> &'static str {
    SESSION_ID.get_or_init(|| {
        std::env::var("SESSION_ID")
            .unwrap_or_else(|_| format!("s-{}-{}", ts_epoch_ms(), process::id()))
    })
}

fn min_level() -> Level {
    *MIN_LEVEL.get_or_init(Level::from_env)
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < min_level() || !domain.is_enabled() {
        return;
    }
    let line = format_record(level, domain, event, fields);
    let _ = writeln!(std::io::stderr().lock(), "{}", line);
}

fn format_record(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) -> String {
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("session_id".to_string(), json!(session_id()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));
    Value::Object(entry).to_string()
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_navigation(from: &str, to: &str, cause: &str) {
    log(
        Level::Info,
        Domain::Navigation,
        "transition",
        obj(&[
            ("from", v_str(from)),
            ("to", v_str(to)),
            ("cause", v_str(cause)),
        ]),
    );
}

pub fn log_invalid_reference(kind: &str, id: &str, fallback: &str) {
    log(
        Level::Warn,
        Domain::Navigation,
        "invalid_reference",
        obj(&[
            ("kind", v_str(kind)),
            ("id", v_str(id)),
            ("fallback", v_str(fallback)),
            ("msg", v_str("unknown identifier in route, redirecting")),
        ]),
    );
}

pub fn log_stale_result(key: &str, awaiting: Option<&str>) {
    log(
        Level::Debug,
        Domain::Navigation,
        "stale_result",
        obj(&[
            ("grouping_key", v_str(key)),
            ("awaiting", awaiting.map(v_str).unwrap_or(Value::Null)),
        ]),
    );
}

pub fn log_load_started(resource: &str, location: &str) {
    log(
        Level::Debug,
        Domain::Loader,
        "load_started",
        obj(&[("resource", v_str(resource)), ("location", v_str(location))]),
    );
}

pub fn log_load_finished(resource: &str, location: &str, records: usize) {
    log(
        Level::Info,
        Domain::Loader,
        "load_finished",
        obj(&[
            ("resource", v_str(resource)),
            ("location", v_str(location)),
            ("records", json!(records)),
        ]),
    );
}

pub fn log_load_failed(resource: &str, kind: &str, detail: &str) {
    log(
        Level::Error,
        Domain::Loader,
        "load_failed",
        obj(&[
            ("resource", v_str(resource)),
            ("kind", v_str(kind)),
            ("msg", v_str(detail)),
        ]),
    );
}

pub fn log_scroll_miss(anchor: &str, attempt: u32, max_attempts: u32) {
    log(
        Level::Warn,
        Domain::Render,
        "scroll_target_missing",
        obj(&[
            ("anchor", v_str(anchor)),
            ("attempt", json!(attempt)),
            ("max_attempts", json!(max_attempts)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let enabled = Self::should_sample();
        Self {
            label,
            context: if enabled { Some(obj(fields)) } else { None },
            started: Instant::now(),
            enabled,
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|p| {
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
                    let bucket = (seq % 10_000) as f64 / 10_000.0;
                    bucket < p
                }
            })
            .unwrap_or(true)
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================
