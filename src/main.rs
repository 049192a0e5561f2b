//! Headless driver: boots the explorer on one fragment and logs what would render.
//!
//! ```text
//! EXPLORER_DATA_DIR=./site compliance-explorer '#/questions/theme-42#model-acme-v1'
//! ```

use anyhow::{bail, Result};
use compliance_explorer::logging::{log, obj, v_str, Domain, Level};
use compliance_explorer::nav::{Event, HistoryPort, MemoryHistory, Phase, Region, Runtime, ViewModel, ViewRenderer};
use compliance_explorer::route::ViewKind;
use compliance_explorer::ExplorerConfig;
use serde_json::json;
use std::time::Duration;

struct ConsoleRenderer;

fn row_count(view: &ViewModel) -> usize {
    match view {
        ViewModel::About { .. } => 0,
        ViewModel::Overview { rows } => rows.len(),
        ViewModel::QuestionThemes { rows, .. } => rows.len(),
        ViewModel::ModelDetail { rows, .. } => rows.len(),
        ViewModel::QuestionThemeDetail { groups, .. } => groups.iter().map(|g| g.responses.len()).sum(),
        ViewModel::Timeline { points, .. } => points.len(),
    }
}

fn region_name(region: Region) -> &'static str {
    match region {
        Region::App => "app",
        Region::Detail => "detail",
    }
}

impl ViewRenderer for ConsoleRenderer {
    fn teardown(&mut self, view: ViewKind) {
        log(Level::Debug, Domain::Render, "teardown", obj(&[("view", v_str(view.as_str()))]));
    }

    fn render(&mut self, view: &ViewModel) {
        log(
            Level::Info,
            Domain::Render,
            "render",
            obj(&[("view", v_str(view.kind().as_str())), ("rows", json!(row_count(view)))]),
        );
    }

    fn show_loading(&mut self, region: Region, message: &str) {
        log(
            Level::Info,
            Domain::Render,
            "loading",
            obj(&[("region", v_str(region_name(region))), ("msg", v_str(message))]),
        );
    }

    fn show_error(&mut self, region: Region, message: &str) {
        log(
            Level::Error,
            Domain::Render,
            "error",
            obj(&[("region", v_str(region_name(region))), ("msg", v_str(message))]),
        );
    }

    fn scroll_to(&mut self, anchor: &str) -> bool {
        log(Level::Info, Domain::Render, "scroll", obj(&[("anchor", v_str(anchor))]));
        true
    }
}

/// Nothing left in flight for the current page.
fn settled<H: HistoryPort, R: ViewRenderer>(rt: &Runtime<H, R>) -> bool {
    let state = rt.controller().state();
    match state.phase {
        Phase::Failed(_) => true,
        Phase::Ready => state.rendered.is_some() && state.detail_slot.is_none(),
        Phase::Uninitialized | Phase::MetadataLoading => false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = ExplorerConfig::from_env();
    let fragment = std::env::args().nth(1).unwrap_or_else(|| "#/about".to_string());
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("fragment", v_str(&fragment)),
            ("base_url", v_str(&cfg.base_url)),
            (
                "data_dir",
                cfg.data_dir
                    .as_ref()
                    .map(|d| v_str(&d.display().to_string()))
                    .unwrap_or(serde_json::Value::Null),
            ),
        ]),
    );

    let mut rt = Runtime::from_config(&cfg, MemoryHistory::new(&fragment), ConsoleRenderer)?;
    let wait = Duration::from_millis(cfg.fetch_timeout_ms) + Duration::from_secs(1);

    rt.start();
    while !settled(&rt) {
        match tokio::time::timeout(wait, rt.process_next()).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(_) => {
                log(Level::Warn, Domain::System, "settle_timeout", obj(&[]));
                break;
            }
        }
    }
    log(
        Level::Info,
        Domain::System,
        "final_route",
        obj(&[("fragment", v_str(&rt.history().fragment()))]),
    );
    rt.dispatch(Event::Shutdown);

    if let Phase::Failed(message) = &rt.controller().state().phase {
        bail!("{}", message);
    }
    Ok(())
}
