use std::sync::Arc;

use crate::loader::{LoadError, ThemeLoad};
use crate::model::MetadataBundle;
use crate::route::{NavigationTarget, ViewKind};

use super::view::ViewModel;

/// How a URL write lands in the session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// New entry; used for entity navigation.
    Push,
    /// Overwrite the current entry; used for filter changes and redirects.
    Replace,
}

/// Part of the page a loading or error message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Whole application; blocks every view.
    App,
    /// Theme detail panel only.
    Detail,
}

/// Inputs to the controller.
#[derive(Debug, Clone)]
pub enum Event {
    /// Page load with the fragment currently in the address bar.
    Start { fragment: String },
    /// The address bar changed (back/forward, manual edit, or our own write echoing back).
    UrlChanged { fragment: String },
    /// Programmatic navigation from a click handler.
    Go {
        target: NavigationTarget,
        anchor: Option<String>,
        mode: HistoryMode,
    },
    MetadataLoaded(Result<Arc<MetadataBundle>, LoadError>),
    ThemeDetailLoaded { grouping_key: String, result: ThemeLoad },
    /// A scroll poll found nothing; try again if still current.
    ScrollRetry { anchor: String, token: u64, attempt: u32 },
    Shutdown,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start { .. } => "start",
            Event::UrlChanged { .. } => "url_changed",
            Event::Go { .. } => "go",
            Event::MetadataLoaded(_) => "metadata_loaded",
            Event::ThemeDetailLoaded { .. } => "theme_detail_loaded",
            Event::ScrollRetry { .. } => "scroll_retry",
            Event::Shutdown => "shutdown",
        }
    }
}

/// Outputs of the controller, interpreted by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    WriteUrl { fragment: String, mode: HistoryMode },
    FetchMetadata,
    FetchThemeDetail { grouping_key: String },
    Teardown(ViewKind),
    Render(ViewModel),
    ShowLoading { region: Region, message: String },
    ShowError { region: Region, message: String },
    ScrollTo { anchor: String, token: u64, attempt: u32 },
}
