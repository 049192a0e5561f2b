use std::collections::VecDeque;

use crate::route::{Route, ViewKind};

/// Fragments written by us that may still echo back as URL changes.
pub const MAX_PENDING_WRITES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    MetadataLoading,
    Ready,
    /// Metadata failed to load; holds the user-facing message.
    Failed(String),
}

/// Everything the controller knows about the page.
#[derive(Debug, Clone)]
pub struct AppState {
    pub phase: Phase,
    /// Current target and anchor. Replaced, never mutated in place.
    pub route: Route,
    /// Fragment the address bar is known to show.
    pub fragment: String,
    /// View whose widgets are currently built.
    pub rendered: Option<ViewKind>,
    /// Pushed fragments whose change events have not arrived yet, oldest first.
    pub pending_writes: VecDeque<String>,
    /// Grouping key whose detail blob the page is waiting for.
    pub detail_slot: Option<String>,
    /// Bumped on every navigation; scroll polls carrying an older token stop.
    pub scroll_token: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            phase: Phase::Uninitialized,
            route: Route::default(),
            fragment: String::new(),
            rendered: None,
            pending_writes: VecDeque::new(),
            detail_slot: None,
            scroll_token: 0,
        }
    }
}

impl AppState {
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn remember_write(&mut self, fragment: &str) {
        if self.pending_writes.len() == MAX_PENDING_WRITES {
            self.pending_writes.pop_front();
        }
        self.pending_writes.push_back(fragment.to_string());
    }

    /// Consume the oldest self-written fragment if this is its echo.
    /// Anything else is a foreign change and drops the queue.
    pub fn take_echo(&mut self, fragment: &str) -> bool {
        if self.pending_writes.front().map(String::as_str) == Some(fragment) {
            self.pending_writes.pop_front();
            return true;
        }
        self.pending_writes.clear();
        false
    }
}
