//! Boundaries to the browser: the address bar and the widget layer.

use tokio::sync::mpsc::UnboundedSender;

use crate::route::ViewKind;

use super::events::{Event, Region};
use super::view::ViewModel;

/// Session history as seen through the URL fragment.
pub trait HistoryPort: Send {
    fn fragment(&self) -> String;
    fn push(&mut self, fragment: &str);
    fn replace(&mut self, fragment: &str);
}

/// Table and chart widgets. Calls are synchronous.
pub trait ViewRenderer: Send {
    fn teardown(&mut self, view: ViewKind);
    fn render(&mut self, view: &ViewModel);
    fn show_loading(&mut self, region: Region, message: &str);
    fn show_error(&mut self, region: Region, message: &str);
    /// Scroll to the element with this id. False if it is not in the page yet.
    fn scroll_to(&mut self, anchor: &str) -> bool;
}

/// In-process history stack with back/forward.
///
/// With an echo channel attached, pushes and traversals are reported as
/// [`Event::UrlChanged`] the way assigning `location.hash` fires
/// `hashchange`. Replacements stay silent.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Vec<String>,
    index: usize,
    echo: Option<UnboundedSender<Event>>,
}

impl MemoryHistory {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: vec![initial.to_string()],
            index: 0,
            echo: None,
        }
    }

    pub fn with_echo(initial: &str, echo: UnboundedSender<Event>) -> Self {
        Self {
            echo: Some(echo),
            ..Self::new(initial)
        }
    }

    pub fn attach_echo(&mut self, echo: UnboundedSender<Event>) {
        self.echo = Some(echo);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn back(&mut self) -> Option<String> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.announce())
    }

    pub fn forward(&mut self) -> Option<String> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.announce())
    }

    fn announce(&self) -> String {
        let fragment = self.entries[self.index].clone();
        if let Some(tx) = &self.echo {
            let _ = tx.send(Event::UrlChanged {
                fragment: fragment.clone(),
            });
        }
        fragment
    }
}

impl HistoryPort for MemoryHistory {
    fn fragment(&self) -> String {
        self.entries[self.index].clone()
    }

    fn push(&mut self, fragment: &str) {
        self.entries.truncate(self.index + 1);
        self.entries.push(fragment.to_string());
        self.index = self.entries.len() - 1;
        self.announce();
    }

    fn replace(&mut self, fragment: &str) {
        self.entries[self.index] = fragment.to_string();
    }
}
