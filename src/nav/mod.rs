//! Hash-driven navigation: URL fragment in, renders and fetches out.

pub mod controller;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod state;
pub mod view;

pub use controller::{ControllerConfig, NavigationController};
pub use events::{Effect, Event, HistoryMode, Region};
pub use ports::{HistoryPort, MemoryHistory, ViewRenderer};
pub use runtime::Runtime;
pub use state::{AppState, Phase};
pub use view::ViewModel;
