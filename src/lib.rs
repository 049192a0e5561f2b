//! Client-side core of the compliance explorer.
//!
//! The explorer renders summary tables, per-model and per-theme detail pages
//! and a release timeline over a dataset of model compliance judgments. All
//! data is static: one metadata document plus one gzip blob per question theme.
//!
//! ```text
//! ┌──────────────┐  decode   ┌──────────────┐  effects  ┌──────────────┐
//! │  URL / UI    │──────────►│  Controller  │──────────►│   Runtime    │
//! │  (events)    │           │  (reducer)   │           │ (ports+tasks)│
//! └──────────────┘           └──────────────┘           └──────────────┘
//!        ▲                          │ derive                   │ fetch
//!        │                          ▼                          ▼
//!        │                   ┌──────────────┐           ┌──────────────┐
//!        └───── render ──────│ FilterEngine │◄──────────│  DataLoader  │
//!                            │ + EntityStore│  events   │  (dedup)     │
//!                            └──────────────┘           └──────────────┘
//! ```

pub mod config;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod model;
pub mod nav;
pub mod present;
pub mod route;
pub mod store;

pub use config::ExplorerConfig;
pub use loader::{DataLoader, LoadError};
pub use nav::{NavigationController, Runtime};
pub use route::{NavigationTarget, Route};
pub use store::EntityStore;
