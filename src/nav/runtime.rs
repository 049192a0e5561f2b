//! Async driver: applies controller effects to the ports and runs loads.
//!
//! Loads are spawned onto tokio and report back over an unbounded channel,
//! so the controller is only ever touched from [`Runtime::dispatch`].

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::config::ExplorerConfig;
use crate::loader::DataLoader;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::route::NavigationTarget;

use super::controller::{ControllerConfig, NavigationController};
use super::events::{Effect, Event, HistoryMode};
use super::ports::{HistoryPort, ViewRenderer};

pub struct Runtime<H, R> {
    controller: NavigationController,
    loader: Arc<DataLoader>,
    history: H,
    renderer: R,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
    scroll_delay: Duration,
}

impl<H: HistoryPort, R: ViewRenderer> Runtime<H, R> {
    pub fn new(
        controller: NavigationController,
        loader: Arc<DataLoader>,
        history: H,
        renderer: R,
        scroll_delay: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            controller,
            loader,
            history,
            renderer,
            tx,
            rx,
            scroll_delay,
        }
    }

    pub fn from_config(cfg: &ExplorerConfig, history: H, renderer: R) -> Result<Self> {
        let loader = DataLoader::new(cfg.build_source()?, cfg.loader_config());
        Ok(Self::new(
            NavigationController::new(ControllerConfig::from_explorer(cfg)),
            Arc::new(loader),
            history,
            renderer,
            cfg.scroll_delay(),
        ))
    }

    /// Handle for feeding events in from outside, e.g. a history echo.
    pub fn sender(&self) -> UnboundedSender<Event> {
        self.tx.clone()
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn loader(&self) -> &Arc<DataLoader> {
        &self.loader
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut H {
        &mut self.history
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Boot from whatever the address bar holds.
    pub fn start(&mut self) {
        let fragment = self.history.fragment();
        self.dispatch(Event::Start { fragment });
    }

    pub fn go(&mut self, target: NavigationTarget, anchor: Option<String>, mode: HistoryMode) {
        self.dispatch(Event::Go { target, anchor, mode });
    }

    /// Run one event through the controller and apply its effects.
    /// Returns false once shut down.
    pub fn dispatch(&mut self, event: Event) -> bool {
        let shutdown = matches!(event, Event::Shutdown);
        log(
            Level::Trace,
            Domain::Navigation,
            "dispatch",
            obj(&[("event", v_str(event.name()))]),
        );
        for effect in self.controller.handle(event) {
            self.apply(effect);
        }
        !shutdown
    }

    /// Wait for the next queued event and dispatch it.
    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(event) => {
                let event = self.settle_url(event);
                self.dispatch(event)
            }
            None => false,
        }
    }

    /// Dispatch everything already queued without waiting.
    pub fn drain(&mut self) -> usize {
        let mut n = 0;
        while let Ok(event) = self.rx.try_recv() {
            n += 1;
            let event = self.settle_url(event);
            if !self.dispatch(event) {
                break;
            }
        }
        n
    }

    /// Queued URL changes are read against the address bar as it is now,
    /// the way a `hashchange` handler reads `location.hash`.
    fn settle_url(&self, event: Event) -> Event {
        match event {
            Event::UrlChanged { fragment } => {
                let current = self.history.fragment();
                if current != fragment {
                    log(
                        Level::Debug,
                        Domain::Navigation,
                        "late_url_event",
                        obj(&[("reported", v_str(&fragment)), ("current", v_str(&current))]),
                    );
                }
                Event::UrlChanged { fragment: current }
            }
            other => other,
        }
    }

    pub async fn run(&mut self) {
        self.start();
        while self.process_next().await {}
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::WriteUrl { fragment, mode } => match mode {
                HistoryMode::Push => self.history.push(&fragment),
                HistoryMode::Replace => self.history.replace(&fragment),
            },
            Effect::FetchMetadata => {
                let loader = self.loader.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = loader.load_metadata().await.map(Arc::new);
                    let _ = tx.send(Event::MetadataLoaded(result));
                });
            }
            Effect::FetchThemeDetail { grouping_key } => {
                let loader = self.loader.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = loader.load_theme_detail(&grouping_key).await;
                    let _ = tx.send(Event::ThemeDetailLoaded { grouping_key, result });
                });
            }
            Effect::Teardown(view) => self.renderer.teardown(view),
            Effect::Render(vm) => self.renderer.render(&vm),
            Effect::ShowLoading { region, message } => self.renderer.show_loading(region, &message),
            Effect::ShowError { region, message } => self.renderer.show_error(region, &message),
            Effect::ScrollTo { anchor, token, attempt } => {
                if self.renderer.scroll_to(&anchor) {
                    return;
                }
                let tx = self.tx.clone();
                let delay = self.scroll_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Event::ScrollRetry {
                        anchor,
                        token,
                        attempt: attempt + 1,
                    });
                });
            }
        }
    }
}
