//! Pure navigation reducer: (AppState, Event) -> Vec<Effect>
//!
//! All state transitions happen here. The runtime performs the effects and
//! feeds completions back in as events, so the order of `handle` calls is the
//! only ordering that matters.
//!
//! | Hazard                          | Guard                                         |
//! |---------------------------------|-----------------------------------------------|
//! | Own URL write seen as user nav  | `pending_writes` echo matching                |
//! | Late theme blob clobbers a view | `detail_slot` must equal the result's key     |
//! | Scroll for an abandoned page    | `scroll_token` bumped on every navigation     |
//! | Detail page for unknown id      | validated against the store, then redirected  |

use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::ExplorerConfig;
use crate::loader::{LoadError, ThemeLoad};
use crate::logging::{
    log, log_invalid_reference, log_navigation, log_scroll_miss, log_stale_result, obj, v_str, Domain, Level,
};
use crate::model::MetadataBundle;
use crate::route::{decode, NavigationTarget, Route};
use crate::store::EntityStore;

use super::events::{Effect, Event, HistoryMode, Region};
use super::state::{AppState, Phase};
use super::view;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Scroll polls per navigation before giving up.
    pub scroll_attempts: u32,
    /// Reference date for recency windows.
    pub as_of: NaiveDate,
}

impl ControllerConfig {
    pub fn from_explorer(cfg: &ExplorerConfig) -> Self {
        Self {
            scroll_attempts: cfg.scroll_attempts,
            as_of: cfg.as_of_date(),
        }
    }
}

pub struct NavigationController {
    state: AppState,
    store: EntityStore,
    cfg: ControllerConfig,
}

impl NavigationController {
    pub fn new(cfg: ControllerConfig) -> Self {
        Self {
            state: AppState::default(),
            store: EntityStore::new(),
            cfg,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn route(&self) -> &Route {
        &self.state.route
    }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            Event::Start { fragment } => self.on_start(fragment, &mut fx),
            Event::UrlChanged { fragment } => self.on_url_changed(fragment, &mut fx),
            Event::Go { target, anchor, mode } => self.on_go(Route { target, anchor }, mode, &mut fx),
            Event::MetadataLoaded(result) => self.on_metadata(result, &mut fx),
            Event::ThemeDetailLoaded { grouping_key, result } => self.on_theme_detail(grouping_key, result, &mut fx),
            Event::ScrollRetry { anchor, token, attempt } => self.on_scroll_retry(anchor, token, attempt, &mut fx),
            Event::Shutdown => {
                log(Level::Info, Domain::System, "shutdown", obj(&[]));
            }
        }
        fx
    }

    fn on_start(&mut self, fragment: String, fx: &mut Vec<Effect>) {
        if self.state.phase != Phase::Uninitialized {
            return;
        }
        let route = decode(&fragment);
        log_navigation("", &route.fragment(), "start");
        self.state.fragment = fragment;
        self.state.route = route;
        self.request_metadata(fx);
    }

    fn request_metadata(&mut self, fx: &mut Vec<Effect>) {
        self.state.phase = Phase::MetadataLoading;
        fx.push(Effect::ShowLoading {
            region: Region::App,
            message: "Fetching metadata...".to_string(),
        });
        fx.push(Effect::FetchMetadata);
    }

    fn on_url_changed(&mut self, fragment: String, fx: &mut Vec<Effect>) {
        if self.state.take_echo(&fragment) {
            log(
                Level::Debug,
                Domain::Navigation,
                "self_write_echo",
                obj(&[("fragment", v_str(&fragment))]),
            );
            return;
        }
        if fragment == self.state.fragment {
            return;
        }
        self.state.fragment = fragment;
        let route = decode(&self.state.fragment);
        self.transition(route, "url", fx);
    }

    fn on_go(&mut self, route: Route, mode: HistoryMode, fx: &mut Vec<Effect>) {
        let fragment = route.fragment();
        if fragment == self.state.fragment {
            if self.needs_retry() {
                log(
                    Level::Info,
                    Domain::Navigation,
                    "retry_detail",
                    obj(&[("fragment", v_str(&fragment))]),
                );
                self.transition(route, "retry", fx);
            }
            return;
        }
        self.write_url(fragment, mode, fx);
        self.transition(route, "go", fx);
    }

    fn write_url(&mut self, fragment: String, mode: HistoryMode, fx: &mut Vec<Effect>) {
        if mode == HistoryMode::Push {
            self.state.remember_write(&fragment);
        }
        self.state.fragment = fragment.clone();
        fx.push(Effect::WriteUrl { fragment, mode });
    }

    /// A load behind the current page failed earlier and nothing is loading it now.
    fn needs_retry(&self) -> bool {
        if matches!(self.state.phase, Phase::Failed(_)) {
            return true;
        }
        match &self.state.route.target {
            NavigationTarget::QuestionThemeDetail { grouping_key } => {
                self.state.is_ready()
                    && !self.store.has_theme_detail(grouping_key)
                    && self.state.detail_slot.as_deref() != Some(grouping_key.as_str())
            }
            _ => false,
        }
    }

    /// Adopt `route` and bring the page in line with it.
    fn transition(&mut self, route: Route, cause: &str, fx: &mut Vec<Effect>) {
        let same_page = route.target == self.state.route.target && self.state.rendered.is_some();
        log_navigation(&self.state.route.fragment(), &route.fragment(), cause);
        self.state.route = route;
        self.state.scroll_token += 1;

        match self.state.phase {
            Phase::Ready => {}
            Phase::Failed(_) => return self.request_metadata(fx),
            Phase::Uninitialized | Phase::MetadataLoading => return,
        }

        if same_page {
            // Only the anchor moved. A pending blob picks the new anchor up on arrival.
            if self.state.detail_slot.is_some() {
                return;
            }
            if self.detail_available() {
                self.request_scroll(fx);
                return;
            }
        }

        if let Some(fallback) = self.fallback_for(&self.state.route.target) {
            let redirect = Route::new(fallback);
            self.write_url(redirect.fragment(), HistoryMode::Replace, fx);
            self.transition(redirect, "redirect", fx);
            return;
        }

        self.render_current(fx);
    }

    fn detail_available(&self) -> bool {
        match &self.state.route.target {
            NavigationTarget::QuestionThemeDetail { grouping_key } => self.store.has_theme_detail(grouping_key),
            _ => true,
        }
    }

    /// Where to send a target that names an unknown entity.
    fn fallback_for(&self, target: &NavigationTarget) -> Option<NavigationTarget> {
        match target {
            NavigationTarget::ModelDetail { model, .. } if !self.store.has_model(model) => {
                log_invalid_reference("model", model, "about");
                Some(NavigationTarget::About)
            }
            NavigationTarget::QuestionThemeDetail { grouping_key } if !self.store.has_theme(grouping_key) => {
                log_invalid_reference("question_theme", grouping_key, "questions");
                Some(NavigationTarget::questions())
            }
            _ => None,
        }
    }

    fn render_current(&mut self, fx: &mut Vec<Effect>) {
        if let Some(previous) = self.state.rendered.take() {
            fx.push(Effect::Teardown(previous));
        }
        let target = self.state.route.target.clone();
        self.state.rendered = Some(target.kind());

        match view::build(&self.store, &target, self.cfg.as_of) {
            Some(vm) => {
                self.state.detail_slot = None;
                fx.push(Effect::Render(vm));
                self.request_scroll(fx);
            }
            None => {
                if let NavigationTarget::QuestionThemeDetail { grouping_key } = target {
                    fx.push(Effect::ShowLoading {
                        region: Region::Detail,
                        message: format!("Loading responses for {}...", grouping_key),
                    });
                    self.state.detail_slot = Some(grouping_key.clone());
                    fx.push(Effect::FetchThemeDetail { grouping_key });
                }
            }
        }
    }

    fn request_scroll(&self, fx: &mut Vec<Effect>) {
        if let Some(anchor) = &self.state.route.anchor {
            fx.push(Effect::ScrollTo {
                anchor: anchor.clone(),
                token: self.state.scroll_token,
                attempt: 0,
            });
        }
    }

    fn on_metadata(&mut self, result: Result<Arc<MetadataBundle>, LoadError>, fx: &mut Vec<Effect>) {
        if self.state.phase != Phase::MetadataLoading {
            return;
        }
        match result {
            Ok(bundle) => {
                self.store.install_metadata(bundle);
                self.state.phase = Phase::Ready;
                let route = self.state.route.clone();
                self.transition(route, "metadata_ready", fx);
            }
            Err(e) => {
                let message = e.user_message();
                self.state.phase = Phase::Failed(message.clone());
                fx.push(Effect::ShowError {
                    region: Region::App,
                    message,
                });
            }
        }
    }

    fn on_theme_detail(&mut self, grouping_key: String, result: ThemeLoad, fx: &mut Vec<Effect>) {
        let current = self.state.detail_slot.as_deref() == Some(grouping_key.as_str());
        match result {
            Ok(bundle) => {
                self.store.insert_theme_detail(bundle);
                if !current {
                    log_stale_result(&grouping_key, self.state.detail_slot.as_deref());
                    return;
                }
                self.state.detail_slot = None;
                let target = self.state.route.target.clone();
                if let Some(vm) = view::build(&self.store, &target, self.cfg.as_of) {
                    fx.push(Effect::Render(vm));
                    self.request_scroll(fx);
                }
            }
            Err(e) => {
                if !current {
                    log_stale_result(&grouping_key, self.state.detail_slot.as_deref());
                    return;
                }
                self.state.detail_slot = None;
                fx.push(Effect::ShowError {
                    region: Region::Detail,
                    message: e.user_message(),
                });
            }
        }
    }

    fn on_scroll_retry(&mut self, anchor: String, token: u64, attempt: u32, fx: &mut Vec<Effect>) {
        if token != self.state.scroll_token {
            return;
        }
        if attempt >= self.cfg.scroll_attempts {
            log_scroll_miss(&anchor, attempt, self.cfg.scroll_attempts);
            return;
        }
        fx.push(Effect::ScrollTo { anchor, token, attempt });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DatasetStats, ModelSummaryRow, ModelThemeStat, ThemeDetailBundle, ThemeSummaryRow,
    };
    use crate::nav::view::ViewModel;
    use crate::route::ViewKind;
    use std::collections::BTreeMap;

    fn cfg() -> ControllerConfig {
        ControllerConfig {
            scroll_attempts: 3,
            as_of: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        }
    }

    fn metadata() -> Arc<MetadataBundle> {
        let row = |m: &str, pct: f64| ModelSummaryRow {
            model: m.into(),
            num_responses: 2,
            pct_complete_overall: pct,
            pct_evasive: 0.0,
            pct_denial: 100.0 - pct,
            pct_error: 0.0,
            release_date: None,
        };
        let theme = |k: &str| ThemeSummaryRow {
            grouping_key: k.into(),
            domain: "safety".into(),
            num_responses: 2,
            num_models: 1,
            pct_complete_overall: 50.0,
            pct_evasive: 0.0,
            pct_denial: 50.0,
            pct_error: 0.0,
        };
        let stat = ModelThemeStat {
            domain: "safety".into(),
            count: 2,
            complete: 1,
            evasive: 0,
            denial: 1,
            error: 0,
        };
        Arc::new(MetadataBundle {
            compliance_order: vec!["COMPLETE".into()],
            model_metadata: BTreeMap::new(),
            stats: DatasetStats { models: 1, themes: 2, judgments: 4, complete: 2 },
            model_summary: vec![row("acme", 50.0)],
            question_theme_summary: vec![theme("A"), theme("B")],
            model_theme_summary: BTreeMap::from([(
                "acme".to_string(),
                BTreeMap::from([("A".to_string(), stat)]),
            )]),
        })
    }

    fn bundle(key: &str) -> ThemeLoad {
        Ok(Arc::new(ThemeDetailBundle::new(key, vec![])))
    }

    fn ready_at(fragment: &str) -> (NavigationController, Vec<Effect>) {
        let mut c = NavigationController::new(cfg());
        let fx = c.handle(Event::Start {
            fragment: fragment.into(),
        });
        assert_eq!(fx.last(), Some(&Effect::FetchMetadata));
        let fx = c.handle(Event::MetadataLoaded(Ok(metadata())));
        (c, fx)
    }

    fn go(c: &mut NavigationController, target: NavigationTarget) -> Vec<Effect> {
        c.handle(Event::Go {
            target,
            anchor: None,
            mode: HistoryMode::Push,
        })
    }

    fn fetches(fx: &[Effect]) -> Vec<&str> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::FetchThemeDetail { grouping_key } => Some(grouping_key.as_str()),
                _ => None,
            })
            .collect()
    }

    fn rendered(fx: &[Effect]) -> Vec<ViewKind> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::Render(vm) => Some(vm.kind()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn target_is_adopted_but_not_rendered_before_metadata() {
        let mut c = NavigationController::new(cfg());
        c.handle(Event::Start { fragment: "#/about".into() });
        let fx = go(&mut c, NavigationTarget::Overview);
        assert_eq!(
            fx,
            vec![Effect::WriteUrl {
                fragment: "#/overview".into(),
                mode: HistoryMode::Push
            }]
        );
        assert_eq!(c.route().target, NavigationTarget::Overview);
        let fx = c.handle(Event::MetadataLoaded(Ok(metadata())));
        assert_eq!(rendered(&fx), vec![ViewKind::Overview]);
    }

    #[test]
    fn go_to_current_target_is_a_no_op() {
        let (mut c, _) = ready_at("#/about");
        let first = go(&mut c, NavigationTarget::Overview);
        assert_eq!(first.len(), 3); // write, teardown, render
        assert!(go(&mut c, NavigationTarget::Overview).is_empty());
    }

    #[test]
    fn unknown_model_redirects_to_about_with_replace() {
        let (mut c, _) = ready_at("#/overview");
        let fx = go(&mut c, NavigationTarget::model("does-not-exist"));
        assert!(fx.contains(&Effect::WriteUrl {
            fragment: "#/about".into(),
            mode: HistoryMode::Replace
        }));
        assert_eq!(rendered(&fx), vec![ViewKind::About]);
        assert_eq!(c.route().target, NavigationTarget::About);
    }

    #[test]
    fn unknown_theme_in_deep_link_redirects_to_theme_list() {
        let (c, fx) = ready_at("#/questions/nope");
        assert_eq!(rendered(&fx), vec![ViewKind::QuestionThemes]);
        assert_eq!(c.route().target, NavigationTarget::questions());
        assert!(fetches(&fx).is_empty());
    }

    #[test]
    fn late_result_for_abandoned_theme_is_cached_but_not_rendered() {
        let (mut c, _) = ready_at("#/overview");
        assert_eq!(fetches(&go(&mut c, NavigationTarget::theme("A"))), vec!["A"]);
        assert_eq!(fetches(&go(&mut c, NavigationTarget::theme("B"))), vec!["B"]);

        let fx = c.handle(Event::ThemeDetailLoaded {
            grouping_key: "B".into(),
            result: bundle("B"),
        });
        assert_eq!(rendered(&fx), vec![ViewKind::QuestionThemeDetail]);

        let fx = c.handle(Event::ThemeDetailLoaded {
            grouping_key: "A".into(),
            result: bundle("A"),
        });
        assert!(fx.is_empty());
        assert!(c.store().has_theme_detail("A"));
        assert_eq!(c.route().target, NavigationTarget::theme("B"));
    }

    #[test]
    fn cached_theme_renders_without_fetch() {
        let (mut c, _) = ready_at("#/questions/A");
        c.handle(Event::ThemeDetailLoaded {
            grouping_key: "A".into(),
            result: bundle("A"),
        });
        go(&mut c, NavigationTarget::Overview);
        let fx = go(&mut c, NavigationTarget::theme("A"));
        assert!(fetches(&fx).is_empty());
        assert_eq!(rendered(&fx), vec![ViewKind::QuestionThemeDetail]);
    }

    #[test]
    fn failed_detail_is_retried_by_going_again() {
        let (mut c, fx) = ready_at("#/questions/A");
        assert_eq!(fetches(&fx), vec!["A"]);
        let fx = c.handle(Event::ThemeDetailLoaded {
            grouping_key: "A".into(),
            result: Err(LoadError::Network {
                url: "theme_details/a.json.gz".into(),
                status: Some(404),
                detail: "Not Found".into(),
            }),
        });
        assert!(matches!(fx.as_slice(), [Effect::ShowError { region: Region::Detail, .. }]));
        assert!(!c.store().has_theme_detail("A"));

        let fx = go(&mut c, NavigationTarget::theme("A"));
        assert_eq!(fetches(&fx), vec!["A"]);
    }

    #[test]
    fn pending_detail_is_not_fetched_twice() {
        let (mut c, fx) = ready_at("#/questions/A");
        assert_eq!(fetches(&fx), vec!["A"]);
        assert!(go(&mut c, NavigationTarget::theme("A")).is_empty());
    }

    #[test]
    fn metadata_failure_blocks_app_and_next_navigation_retries() {
        let mut c = NavigationController::new(cfg());
        c.handle(Event::Start { fragment: "#/overview".into() });
        let fx = c.handle(Event::MetadataLoaded(Err(LoadError::missing_field("metadata.json", "stats"))));
        assert!(matches!(fx.as_slice(), [Effect::ShowError { region: Region::App, .. }]));
        assert!(matches!(c.state().phase, Phase::Failed(_)));

        let fx = go(&mut c, NavigationTarget::timeline());
        assert!(fx.contains(&Effect::FetchMetadata));
        assert_eq!(c.state().phase, Phase::MetadataLoading);
    }

    #[test]
    fn own_push_echo_is_ignored_and_back_navigation_is_not() {
        let (mut c, _) = ready_at("#/about");
        go(&mut c, NavigationTarget::Overview);
        assert!(c
            .handle(Event::UrlChanged {
                fragment: "#/overview".into()
            })
            .is_empty());
        let fx = c.handle(Event::UrlChanged {
            fragment: "#/about".into(),
        });
        assert_eq!(rendered(&fx), vec![ViewKind::About]);
        assert!(!fx.iter().any(|e| matches!(e, Effect::WriteUrl { .. })));
    }

    #[test]
    fn anchor_only_change_scrolls_without_rerender() {
        let (mut c, _) = ready_at("#/questions/A");
        c.handle(Event::ThemeDetailLoaded {
            grouping_key: "A".into(),
            result: bundle("A"),
        });
        let fx = c.handle(Event::Go {
            target: NavigationTarget::theme("A"),
            anchor: Some("model-acme".into()),
            mode: HistoryMode::Replace,
        });
        assert!(rendered(&fx).is_empty());
        assert!(fetches(&fx).is_empty());
        assert!(matches!(fx.last(), Some(Effect::ScrollTo { attempt: 0, .. })));
    }

    #[test]
    fn deep_link_scrolls_once_data_is_in() {
        let (mut c, fx) = ready_at("#/questions/A#model-acme");
        assert!(!fx.iter().any(|e| matches!(e, Effect::ScrollTo { .. })));
        let fx = c.handle(Event::ThemeDetailLoaded {
            grouping_key: "A".into(),
            result: bundle("A"),
        });
        let scrolls: Vec<_> = fx.iter().filter(|e| matches!(e, Effect::ScrollTo { .. })).collect();
        assert_eq!(scrolls.len(), 1);
    }

    #[test]
    fn scroll_retries_stop_on_navigation_or_cap() {
        let (mut c, _) = ready_at("#/overview#top");
        let token = c.state().scroll_token;
        let fx = c.handle(Event::ScrollRetry { anchor: "top".into(), token, attempt: 1 });
        assert_eq!(fx.len(), 1);
        assert!(c
            .handle(Event::ScrollRetry { anchor: "top".into(), token, attempt: 3 })
            .is_empty());
        go(&mut c, NavigationTarget::timeline());
        assert!(c
            .handle(Event::ScrollRetry { anchor: "top".into(), token, attempt: 1 })
            .is_empty());
    }

    #[test]
    fn views_are_torn_down_before_the_next_render() {
        let (mut c, _) = ready_at("#/overview");
        let fx = go(&mut c, NavigationTarget::timeline());
        assert_eq!(fx[1], Effect::Teardown(ViewKind::Overview));
        assert!(matches!(fx[2], Effect::Render(ViewModel::Timeline { .. })));
    }
}
