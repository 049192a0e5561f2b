//! Bidirectional mapping between navigation targets and URL fragments.
//!
//! ```text
//! fragment := path ["?" query] ["#" anchor]
//! path     := "/about" | "/overview" | "/questions" ["/" id]
//!           | "/model/" id | "/timeline"
//! ```
//!
//! Identifiers, query values and the anchor are percent-encoded with the
//! `encodeURIComponent` character set, so `#`, `?`, `/`, `&`, `=` and `,`
//! never appear raw inside a component. Query parameters equal to their
//! default are omitted.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::model::Compliance;

const ALL: &str = "all";
const NONE: &str = "none";

/// Percentage column plotted by the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metric {
    #[default]
    CompleteOverall,
    Evasive,
    Denial,
    Error,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::CompleteOverall,
        Metric::Evasive,
        Metric::Denial,
        Metric::Error,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Metric::CompleteOverall => "pct_complete_overall",
            Metric::Evasive => "pct_evasive",
            Metric::Denial => "pct_denial",
            Metric::Error => "pct_error",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    /// Judgment whose share this metric measures.
    pub fn compliance(&self) -> Compliance {
        match self {
            Metric::CompleteOverall => Compliance::Complete,
            Metric::Evasive => Compliance::Evasive,
            Metric::Denial => Compliance::Denial,
            Metric::Error => Compliance::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TimelineFilter {
    pub domain: Option<String>,
    pub creator: Option<String>,
    pub metric: Metric,
    pub highlight: Option<String>,
}

/// What is on screen. Replaced wholesale on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NavigationTarget {
    About,
    Overview,
    QuestionThemes {
        domain: Option<String>,
        window_months: Option<u32>,
    },
    ModelDetail {
        model: String,
        domains: Vec<String>,
    },
    QuestionThemeDetail {
        grouping_key: String,
    },
    Timeline(TimelineFilter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    About,
    Overview,
    QuestionThemes,
    ModelDetail,
    QuestionThemeDetail,
    Timeline,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::About => "about",
            ViewKind::Overview => "overview",
            ViewKind::QuestionThemes => "question_themes",
            ViewKind::ModelDetail => "model_detail",
            ViewKind::QuestionThemeDetail => "question_theme_detail",
            ViewKind::Timeline => "timeline",
        }
    }
}

impl NavigationTarget {
    pub fn questions() -> Self {
        NavigationTarget::QuestionThemes {
            domain: None,
            window_months: None,
        }
    }

    pub fn model(model: impl Into<String>) -> Self {
        NavigationTarget::ModelDetail {
            model: model.into(),
            domains: Vec::new(),
        }
    }

    pub fn theme(grouping_key: impl Into<String>) -> Self {
        NavigationTarget::QuestionThemeDetail {
            grouping_key: grouping_key.into(),
        }
    }

    pub fn timeline() -> Self {
        NavigationTarget::Timeline(TimelineFilter::default())
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            NavigationTarget::About => ViewKind::About,
            NavigationTarget::Overview => ViewKind::Overview,
            NavigationTarget::QuestionThemes { .. } => ViewKind::QuestionThemes,
            NavigationTarget::ModelDetail { .. } => ViewKind::ModelDetail,
            NavigationTarget::QuestionThemeDetail { .. } => ViewKind::QuestionThemeDetail,
            NavigationTarget::Timeline(_) => ViewKind::Timeline,
        }
    }
}

/// A decoded fragment: the target plus an optional scroll anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub target: NavigationTarget,
    pub anchor: Option<String>,
}

impl Route {
    pub fn new(target: NavigationTarget) -> Self {
        Self { target, anchor: None }
    }

    pub fn with_anchor(target: NavigationTarget, anchor: impl Into<String>) -> Self {
        Self {
            target,
            anchor: Some(anchor.into()),
        }
    }

    pub fn fragment(&self) -> String {
        encode(&self.target, self.anchor.as_deref())
    }

    /// Fragment without the anchor part.
    pub fn path_fragment(&self) -> String {
        encode(&self.target, None)
    }
}

impl Default for Route {
    fn default() -> Self {
        Route::new(NavigationTarget::About)
    }
}

fn enc(raw: &str) -> Cow<'_, str> {
    urlencoding::encode(raw)
}

fn dec(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(Cow::into_owned)
}

/// Encode a target (and optional anchor) as a `#/...` fragment.
pub fn encode(target: &NavigationTarget, anchor: Option<&str>) -> String {
    let mut out = String::from("#/");
    let mut query: Vec<(&str, String)> = Vec::new();

    match target {
        NavigationTarget::About => out.push_str("about"),
        NavigationTarget::Overview => out.push_str("overview"),
        NavigationTarget::QuestionThemes {
            domain,
            window_months,
        } => {
            out.push_str("questions");
            if let Some(d) = domain {
                query.push(("domain", enc(d).into_owned()));
            }
            if let Some(w) = window_months {
                query.push(("window", w.to_string()));
            }
        }
        NavigationTarget::ModelDetail { model, domains } => {
            out.push_str("model/");
            out.push_str(&enc(model));
            let joined = domains
                .iter()
                .filter(|d| !d.is_empty())
                .map(|d| enc(d).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            if !joined.is_empty() {
                query.push(("domain", joined));
            }
        }
        NavigationTarget::QuestionThemeDetail { grouping_key } => {
            out.push_str("questions/");
            out.push_str(&enc(grouping_key));
        }
        NavigationTarget::Timeline(f) => {
            out.push_str("timeline");
            if let Some(d) = &f.domain {
                query.push(("domain", enc(d).into_owned()));
            }
            if let Some(c) = &f.creator {
                query.push(("creator", enc(c).into_owned()));
            }
            if f.metric != Metric::default() {
                query.push(("metric", f.metric.key().to_string()));
            }
            if let Some(h) = &f.highlight {
                query.push(("highlight", enc(h).into_owned()));
            }
        }
    }

    if !query.is_empty() {
        out.push('?');
        let params: Vec<String> = query.into_iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        out.push_str(&params.join("&"));
    }
    if let Some(a) = anchor.filter(|a| !a.is_empty()) {
        out.push('#');
        out.push_str(&enc(a));
    }
    out
}

/// Decode a fragment. Unknown or malformed paths decode to `About`.
pub fn decode(fragment: &str) -> Route {
    let body = fragment.strip_prefix('#').unwrap_or(fragment);
    let (rest, anchor) = match body.rfind('#') {
        Some(i) => (&body[..i], dec(&body[i + 1..]).filter(|a| !a.is_empty())),
        None => (body, None),
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let params = parse_query(query);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let target = match segments.as_slice() {
        [] | ["about"] => NavigationTarget::About,
        ["overview"] => NavigationTarget::Overview,
        ["questions"] => NavigationTarget::QuestionThemes {
            domain: single(&params, "domain", ALL),
            window_months: params
                .get("window")
                .and_then(|w| w.parse::<u32>().ok())
                .filter(|w| *w > 0),
        },
        ["questions", id] => match dec(id).filter(|k| !k.is_empty()) {
            Some(grouping_key) => NavigationTarget::QuestionThemeDetail { grouping_key },
            None => unroutable(fragment, "empty theme id"),
        },
        ["model", id] => match dec(id).filter(|m| !m.is_empty()) {
            Some(model) => NavigationTarget::ModelDetail {
                model,
                domains: params
                    .get("domain")
                    .map(|raw| {
                        raw.split(',')
                            .filter_map(dec)
                            .filter(|d| !d.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            None => unroutable(fragment, "empty model id"),
        },
        ["timeline"] => NavigationTarget::Timeline(TimelineFilter {
            domain: single(&params, "domain", ALL),
            creator: single(&params, "creator", ALL),
            metric: params
                .get("metric")
                .and_then(|m| Metric::from_key(m))
                .unwrap_or_default(),
            highlight: single(&params, "highlight", NONE),
        }),
        _ => unroutable(fragment, "unknown path"),
    };

    Route { target, anchor }
}

fn unroutable(fragment: &str, reason: &str) -> NavigationTarget {
    log(
        Level::Warn,
        Domain::Route,
        "unroutable_fragment",
        obj(&[("fragment", v_str(fragment)), ("reason", v_str(reason))]),
    );
    NavigationTarget::About
}

/// Raw (still percent-encoded) query values keyed by name; last one wins.
fn parse_query(query: &str) -> HashMap<&str, &str> {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect()
}

/// A single-valued parameter, with its sentinel and empty mapped to `None`.
fn single(params: &HashMap<&str, &str>, key: &str, sentinel: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|raw| dec(raw))
        .filter(|v| !v.is_empty() && v != sentinel)
}
