//! Render payloads, one per view, built from the store and the current target.

use chrono::NaiveDate;

use crate::filter::{
    self, ModelBreakdown, ModelResponses, ModelThemeRow, RecencyWindow, ThemeFilter, ThemeModelSummary,
    TimelinePoint,
};
use crate::model::{DatasetStats, ModelSummaryRow, ThemeSummaryRow};
use crate::present::{format_judgments, format_meta_key, format_meta_value};
use crate::route::{NavigationTarget, TimelineFilter, ViewKind};
use crate::store::EntityStore;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewModel {
    About {
        stats: DatasetStats,
        judgments_label: String,
    },
    Overview {
        rows: Vec<ModelSummaryRow>,
    },
    QuestionThemes {
        domain: Option<String>,
        window_months: Option<u32>,
        domains: Vec<String>,
        rows: Vec<ThemeSummaryRow>,
    },
    ModelDetail {
        model: String,
        /// `(label, value)` pairs ready for display.
        metadata: Vec<(String, String)>,
        domains: Vec<String>,
        active_domains: Vec<String>,
        breakdown: ModelBreakdown,
        rows: Vec<ModelThemeRow>,
    },
    QuestionThemeDetail {
        grouping_key: String,
        domain: Option<String>,
        summary: Vec<ThemeModelSummary>,
        groups: Vec<ModelResponses>,
    },
    Timeline {
        filter: TimelineFilter,
        domains: Vec<String>,
        creators: Vec<String>,
        points: Vec<TimelinePoint>,
    },
}

impl ViewModel {
    pub fn kind(&self) -> ViewKind {
        match self {
            ViewModel::About { .. } => ViewKind::About,
            ViewModel::Overview { .. } => ViewKind::Overview,
            ViewModel::QuestionThemes { .. } => ViewKind::QuestionThemes,
            ViewModel::ModelDetail { .. } => ViewKind::ModelDetail,
            ViewModel::QuestionThemeDetail { .. } => ViewKind::QuestionThemeDetail,
            ViewModel::Timeline { .. } => ViewKind::Timeline,
        }
    }

    /// Whether an element with this id is part of the rendered view.
    pub fn has_anchor(&self, anchor: &str) -> bool {
        match self {
            ViewModel::QuestionThemeDetail { groups, .. } => groups.iter().any(|g| g.anchor_id == anchor),
            _ => false,
        }
    }
}

/// Build the payload for `target`. `None` while a theme's detail is not cached.
pub fn build(store: &EntityStore, target: &NavigationTarget, as_of: NaiveDate) -> Option<ViewModel> {
    let vm = match target {
        NavigationTarget::About => {
            let stats = store.stats();
            ViewModel::About {
                judgments_label: format_judgments(stats.judgments),
                stats,
            }
        }
        NavigationTarget::Overview => ViewModel::Overview {
            rows: filter::model_rows(store),
        },
        NavigationTarget::QuestionThemes {
            domain,
            window_months,
        } => {
            let theme_filter = ThemeFilter {
                domain: domain.clone(),
                window: window_months.map(|months| RecencyWindow { months, as_of }),
            };
            ViewModel::QuestionThemes {
                domain: domain.clone(),
                window_months: *window_months,
                domains: store.domains(),
                rows: filter::theme_rows(store, &theme_filter),
            }
        }
        NavigationTarget::ModelDetail { model, domains } => ViewModel::ModelDetail {
            model: model.clone(),
            metadata: model_metadata_pairs(store, model),
            domains: filter::model_domains(store, model),
            active_domains: domains.clone(),
            breakdown: filter::model_breakdown(store, model),
            rows: filter::model_theme_rows(store, model, domains),
        },
        NavigationTarget::QuestionThemeDetail { grouping_key } => {
            let detail = store.theme_detail(grouping_key)?;
            ViewModel::QuestionThemeDetail {
                grouping_key: grouping_key.clone(),
                domain: detail.domain().map(String::from),
                summary: filter::theme_model_summary(&detail),
                groups: filter::group_by_model(&detail),
            }
        }
        NavigationTarget::Timeline(f) => ViewModel::Timeline {
            filter: f.clone(),
            domains: store.domains(),
            creators: store.creators(),
            points: filter::timeline_points(store, f),
        },
    };
    Some(vm)
}

fn model_metadata_pairs(store: &EntityStore, model: &str) -> Vec<(String, String)> {
    let Some(meta) = store.model_metadata(model) else {
        return Vec::new();
    };
    let mut pairs = Vec::new();
    if let Some(date) = &meta.release_date {
        pairs.push((format_meta_key("release_date"), date.clone()));
    }
    if let Some(creator) = &meta.creator {
        pairs.push((format_meta_key("creator"), creator.clone()));
    }
    for (key, value) in &meta.extra {
        pairs.push((format_meta_key(key), format_meta_value(value)));
    }
    pairs
}
