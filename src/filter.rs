//! Pure derivations of view rows from the entity store.
//!
//! Every function here is deterministic and allocates fresh output; none of
//! them touch per-response data except the two helpers that take a loaded
//! theme bundle. Percentages are recomputed from raw counts whenever a filter
//! changes the population.

use chrono::{DateTime, Months, NaiveDate};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::logging::{log, obj, v_num, v_str, Domain, Level, ProfileScope};
use crate::model::{Compliance, ModelSummaryRow, ThemeDetailBundle, ThemeDetailRecord, ThemeSummaryRow};
use crate::present::{chat_link, model_anchor, variation_label, ComplianceBand};
use crate::route::TimelineFilter;
use crate::store::EntityStore;

/// Only models released within `months` before `as_of` count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecencyWindow {
    pub months: u32,
    pub as_of: NaiveDate,
}

impl RecencyWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let start = self
            .as_of
            .checked_sub_months(Months::new(self.months))
            .unwrap_or(NaiveDate::MIN);
        date >= start && date <= self.as_of
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeFilter {
    pub domain: Option<String>,
    pub window: Option<RecencyWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelThemeRow {
    pub grouping_key: String,
    pub domain: String,
    pub num_responses: u64,
    pub pct_complete: f64,
    pub pct_evasive: f64,
    pub pct_denial: f64,
    pub pct_error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub value: f64,
    pub model: String,
    pub creator: Option<String>,
    pub num_responses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceShare {
    pub compliance: Compliance,
    pub count: u64,
    pub pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainRate {
    pub domain: String,
    pub count: u64,
    pub complete: u64,
    pub pct_complete: f64,
}

/// Overall and per-domain compliance for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelBreakdown {
    pub total: u64,
    pub pct_complete: f64,
    pub shares: Vec<ComplianceShare>,
    pub by_domain: Vec<DomainRate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeModelSummary {
    pub model: String,
    pub anchor_id: String,
    pub count: u64,
    pub pct_complete: f64,
    pub band: ComplianceBand,
}

/// One response as shown in a model's block.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEntry {
    pub record: ThemeDetailRecord,
    pub variation_label: String,
    /// Opens the question against the same model; absent without question text.
    pub chat_link: Option<String>,
}

impl ResponseEntry {
    fn from_record(record: &ThemeDetailRecord) -> Self {
        let chat_link = record
            .question_text
            .as_deref()
            .filter(|q| !q.is_empty())
            .map(|q| chat_link(&record.model, q));
        Self {
            record: record.clone(),
            variation_label: variation_label(record.variation),
            chat_link,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponses {
    pub model: String,
    pub anchor_id: String,
    pub responses: Vec<ResponseEntry>,
}

pub fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// `YYYY-MM-DD`, or the date part of an RFC3339 timestamp.
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

fn release_date(store: &EntityStore, model: &str) -> Option<NaiveDate> {
    let from_meta = store.model_metadata(model).and_then(|m| m.release_date.as_deref());
    let from_summary = || {
        store.metadata().and_then(|m| {
            m.model_summary
                .iter()
                .find(|r| r.model == model)
                .and_then(|r| r.release_date.as_deref())
        })
    };
    from_meta.or_else(from_summary).and_then(parse_release_date)
}

fn by_pct_then_key(a_pct: f64, a_key: &str, b_pct: f64, b_key: &str) -> Ordering {
    a_pct.total_cmp(&b_pct).then_with(|| a_key.cmp(b_key))
}

/// Records written without an anchor get the one the page would derive.
fn anchor_of(record: &ThemeDetailRecord) -> String {
    if record.anchor_id.is_empty() {
        model_anchor(&record.model)
    } else {
        record.anchor_id.clone()
    }
}

fn domain_matches(filter: &Option<String>, domain: &str) -> bool {
    filter.as_deref().map(|d| d == domain).unwrap_or(true)
}

/// Models, least compliant first.
pub fn model_rows(store: &EntityStore) -> Vec<ModelSummaryRow> {
    let mut rows = store
        .metadata()
        .map(|m| m.model_summary.clone())
        .unwrap_or_default();
    rows.sort_by(|a, b| by_pct_then_key(a.pct_complete_overall, &a.model, b.pct_complete_overall, &b.model));
    rows
}

/// Question themes, optionally restricted to a domain and to recent models.
pub fn theme_rows(store: &EntityStore, filter: &ThemeFilter) -> Vec<ThemeSummaryRow> {
    let Some(meta) = store.metadata() else {
        return Vec::new();
    };

    let mut rows: Vec<ThemeSummaryRow> = match &filter.window {
        None => meta
            .question_theme_summary
            .iter()
            .filter(|r| domain_matches(&filter.domain, &r.domain))
            .cloned()
            .collect(),
        Some(window) => windowed_theme_rows(store, window)
            .into_iter()
            .filter(|r| domain_matches(&filter.domain, &r.domain))
            .collect(),
    };
    rows.sort_by(|a, b| {
        by_pct_then_key(a.pct_complete_overall, &a.grouping_key, b.pct_complete_overall, &b.grouping_key)
    });
    rows
}

#[derive(Default)]
struct ThemeAcc {
    domain: String,
    count: u64,
    complete: u64,
    evasive: u64,
    denial: u64,
    error: u64,
    models: u64,
}

fn windowed_theme_rows(store: &EntityStore, window: &RecencyWindow) -> Vec<ThemeSummaryRow> {
    let Some(summary) = store.model_theme_summary() else {
        return Vec::new();
    };
    let _scope = ProfileScope::new("windowed_theme_rows");
    let mut acc: BTreeMap<&str, ThemeAcc> = BTreeMap::new();
    let mut recent_models = 0u64;
    for (model, themes) in summary {
        let recent = release_date(store, model)
            .map(|d| window.contains(d))
            .unwrap_or(false);
        if !recent {
            continue;
        }
        recent_models += 1;
        for (key, stat) in themes {
            let a = acc.entry(key.as_str()).or_default();
            a.domain = stat.domain.clone();
            a.count += stat.count;
            a.complete += stat.complete;
            a.evasive += stat.evasive;
            a.denial += stat.denial;
            a.error += stat.error;
            if stat.count > 0 {
                a.models += 1;
            }
        }
    }
    log(
        Level::Debug,
        Domain::Filter,
        "window_reaggregated",
        obj(&[
            ("months", v_num(window.months as f64)),
            ("as_of", v_str(&window.as_of.to_string())),
            ("models", v_num(recent_models as f64)),
            ("themes", v_num(acc.len() as f64)),
        ]),
    );
    acc.into_iter()
        .filter(|(_, a)| a.count > 0)
        .map(|(key, a)| ThemeSummaryRow {
            grouping_key: key.to_string(),
            domain: a.domain,
            num_responses: a.count,
            num_models: a.models,
            pct_complete_overall: pct(a.complete, a.count),
            pct_evasive: pct(a.evasive, a.count),
            pct_denial: pct(a.denial, a.count),
            pct_error: pct(a.error, a.count),
        })
        .collect()
}

/// Per-theme rates for one model. An empty domain list means no filtering.
pub fn model_theme_rows(store: &EntityStore, model: &str, domains: &[String]) -> Vec<ModelThemeRow> {
    let Some(themes) = store.model_themes(model) else {
        return Vec::new();
    };
    let mut rows: Vec<ModelThemeRow> = themes
        .iter()
        .filter(|(_, s)| domains.is_empty() || domains.iter().any(|d| *d == s.domain))
        .map(|(key, s)| ModelThemeRow {
            grouping_key: key.clone(),
            domain: s.domain.clone(),
            num_responses: s.count,
            pct_complete: pct(s.complete, s.count),
            pct_evasive: pct(s.evasive, s.count),
            pct_denial: pct(s.denial, s.count),
            pct_error: pct(s.error, s.count),
        })
        .collect();
    rows.sort_by(|a, b| by_pct_then_key(a.pct_complete, &a.grouping_key, b.pct_complete, &b.grouping_key));
    rows
}

/// One point per dated model, ordered by release date.
pub fn timeline_points(store: &EntityStore, filter: &TimelineFilter) -> Vec<TimelinePoint> {
    let Some(summary) = store.model_theme_summary() else {
        return Vec::new();
    };
    let _scope = ProfileScope::new("timeline_points");
    let target = filter.metric.compliance();
    let mut points = Vec::new();
    let mut undated = 0u64;

    for (model, themes) in summary {
        let creator = store.model_metadata(model).and_then(|m| m.creator.clone());
        if let Some(wanted) = &filter.creator {
            if creator.as_deref() != Some(wanted.as_str()) {
                continue;
            }
        }
        let Some(date) = release_date(store, model) else {
            undated += 1;
            continue;
        };
        let (total, hits) = themes
            .values()
            .filter(|s| domain_matches(&filter.domain, &s.domain))
            .fold((0u64, 0u64), |(t, h), s| (t + s.count, h + s.count_of(target)));
        if total == 0 {
            continue;
        }
        points.push(TimelinePoint {
            date,
            value: pct(hits, total),
            model: model.clone(),
            creator,
            num_responses: total,
        });
    }
    points.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.model.cmp(&b.model)));
    if undated > 0 {
        log(
            Level::Debug,
            Domain::Filter,
            "timeline_undated_models",
            obj(&[("skipped", v_num(undated as f64)), ("points", v_num(points.len() as f64))]),
        );
    }
    points
}

/// Overall shares and per-domain complete rates for one model.
pub fn model_breakdown(store: &EntityStore, model: &str) -> ModelBreakdown {
    let Some(themes) = store.model_themes(model) else {
        return ModelBreakdown::default();
    };
    let total: u64 = themes.values().map(|s| s.count).sum();

    let mut kinds: Vec<Compliance> = Compliance::ORDER.to_vec();
    kinds.push(Compliance::Unknown);
    let shares = kinds
        .into_iter()
        .map(|c| {
            let count = themes.values().map(|s| s.count_of(c)).sum();
            ComplianceShare {
                compliance: c,
                count,
                pct: pct(count, total),
            }
        })
        .filter(|s| s.compliance != Compliance::Unknown || s.count > 0)
        .collect::<Vec<_>>();

    let mut domains: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for s in themes.values() {
        let e = domains.entry(s.domain.as_str()).or_default();
        e.0 += s.count;
        e.1 += s.complete;
    }
    let mut by_domain: Vec<DomainRate> = domains
        .into_iter()
        .map(|(domain, (count, complete))| DomainRate {
            domain: domain.to_string(),
            count,
            complete,
            pct_complete: pct(complete, count),
        })
        .collect();
    by_domain.sort_by(|a, b| by_pct_then_key(a.pct_complete, &a.domain, b.pct_complete, &b.domain));

    let complete = shares
        .iter()
        .find(|s| s.compliance == Compliance::Complete)
        .map(|s| s.count)
        .unwrap_or(0);

    ModelBreakdown {
        total,
        pct_complete: pct(complete, total),
        shares,
        by_domain,
    }
}

/// Domains a model has any responses in, sorted.
pub fn model_domains(store: &EntityStore, model: &str) -> Vec<String> {
    store
        .model_themes(model)
        .map(|themes| {
            themes
                .values()
                .map(|s| s.domain.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default()
}

/// Per-model counts within one loaded theme, by model name.
pub fn theme_model_summary(detail: &ThemeDetailBundle) -> Vec<ThemeModelSummary> {
    let mut acc: BTreeMap<&str, (String, u64, u64)> = BTreeMap::new();
    for r in &detail.records {
        let e = acc.entry(r.model.as_str()).or_default();
        e.0 = anchor_of(r);
        e.1 += 1;
        if r.compliance == Compliance::Complete {
            e.2 += 1;
        }
    }
    acc.into_iter()
        .map(|(model, (anchor_id, count, complete))| {
            let pct_complete = pct(complete, count);
            ThemeModelSummary {
                model: model.to_string(),
                anchor_id,
                count,
                pct_complete,
                band: ComplianceBand::for_percent(pct_complete),
            }
        })
        .collect()
}

/// Records grouped per model; relies on the bundle's `(model, variation)` order.
pub fn group_by_model(detail: &ThemeDetailBundle) -> Vec<ModelResponses> {
    let mut groups: Vec<ModelResponses> = Vec::new();
    for r in &detail.records {
        match groups.last_mut() {
            Some(g) if g.model == r.model => g.responses.push(ResponseEntry::from_record(r)),
            _ => groups.push(ModelResponses {
                model: r.model.clone(),
                anchor_id: anchor_of(r),
                responses: vec![ResponseEntry::from_record(r)],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetStats, MetadataBundle, ModelMetadata, ModelThemeStat};
    use crate::route::Metric;
    use std::sync::Arc;

    fn stat(domain: &str, count: u64, complete: u64, denial: u64) -> ModelThemeStat {
        ModelThemeStat {
            domain: domain.into(),
            count,
            complete,
            evasive: 0,
            denial,
            error: count - complete - denial,
        }
    }

    fn summary_row(model: &str, pct: f64, date: Option<&str>) -> ModelSummaryRow {
        ModelSummaryRow {
            model: model.into(),
            num_responses: 10,
            pct_complete_overall: pct,
            pct_evasive: 0.0,
            pct_denial: 100.0 - pct,
            pct_error: 0.0,
            release_date: date.map(String::from),
        }
    }

    fn theme_row(key: &str, domain: &str, pct: f64) -> ThemeSummaryRow {
        ThemeSummaryRow {
            grouping_key: key.into(),
            domain: domain.into(),
            num_responses: 4,
            num_models: 2,
            pct_complete_overall: pct,
            pct_evasive: 0.0,
            pct_denial: 100.0 - pct,
            pct_error: 0.0,
        }
    }

    fn meta(date: Option<&str>, creator: Option<&str>) -> ModelMetadata {
        ModelMetadata {
            release_date: date.map(String::from),
            creator: creator.map(String::from),
            extra: Default::default(),
        }
    }

    fn store() -> EntityStore {
        let mut mts = BTreeMap::new();
        mts.insert(
            "X".to_string(),
            BTreeMap::from([
                ("t1".to_string(), stat("safety", 2, 2, 0)),
                ("t2".to_string(), stat("policy", 2, 1, 1)),
            ]),
        );
        mts.insert(
            "Y".to_string(),
            BTreeMap::from([
                ("t1".to_string(), stat("safety", 2, 0, 2)),
                ("t2".to_string(), stat("policy", 2, 0, 2)),
            ]),
        );
        mts.insert(
            "Z".to_string(),
            BTreeMap::from([
                ("t1".to_string(), stat("safety", 2, 1, 1)),
                ("t3".to_string(), stat("policy", 1, 0, 1)),
            ]),
        );
        mts.insert(
            "Undated".to_string(),
            BTreeMap::from([("t1".to_string(), stat("safety", 2, 2, 0))]),
        );

        let bundle = MetadataBundle {
            compliance_order: vec!["COMPLETE".into(), "EVASIVE".into(), "DENIAL".into(), "ERROR".into()],
            model_metadata: BTreeMap::from([
                ("X".to_string(), meta(Some("2024-06-01"), Some("Acme"))),
                ("Y".to_string(), meta(Some("2023-01-15"), Some("Beta"))),
                ("Z".to_string(), meta(Some("2024-03-10"), Some("Acme"))),
                ("Undated".to_string(), meta(Some("soon"), Some("Acme"))),
            ]),
            stats: DatasetStats::default(),
            model_summary: vec![
                summary_row("X", 80.0, Some("2024-06-01")),
                summary_row("Y", 20.0, Some("2023-01-15")),
                summary_row("Z", 20.0, Some("2024-03-10")),
            ],
            question_theme_summary: vec![
                theme_row("t2", "policy", 25.0),
                theme_row("t1", "safety", 50.0),
                theme_row("t0", "safety", 25.0),
            ],
            model_theme_summary: mts,
        };
        let mut store = EntityStore::new();
        store.install_metadata(Arc::new(bundle));
        store
    }

    #[test]
    fn overview_sorts_least_compliant_first_with_name_tiebreak() {
        let rows = model_rows(&store());
        let order: Vec<&str> = rows.iter().map(|r| r.model.as_str()).collect();
        assert_eq!(order, vec!["Y", "Z", "X"]);
    }

    #[test]
    fn theme_rows_are_deterministic_and_tie_broken_by_key() {
        let s = store();
        let a = theme_rows(&s, &ThemeFilter::default());
        let b = theme_rows(&s, &ThemeFilter::default());
        assert_eq!(a, b);
        let keys: Vec<&str> = a.iter().map(|r| r.grouping_key.as_str()).collect();
        assert_eq!(keys, vec!["t0", "t2", "t1"]);
    }

    #[test]
    fn theme_rows_filter_by_domain() {
        let rows = theme_rows(
            &store(),
            &ThemeFilter {
                domain: Some("policy".into()),
                window: None,
            },
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].grouping_key, "t2");
    }

    #[test]
    fn windowed_theme_rows_recompute_from_counts() {
        let window = RecencyWindow {
            months: 6,
            as_of: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        };
        let rows = theme_rows(
            &store(),
            &ThemeFilter {
                domain: None,
                window: Some(window),
            },
        );
        // X and Z are recent; Y (2023) and Undated are not.
        let t1 = rows.iter().find(|r| r.grouping_key == "t1").unwrap();
        assert_eq!(t1.num_responses, 4);
        assert_eq!(t1.num_models, 2);
        assert!((t1.pct_complete_overall - 75.0).abs() < 1e-9);
        let t3 = rows.iter().find(|r| r.grouping_key == "t3").unwrap();
        assert_eq!(t3.pct_complete_overall, 0.0);
        assert!(rows.iter().all(|r| r.grouping_key != "t0"));
    }

    #[test]
    fn domain_filtered_model_detail() {
        let rows = model_theme_rows(&store(), "Z", &["safety".to_string()]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pct_complete, 50.0);
    }

    #[test]
    fn empty_domain_filter_means_everything() {
        let rows = model_theme_rows(&store(), "Z", &[]);
        let keys: Vec<&str> = rows.iter().map(|r| r.grouping_key.as_str()).collect();
        assert_eq!(keys, vec!["t3", "t1"]);
        assert!(model_theme_rows(&store(), "ghost", &[]).is_empty());
    }

    #[test]
    fn timeline_skips_undated_and_orders_by_date() {
        let points = timeline_points(&store(), &TimelineFilter::default());
        let models: Vec<&str> = points.iter().map(|p| p.model.as_str()).collect();
        assert_eq!(models, vec!["Y", "Z", "X"]);
        assert!((points[1].value - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn timeline_applies_creator_domain_and_metric() {
        let filter = TimelineFilter {
            domain: Some("policy".into()),
            creator: Some("Acme".into()),
            metric: Metric::Denial,
            highlight: None,
        };
        let points = timeline_points(&store(), &filter);
        let got: Vec<(&str, f64)> = points.iter().map(|p| (p.model.as_str(), p.value)).collect();
        assert_eq!(got, vec![("Z", 100.0), ("X", 50.0)]);
    }

    #[test]
    fn timeline_excludes_models_without_matching_responses() {
        let filter = TimelineFilter {
            domain: Some("nonexistent".into()),
            ..Default::default()
        };
        assert!(timeline_points(&store(), &filter).is_empty());
    }

    #[test]
    fn breakdown_sums_across_themes() {
        let b = model_breakdown(&store(), "X");
        assert_eq!(b.total, 4);
        assert_eq!(b.pct_complete, 75.0);
        assert_eq!(b.by_domain[0].domain, "policy");
        assert_eq!(b.shares.len(), 4);
        assert_eq!(model_domains(&store(), "Z"), vec!["policy".to_string(), "safety".to_string()]);
    }

    #[test]
    fn release_dates_accept_rfc3339() {
        assert_eq!(
            parse_release_date("2024-05-13T00:00:00Z"),
            NaiveDate::from_ymd_opt(2024, 5, 13)
        );
        assert_eq!(parse_release_date("May 2024"), None);
    }

    #[test]
    fn timeline_points_serialize_with_iso_dates() {
        let points = timeline_points(&store(), &TimelineFilter::default());
        let v = serde_json::to_value(&points[0]).unwrap();
        assert_eq!(v["model"], "Y");
        assert!(v["date"].as_str().is_some_and(|d| d.len() == 10 && d.as_bytes()[4] == b'-'));
    }

    fn detail_record(model: &str, anchor: Option<&str>, variation: &str, compliance: &str) -> ThemeDetailRecord {
        serde_json::from_value(serde_json::json!({
            "model": model, "domain": "safety", "variation": variation, "grouping_key": "theme-42",
            "compliance": compliance, "anchor_id": anchor, "response_text": "text",
            "question_text": "Write an essay."
        }))
        .unwrap()
    }

    #[test]
    fn detail_groups_carry_labels_links_and_anchors() {
        let detail = ThemeDetailBundle::new(
            "theme-42",
            vec![
                detail_record("acme/v1", None, "2", "COMPLETE"),
                detail_record("acme/v1", None, "1", "COMPLETE"),
                detail_record("beta", Some("model-beta"), "0", "DENIAL"),
            ],
        );
        let groups = group_by_model(&detail);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].anchor_id, "model-acme-v1");
        let labels: Vec<&str> = groups[0].responses.iter().map(|e| e.variation_label.as_str()).collect();
        assert_eq!(labels, vec!["Type 1: Draft Essay", "Type 2: Explain Benefits"]);
        assert_eq!(groups[1].responses[0].variation_label, "Type N/A");
        let link = groups[0].responses[0].chat_link.as_deref().unwrap();
        assert!(link.starts_with("https://openrouter.ai/chat?models=acme%2Fv1&message=Write"));

        let summary = theme_model_summary(&detail);
        assert_eq!(summary[0].band, ComplianceBand::High);
        assert_eq!(summary[1].anchor_id, "model-beta");
        assert_eq!(summary[1].band, ComplianceBand::Low);
    }
}
