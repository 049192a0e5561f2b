use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::model::{
    DatasetStats, MetadataBundle, ModelMetadata, ModelThemeStat, ModelThemeSummary, ThemeDetailBundle,
};

/// Reference data for one page session.
///
/// Summary data is installed exactly once. Theme detail bundles are added as
/// they arrive and are never replaced or evicted.
#[derive(Debug, Default)]
pub struct EntityStore {
    metadata: Option<Arc<MetadataBundle>>,
    model_ids: HashSet<String>,
    theme_ids: HashSet<String>,
    theme_details: HashMap<String, Arc<ThemeDetailBundle>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the metadata bundle. Returns false if one was already installed.
    pub fn install_metadata(&mut self, bundle: Arc<MetadataBundle>) -> bool {
        if self.metadata.is_some() {
            return false;
        }
        self.model_ids = bundle.model_summary.iter().map(|r| r.model.clone()).collect();
        self.theme_ids = bundle
            .question_theme_summary
            .iter()
            .map(|r| r.grouping_key.clone())
            .collect();
        self.metadata = Some(bundle);
        true
    }

    pub fn is_ready(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn metadata(&self) -> Option<&MetadataBundle> {
        self.metadata.as_deref()
    }

    pub fn has_model(&self, model: &str) -> bool {
        self.model_ids.contains(model)
    }

    pub fn has_theme(&self, grouping_key: &str) -> bool {
        self.theme_ids.contains(grouping_key)
    }

    pub fn stats(&self) -> DatasetStats {
        self.metadata().map(|m| m.stats.clone()).unwrap_or_default()
    }

    pub fn model_metadata(&self, model: &str) -> Option<&ModelMetadata> {
        self.metadata().and_then(|m| m.model_metadata.get(model))
    }

    pub fn model_themes(&self, model: &str) -> Option<&std::collections::BTreeMap<String, ModelThemeStat>> {
        self.metadata().and_then(|m| m.model_theme_summary.get(model))
    }

    pub fn model_theme_summary(&self) -> Option<&ModelThemeSummary> {
        self.metadata().map(|m| &m.model_theme_summary)
    }

    /// Distinct theme domains, sorted.
    pub fn domains(&self) -> Vec<String> {
        self.metadata()
            .map(|m| {
                m.question_theme_summary
                    .iter()
                    .map(|r| r.domain.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct model creators, sorted.
    pub fn creators(&self) -> Vec<String> {
        self.metadata()
            .map(|m| {
                m.model_metadata
                    .values()
                    .filter_map(|meta| meta.creator.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn theme_detail(&self, grouping_key: &str) -> Option<Arc<ThemeDetailBundle>> {
        self.theme_details.get(grouping_key).cloned()
    }

    pub fn has_theme_detail(&self, grouping_key: &str) -> bool {
        self.theme_details.contains_key(grouping_key)
    }

    /// Cache a loaded bundle. An existing entry is kept as is.
    pub fn insert_theme_detail(&mut self, bundle: Arc<ThemeDetailBundle>) -> Arc<ThemeDetailBundle> {
        self.theme_details
            .entry(bundle.grouping_key.clone())
            .or_insert(bundle)
            .clone()
    }

    pub fn cached_theme_count(&self) -> usize {
        self.theme_details.len()
    }
}
