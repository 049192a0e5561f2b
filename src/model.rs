//! Wire types for the metadata document and the per-theme detail blobs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level keys the metadata document must carry.
pub const REQUIRED_METADATA_KEYS: [&str; 6] = [
    "complianceOrder",
    "model_metadata",
    "stats",
    "model_summary",
    "question_theme_summary",
    "model_theme_summary",
];

/// Categorical judgment of a single model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Compliance {
    Complete,
    Evasive,
    Denial,
    Error,
    Unknown,
}

impl Compliance {
    pub const ORDER: [Compliance; 4] = [
        Compliance::Complete,
        Compliance::Evasive,
        Compliance::Denial,
        Compliance::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Compliance::Complete => "COMPLETE",
            Compliance::Evasive => "EVASIVE",
            Compliance::Denial => "DENIAL",
            Compliance::Error => "ERROR",
            Compliance::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for Compliance {
    fn from(label: String) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "COMPLETE" => Compliance::Complete,
            "EVASIVE" => Compliance::Evasive,
            "DENIAL" => Compliance::Denial,
            "ERROR" => Compliance::Error,
            _ => Compliance::Unknown,
        }
    }
}

impl From<Compliance> for String {
    fn from(c: Compliance) -> Self {
        c.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummaryRow {
    pub model: String,
    pub num_responses: u64,
    pub pct_complete_overall: f64,
    pub pct_evasive: f64,
    pub pct_denial: f64,
    pub pct_error: f64,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeSummaryRow {
    pub grouping_key: String,
    pub domain: String,
    pub num_responses: u64,
    pub num_models: u64,
    pub pct_complete_overall: f64,
    pub pct_evasive: f64,
    pub pct_denial: f64,
    pub pct_error: f64,
}

/// Raw counts for one (model, theme) cell of the cross-tabulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelThemeStat {
    #[serde(default)]
    pub domain: String,
    #[serde(rename = "c", default)]
    pub count: u64,
    #[serde(rename = "k", default)]
    pub complete: u64,
    #[serde(rename = "e", default)]
    pub evasive: u64,
    #[serde(rename = "d", default)]
    pub denial: u64,
    #[serde(rename = "r", default)]
    pub error: u64,
}

impl ModelThemeStat {
    pub fn count_of(&self, c: Compliance) -> u64 {
        match c {
            Compliance::Complete => self.complete,
            Compliance::Evasive => self.evasive,
            Compliance::Denial => self.denial,
            Compliance::Error => self.error,
            Compliance::Unknown => self
                .count
                .saturating_sub(self.complete + self.evasive + self.denial + self.error),
        }
    }
}

/// `model -> grouping_key -> counts`
pub type ModelThemeSummary = BTreeMap<String, BTreeMap<String, ModelThemeStat>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    #[serde(default)]
    pub models: u64,
    #[serde(default)]
    pub themes: u64,
    #[serde(default)]
    pub judgments: u64,
    #[serde(default)]
    pub complete: u64,
}

/// The whole metadata document, loaded once per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataBundle {
    #[serde(rename = "complianceOrder")]
    pub compliance_order: Vec<String>,
    pub model_metadata: BTreeMap<String, ModelMetadata>,
    pub stats: DatasetStats,
    pub model_summary: Vec<ModelSummaryRow>,
    pub question_theme_summary: Vec<ThemeSummaryRow>,
    pub model_theme_summary: ModelThemeSummary,
}

/// One judged model response inside a theme detail blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeDetailRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(deserialize_with = "de_text")]
    pub model: String,
    #[serde(deserialize_with = "de_text", default)]
    pub domain: String,
    #[serde(deserialize_with = "de_variation", default)]
    pub variation: u8,
    pub grouping_key: String,
    pub compliance: Compliance,
    #[serde(deserialize_with = "de_text", default)]
    pub anchor_id: String,
    #[serde(deserialize_with = "de_text", default)]
    pub response_text: String,
    #[serde(default)]
    pub question_text: Option<String>,
    #[serde(default)]
    pub judge_analysis: Option<String>,
    #[serde(default)]
    pub judge_model: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub is_partial_response: bool,
    #[serde(default)]
    pub original_question_id: Option<String>,
    #[serde(default)]
    pub sub_topic_key: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub api_model: Option<String>,
    #[serde(default)]
    pub original_api_provider: Option<String>,
}

/// `null` reads as empty; refused or errored calls carry no content.
fn de_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Variations arrive as `"3"` from the preprocessor but may be numeric.
fn de_variation<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()).unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// All responses for one grouping key, sorted by `(model, variation)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeDetailBundle {
    pub grouping_key: String,
    pub records: Vec<ThemeDetailRecord>,
}

impl ThemeDetailBundle {
    pub fn new(grouping_key: impl Into<String>, mut records: Vec<ThemeDetailRecord>) -> Self {
        records.sort_by(|a, b| a.model.cmp(&b.model).then(a.variation.cmp(&b.variation)));
        Self {
            grouping_key: grouping_key.into(),
            records,
        }
    }

    /// Domain of the theme, taken from its first record.
    pub fn domain(&self) -> Option<&str> {
        self.records.first().map(|r| r.domain.as_str())
    }
}
