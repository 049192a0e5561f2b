//! Display formatting shared by every view.

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::loader::slug;
use crate::model::Compliance;

const CHAT_BASE: &str = "https://openrouter.ai/chat";
const DARK_TEXT: &str = "#333";
const LIGHT_TEXT: &str = "white";

impl Compliance {
    pub fn color(&self) -> &'static str {
        match self {
            Compliance::Complete => "#2ecc71",
            Compliance::Evasive => "#f1c40f",
            Compliance::Denial => "#e74c3c",
            Compliance::Error => "#9b59b6",
            Compliance::Unknown => "#bdc3c7",
        }
    }

    /// Label text colour readable on top of [`Compliance::color`].
    pub fn text_color(&self) -> &'static str {
        match self {
            Compliance::Evasive | Compliance::Unknown => DARK_TEXT,
            _ => LIGHT_TEXT,
        }
    }
}

/// Colour band for an aggregate complete percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceBand {
    High,
    Mid,
    Low,
    Unknown,
}

impl ComplianceBand {
    pub fn for_percent(pct: f64) -> Self {
        if pct.is_nan() {
            ComplianceBand::Unknown
        } else if pct >= 90.0 {
            ComplianceBand::High
        } else if pct >= 25.0 {
            ComplianceBand::Mid
        } else {
            ComplianceBand::Low
        }
    }

    fn compliance(&self) -> Compliance {
        match self {
            ComplianceBand::High => Compliance::Complete,
            ComplianceBand::Mid => Compliance::Evasive,
            ComplianceBand::Low => Compliance::Denial,
            ComplianceBand::Unknown => Compliance::Unknown,
        }
    }

    pub fn color(&self) -> &'static str {
        self.compliance().color()
    }

    pub fn text_color(&self) -> &'static str {
        self.compliance().text_color()
    }
}

/// `12345 -> "12K+"`, `9876 -> "9,876"`.
pub fn format_judgments(n: u64) -> String {
    if n >= 10_000 {
        return format!("{}K+", n / 1000);
    }
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `release_date -> "Release Date"`.
pub fn format_meta_key(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_meta_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn variation_label(variation: u8) -> String {
    match variation {
        1 => "Type 1: Draft Essay".to_string(),
        2 => "Type 2: Explain Benefits".to_string(),
        3 => "Type 3: Satirize Opponents".to_string(),
        4 => "Type 4: Passionate Speech".to_string(),
        0 => "Type N/A".to_string(),
        n => format!("Type {}", n),
    }
}

/// Anchor id of a model's block on the theme detail page.
pub fn model_anchor(model: &str) -> String {
    format!("model-{}", slug(model))
}

/// Link that opens the prompt against the model in a chat playground.
pub fn chat_link(model: &str, prompt: &str) -> String {
    match Url::parse_with_params(CHAT_BASE, &[("models", model), ("message", prompt)]) {
        Ok(url) => url.to_string(),
        Err(_) => CHAT_BASE.to_string(),
    }
}
