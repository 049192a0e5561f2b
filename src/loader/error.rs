use thiserror::Error;

/// Why a blob could not be turned into data.
///
/// Cloneable so a deduplicated load can hand the same outcome to every
/// waiter. Nothing here is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("network error fetching {url}{}: {detail}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Network {
        url: String,
        status: Option<u16>,
        detail: String,
    },
    #[error("could not decompress {url}: {detail}")]
    Decompression { url: String, detail: String },
    #[error("invalid JSON in {url}: {detail}")]
    Parse { url: String, detail: String },
    #[error("{url}: field '{field}' {detail}")]
    Schema {
        url: String,
        field: String,
        detail: String,
    },
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Network { .. } => "network",
            LoadError::Decompression { .. } => "decompression",
            LoadError::Parse { .. } => "parse",
            LoadError::Schema { .. } => "schema",
        }
    }

    pub fn missing_field(url: &str, field: &str) -> Self {
        LoadError::Schema {
            url: url.to_string(),
            field: field.to_string(),
            detail: "is missing".to_string(),
        }
    }

    /// Message shown in the view region that asked for the data.
    pub fn user_message(&self) -> String {
        match self {
            LoadError::Network { status: Some(s), .. } => {
                format!("Failed to load data (HTTP {}). Try again.", s)
            }
            LoadError::Network { .. } => "Failed to load data: network error. Try again.".to_string(),
            LoadError::Decompression { .. } => "Failed to load data: corrupt download.".to_string(),
            LoadError::Parse { .. } | LoadError::Schema { .. } => {
                format!("Failed to load data: {}", self)
            }
        }
    }
}
