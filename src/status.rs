use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum PageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Any status the backend sends that is not recognized; keeps the raw text.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Success,
    Active,
    Danger,
    Neutral,
}

impl PageStatus {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "pending" | "queued" => Self::Pending,
            "in_progress" | "processing" | "running" => Self::InProgress,
            "completed" => Self::Completed,
            "error" | "failed" => Self::Failed,
            _ => Self::Other(raw.trim().to_owned()),
        }
    }

    pub fn key(&self) -> String {
        match self {
            Self::Pending => "pending".to_owned(),
            Self::InProgress => "in_progress".to_owned(),
            Self::Completed => "completed".to_owned(),
            Self::Failed => "failed".to_owned(),
            Self::Other(raw) => raw.clone(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Pending => "Pending".to_owned(),
            Self::InProgress => "In Progress".to_owned(),
            Self::Completed => "Completed".to_owned(),
            Self::Failed => "Failed".to_owned(),
            Self::Other(raw) => humanize(raw).unwrap_or_else(|| "Unknown".to_owned()),
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            Self::Completed => StatusTone::Success,
            Self::Pending | Self::InProgress => StatusTone::Active,
            Self::Failed => StatusTone::Danger,
            Self::Other(_) => StatusTone::Neutral,
        }
    }
}

impl Default for PageStatus {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<Option<String>> for PageStatus {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl From<PageStatus> for String {
    fn from(status: PageStatus) -> Self {
        status.key()
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Status filter for the page table; `all` is the identity filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(PageStatus),
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Self {
        if normalize(raw) == "all" {
            Self::All
        } else {
            Self::Only(PageStatus::parse(raw))
        }
    }

    pub fn matches(&self, status: &PageStatus) -> bool {
        match (self, status) {
            (Self::All, _) => true,
            (Self::Only(PageStatus::Other(want)), PageStatus::Other(have)) => {
                normalize(want) == normalize(have)
            }
            (Self::Only(want), have) => want == have,
        }
    }
}

/// Lower-case, trimmed, with spaces and dashes folded to underscores.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// `on_hold` -> `On Hold`; `None` for an empty input.
pub fn humanize(raw: &str) -> Option<String> {
    let key = normalize(raw);
    if key.is_empty() {
        return None;
    }
    Some(key.split('_').map(capitalize).collect::<Vec<_>>().join(" "))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
