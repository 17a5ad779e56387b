use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

const SUCCESS_PREFIX: &str = "\u{2705}";
const OPTIONAL_PREFIX: &str = "\u{2713}";
const FAILURE_PREFIX: &str = "\u{274c}";
const UNKNOWN_PREFIX: &str = "\u{2753}";

/// Detail lists longer than this are elided in text output
pub const DETAIL_SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Passed,
    NotRelevant,
    Failed,
    Error,
    /// A state reported by a worker that this crate does not know
    #[serde(other)]
    Unknown,
}

impl CheckState {
    pub fn passed(self) -> bool {
        match self {
            CheckState::Passed | CheckState::NotRelevant => true,
            CheckState::Failed | CheckState::Error | CheckState::Unknown => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckState::Passed => "PASSED",
            CheckState::NotRelevant => "NOT_RELEVANT",
            CheckState::Failed => "FAILED",
            CheckState::Error => "ERROR",
            CheckState::Unknown => "UNKNOWN",
        }
    }

    /// Parse a state as reported on the wire; anything unrecognised is `Unknown`
    pub fn from_wire(value: &str) -> Self {
        match value {
            "PASSED" => CheckState::Passed,
            "NOT_RELEVANT" => CheckState::NotRelevant,
            "FAILED" => CheckState::Failed,
            "ERROR" => CheckState::Error,
            _ => CheckState::Unknown,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            CheckState::Passed => SUCCESS_PREFIX,
            CheckState::NotRelevant => OPTIONAL_PREFIX,
            CheckState::Failed | CheckState::Error => FAILURE_PREFIX,
            CheckState::Unknown => UNKNOWN_PREFIX,
        }
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra information attached to a result for rich rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    Items(Vec<String>),
    Text(String),
}

impl From<Vec<String>> for Detail {
    fn from(items: Vec<String>) -> Self {
        Detail::Items(items)
    }
}

impl From<String> for Detail {
    fn from(text: String) -> Self {
        Detail::Text(text)
    }
}

impl From<&str> for Detail {
    fn from(text: &str) -> Self {
        Detail::Text(text.to_string())
    }
}

/// Outcome of one check. `passed` is always derived from `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    name: String,
    state: CheckState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    details: IndexMap<String, Detail>,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, state: CheckState, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            state,
            message,
            details: IndexMap::new(),
        }
    }

    pub fn passed_with(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckState::Passed, Some(message.into()))
    }

    pub fn failed_with(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckState::Failed, Some(message.into()))
    }

    pub fn error_with(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckState::Error, Some(message.into()))
    }

    /// Builder-style detail attachment, only used while constructing a result
    pub fn with_detail(mut self, key: impl Into<String>, detail: impl Into<Detail>) -> Self {
        self.details.insert(key.into(), detail.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn details(&self) -> &IndexMap<String, Detail> {
        &self.details
    }

    pub fn passed(&self) -> bool {
        self.state.passed()
    }

    fn format_details(&self) -> String {
        let mut lines = Vec::new();
        for (key, value) in &self.details {
            match value {
                Detail::Items(items) if !items.is_empty() => {
                    lines.push(format!("{}: {} items", key, items.len()));
                    for item in items.iter().take(DETAIL_SAMPLE_LIMIT) {
                        lines.push(format!("  \u{2022} {}", item));
                    }
                    if items.len() > DETAIL_SAMPLE_LIMIT {
                        lines.push(format!("  ... and {} more", items.len() - DETAIL_SAMPLE_LIMIT));
                    }
                }
                Detail::Text(text) if !text.is_empty() => lines.push(format!("{}: {}", key, text)),
                _ => {}
            }
        }
        lines.join("\n")
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut note = match &self.message {
            Some(message) => format!(" - {}", message),
            None => String::new(),
        };

        let details = self.format_details();
        if !details.is_empty() {
            note.push('\n');
            note.push_str(&details);
        }

        write!(f, "{} {} {}", self.state.prefix(), self.name, note)
    }
}
