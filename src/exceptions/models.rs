use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Directory holding both exception files, relative to the repository root
pub const EXCEPTIONS_DIR: &str = ".sca-exceptions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionKind {
    /// Listed in the SBOM but needs no license file
    FalsePositive,
    /// Needs a license file but is missing from the SBOM
    FalseNegative,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 2] = [ExceptionKind::FalsePositive, ExceptionKind::FalseNegative];

    pub fn file_name(self) -> &'static str {
        match self {
            ExceptionKind::FalsePositive => "false-positives.json",
            ExceptionKind::FalseNegative => "false-negatives.json",
        }
    }

    /// Path of the exception file relative to a repository root, `/`-separated
    pub fn relative_path(self) -> String {
        format!("{}/{}", EXCEPTIONS_DIR, self.file_name())
    }

    pub fn description(self) -> &'static str {
        match self {
            ExceptionKind::FalsePositive => "SBOM dependencies that do not require a license file",
            ExceptionKind::FalseNegative => "Dependencies that require a license file but are missing from the SBOM",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionKind::FalsePositive => f.write_str("false positive"),
            ExceptionKind::FalseNegative => f.write_str("false negative"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExceptionEntry {
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

impl ExceptionEntry {
    pub fn new(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: comment.into(),
        }
    }
}

/// On-disk shape of an exception file
#[derive(Debug, Clone, Serialize)]
pub struct ExceptionsDocument {
    pub exceptions: Vec<ExceptionEntry>,
    pub description: String,
    pub last_updated: DateTime<Utc>,
}

impl ExceptionsDocument {
    pub fn new(kind: ExceptionKind, mut exceptions: Vec<ExceptionEntry>) -> Self {
        exceptions.sort();
        Self {
            exceptions,
            description: kind.description().to_string(),
            last_updated: Utc::now(),
        }
    }
}

/// Parse an exception file.
///
/// Accepts `{"exceptions": [...]}` as well as a bare array, with entries either
/// `{"name": .., "comment": ..}` objects or plain strings.
pub fn parse_exception_entries(content: &str) -> Result<Vec<ExceptionEntry>> {
    let value: Value = serde_json::from_str(content).context("Invalid JSON")?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("exceptions") {
            Some(Value::Array(items)) => items,
            _ => bail!("Expected an \"exceptions\" array"),
        },
        _ => bail!("Unexpected exception file format"),
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(name) => entries.push(ExceptionEntry::new(name, "")),
            Value::Object(_) => match serde_json::from_value::<ExceptionEntry>(item) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping invalid exception entry: {}", e),
            },
            other => warn!("Skipping invalid exception entry: {}", other),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_documented_shape() {
        let content = r#"{
            "exceptions": [
                {"name": "com.google.guava:guava", "comment": "shaded"},
                {"name": "jsr305"}
            ],
            "description": "whatever",
            "last_updated": "2024-01-01T00:00:00Z"
        }"#;
        let entries = parse_exception_entries(content).unwrap();
        assert_eq!(
            entries,
            vec![
                ExceptionEntry::new("com.google.guava:guava", "shaded"),
                ExceptionEntry::new("jsr305", ""),
            ]
        );
    }

    #[test]
    fn test_parse_legacy_shapes() {
        assert_eq!(
            parse_exception_entries(r#"["a", "b"]"#).unwrap(),
            vec![ExceptionEntry::new("a", ""), ExceptionEntry::new("b", "")]
        );
        assert_eq!(
            parse_exception_entries(r#"{"exceptions": ["a", 42, {"comment": "no name"}]}"#).unwrap(),
            vec![ExceptionEntry::new("a", "")]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(parse_exception_entries("not json").is_err());
        assert!(parse_exception_entries(r#"{"items": []}"#).is_err());
        assert!(parse_exception_entries("42").is_err());
    }

    #[test]
    fn test_document_is_sorted() {
        let document = ExceptionsDocument::new(
            ExceptionKind::FalsePositive,
            vec![ExceptionEntry::new("zeta", ""), ExceptionEntry::new("alpha", "")],
        );
        assert_eq!(document.exceptions[0].name, "alpha");
        assert_eq!(ExceptionKind::FalseNegative.relative_path(), ".sca-exceptions/false-negatives.json");
    }
}
