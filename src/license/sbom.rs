use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CycloneDX-shaped bill of materials. Only the fields used for license checks are read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sbom {
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub licenses: Vec<LicenseChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LicenseChoice {
    License { license: LicenseRef },
    Expression { expression: String },
    Plain(String),
}

impl LicenseChoice {
    /// SPDX id, license name or expression, whichever is present
    pub fn identifier(&self) -> Option<&str> {
        match self {
            LicenseChoice::License { license } => license.id.as_deref().or(license.name.as_deref()),
            LicenseChoice::Expression { expression } => Some(expression.as_str()),
            LicenseChoice::Plain(value) => Some(value.as_str()),
        }
    }
}

impl Component {
    /// First declared license identifier
    pub fn primary_license(&self) -> Option<&str> {
        self.licenses.iter().find_map(LicenseChoice::identifier)
    }
}

impl Sbom {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse SBOM")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read SBOM: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid SBOM: {}", path.display()))
    }

    /// Components with a non-empty name
    pub fn named_components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(|component| !component.name.trim().is_empty())
    }

    /// Component names without their group, the form exception lists use
    pub fn component_names(&self) -> Vec<&str> {
        self.named_components().map(|component| component.name.as_str()).collect()
    }
}

/// Where the SBOM of a project branch comes from
pub trait SbomSource: Send + Sync {
    fn fetch_sbom(&self, project_key: &str, branch: &str) -> Result<Sbom>;
}

/// SBOM exported to a local file
#[derive(Debug, Clone)]
pub struct SbomFile {
    path: PathBuf,
}

impl SbomFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SbomSource for SbomFile {
    fn fetch_sbom(&self, _project_key: &str, _branch: &str) -> Result<Sbom> {
        Sbom::load(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "bomFormat": "CycloneDX",
        "components": [
            {"name": "guava", "group": "com.google.guava", "version": "32.1.2",
             "licenses": [{"license": {"id": "Apache-2.0"}}]},
            {"name": "jsr305", "group": "com.google.code.findbugs",
             "licenses": [{"license": {"name": "The Apache Software License"}}]},
            {"name": "commons-io", "licenses": [{"expression": "Apache-2.0 OR MIT"}]},
            {"name": "legacy", "licenses": ["MIT"]},
            {"name": "", "group": "ignored"},
            {"name": "unlicensed"}
        ]
    }"#;

    #[test]
    fn test_parse_components() {
        let sbom = Sbom::from_json(SAMPLE).unwrap();
        assert_eq!(sbom.components.len(), 6);
        assert_eq!(
            sbom.component_names(),
            vec![
                "guava",
                "jsr305",
                "commons-io",
                "legacy",
                "unlicensed",
            ]
        );

        let licenses: Vec<Option<&str>> = sbom.components.iter().map(Component::primary_license).collect();
        assert_eq!(
            licenses,
            vec![
                Some("Apache-2.0"),
                Some("The Apache Software License"),
                Some("Apache-2.0 OR MIT"),
                Some("MIT"),
                None,
                None,
            ]
        );
    }

    #[test]
    fn test_missing_components_is_empty() {
        let sbom = Sbom::from_json("{}").unwrap();
        assert!(sbom.components.is_empty());
    }

    #[test]
    fn test_sbom_file_source() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sbom.json");
        fs::write(&path, SAMPLE).unwrap();

        let sbom = SbomFile::new(&path).fetch_sbom("project", "master").unwrap();
        assert_eq!(sbom.named_components().count(), 5);

        let missing = SbomFile::new(temp_dir.path().join("absent.json")).fetch_sbom("project", "master");
        assert!(missing.is_err());
    }
}
