//! License Packaging Standard engine: extraction of license files from build
//! artifacts, name normalization, SBOM comparison and content validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod archive;
pub mod comparison;
pub mod content;
pub mod extractor;
pub mod lps;
pub mod names;
pub mod sbom;

pub use comparison::{ComparisonEngine, ComparisonResult};
pub use content::{ContentMatchReport, LicenseContentMatcher, LicenseContentValidator, LicenseValidation};
pub use extractor::{ArtifactLicenses, ExtractedLicenses, LicenseExtractor};
pub use lps::{LpsReport, LpsValidator};
pub use names::{extract_dependency_name_from_filename, find_fuzzy_matches, normalize_for_comparison};
pub use sbom::{Component, LicenseChoice, Sbom, SbomFile, SbomSource};

/// Directory required at the root of every distributable archive
pub const LICENSES_DIR: &str = "licenses";
pub const THIRD_PARTY_DIR: &str = "THIRD_PARTY_LICENSES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseKind {
    /// License of the artifact itself (`licenses/LICENSE.*`)
    Main,
    ThirdParty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseFormat {
    Text,
    Html,
}

impl LicenseFormat {
    /// Format for a supported license file extension (lowercase, without dot)
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "txt" | "md" => Some(LicenseFormat::Text),
            "html" | "htm" => Some(LicenseFormat::Html),
            _ => None,
        }
    }
}

/// One license file found in an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseFileRecord {
    pub kind: LicenseKind,
    pub format: LicenseFormat,
    /// `main`, `inner_<archive>` or `dedicated_<archive>`
    pub source: String,
    /// Path relative to the unpacked root that held it, `/`-separated
    pub path: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub content: String,
}

impl LicenseFileRecord {
    pub fn is_third_party(&self) -> bool {
        self.kind == LicenseKind::ThirdParty
    }
}

/// A build artifact on local disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Use the file name as the artifact name
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}
