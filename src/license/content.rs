use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::extractor::ExtractedLicenses;
use super::names::extract_dependency_name_from_filename;
use super::sbom::Sbom;

/// License identifiers accepted for third-party dependencies
pub const ALLOWED_LICENSES: [&str; 9] = [
    "LGPL-2.1",
    "LGPL-3.0",
    "Apache-2.0",
    "MIT",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "EPL-1.0",
    "EPL-2.0",
    "PSF-2.0",
];

/// Minimum similarity for a license text to count as the expected license
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapse whitespace, replace template placeholders, lowercase
pub fn normalize_license_content(content: &str) -> String {
    WHITESPACE
        .replace_all(content.trim(), " ")
        .replace("[year]", "YYYY")
        .replace("[fullname]", "AUTHOR")
        .replace("[name of copyright owner]", "AUTHOR")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseValidation {
    pub valid: bool,
    pub score: f64,
    /// Reference license the text resembles most, or why there is none
    pub matched: String,
}

/// Compares license texts with a library of reference texts
#[derive(Debug, Clone, Default)]
pub struct LicenseContentValidator {
    references: BTreeMap<String, String>,
}

impl LicenseContentValidator {
    /// Load every `*.txt` in `dir`, keyed by file stem. A missing directory gives no references.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut references = BTreeMap::new();
        if !dir.is_dir() {
            warn!("Reference licenses directory not found: {}", dir.display());
            return Ok(Self { references });
        }

        let pattern = dir.join("*.txt");
        let pattern = pattern.to_string_lossy();
        for entry in glob::glob(&pattern).context("Invalid reference license pattern")? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Error accessing reference license: {}", e);
                    continue;
                }
            };
            let Some(stem) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(content) => {
                    debug!("Loaded reference license: {}", stem);
                    references.insert(stem, normalize_license_content(&content));
                }
                Err(e) => warn!("Failed to load reference license {}: {}", path.display(), e),
            }
        }

        Ok(Self { references })
    }

    pub fn from_references<I, K, V>(references: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        Self {
            references: references
                .into_iter()
                .map(|(name, content)| (name.into(), normalize_license_content(content.as_ref())))
                .collect(),
        }
    }

    pub fn available_licenses(&self) -> BTreeSet<&str> {
        self.references.keys().map(String::as_str).collect()
    }

    pub fn is_allowed(license: &str) -> bool {
        ALLOWED_LICENSES.contains(&license)
    }

    pub fn validate_license_content(&self, content: &str, expected: &str) -> LicenseValidation {
        if !Self::is_allowed(expected) {
            return LicenseValidation {
                valid: false,
                score: 0.0,
                matched: format!("Unknown license type: {}", expected),
            };
        }

        let normalized = normalize_license_content(content);
        if self.references.get(expected) == Some(&normalized) {
            return LicenseValidation {
                valid: true,
                score: 1.0,
                matched: expected.to_string(),
            };
        }

        let mut best: Option<(&str, f64)> = None;
        for (name, reference) in &self.references {
            let score = strsim::sorensen_dice(&normalized, reference);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((name.as_str(), score));
            }
        }

        // A closer match with another license only names it in `matched`
        match best {
            Some((name, score)) => LicenseValidation {
                valid: name == expected && score >= SIMILARITY_THRESHOLD,
                score,
                matched: name.to_string(),
            },
            None => LicenseValidation {
                valid: false,
                score: 0.0,
                matched: "No match found".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentMatch {
    pub artifact: String,
    pub license_file: String,
    pub dependency_name: String,
    pub component_name: String,
    pub expected_license: String,
    pub matched_license: String,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedLicense {
    pub artifact: String,
    pub license_file: String,
    pub dependency_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentValidationError {
    pub artifact: String,
    pub license_file: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted: Option<ContentMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentMatchReport {
    pub matched: Vec<ContentMatch>,
    pub unmatched: Vec<UnmatchedLicense>,
    pub validation_errors: Vec<ContentValidationError>,
    pub coverage_percentage: f64,
}

fn name_key(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Pairs third-party license files with SBOM components and checks their text
pub struct LicenseContentMatcher<'a> {
    validator: &'a LicenseContentValidator,
}

impl<'a> LicenseContentMatcher<'a> {
    pub fn new(validator: &'a LicenseContentValidator) -> Self {
        Self { validator }
    }

    pub fn match_licenses_to_components(&self, extracted: &ExtractedLicenses, sbom: &Sbom) -> ContentMatchReport {
        // Components without a declared license cannot be validated
        let components: BTreeMap<String, (&str, &str)> = sbom
            .named_components()
            .filter_map(|component| {
                component
                    .primary_license()
                    .map(|license| (name_key(&component.name), (component.name.as_str(), license)))
            })
            .collect();

        let mut report = ContentMatchReport::default();
        for (artifact, licenses) in extracted {
            for record in licenses.third_party_licenses() {
                let dependency_name = extract_dependency_name_from_filename(&record.name);
                if name_key(&dependency_name).is_empty() {
                    report.validation_errors.push(ContentValidationError {
                        artifact: artifact.clone(),
                        license_file: record.name.clone(),
                        error: "Could not extract dependency name from filename".to_string(),
                        attempted: None,
                    });
                    continue;
                }

                let Some((component_name, expected)) = components.get(&name_key(&dependency_name)) else {
                    report.unmatched.push(UnmatchedLicense {
                        artifact: artifact.clone(),
                        license_file: record.name.clone(),
                        dependency_name,
                    });
                    continue;
                };

                let validation = self.validator.validate_license_content(&record.content, expected);
                let attempt = ContentMatch {
                    artifact: artifact.clone(),
                    license_file: record.name.clone(),
                    dependency_name,
                    component_name: component_name.to_string(),
                    expected_license: expected.to_string(),
                    matched_license: validation.matched,
                    similarity_score: validation.score,
                };
                if validation.valid {
                    report.matched.push(attempt);
                } else {
                    report.validation_errors.push(ContentValidationError {
                        artifact: artifact.clone(),
                        license_file: record.name.clone(),
                        error: "License content does not match expected license".to_string(),
                        attempted: Some(attempt),
                    });
                }
            }
        }

        if !components.is_empty() {
            let matched_components: BTreeSet<&str> =
                report.matched.iter().map(|entry| entry.component_name.as_str()).collect();
            report.coverage_percentage = matched_components.len() as f64 * 100.0 / components.len() as f64;
        }

        report
    }
}
