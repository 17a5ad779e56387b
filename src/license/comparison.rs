use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::extractor::ExtractedLicenses;
use super::names::{extract_dependency_name_from_filename, find_fuzzy_matches, normalize_for_comparison};
use super::sbom::Sbom;
use crate::exceptions::ExceptionManager;

/// File names that carry no dependency name
const GENERIC_LICENSE_NAMES: [&str; 2] = ["license", "licenses"];

/// Outcome of reconciling license files with the SBOM. Rebuilt on every comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// Normalized `(sbom ∪ false negatives) − false positives`
    pub expected: BTreeSet<String>,
    /// Normalized dependency names taken from third-party license files
    pub actual: BTreeSet<String>,
    /// Expected name -> the license name it was matched with
    pub matched: BTreeMap<String, String>,
    pub missing: BTreeSet<String>,
    pub extra: BTreeSet<String>,
    pub coverage_percentage: f64,
    /// False positives that removed a name from the expected set
    pub false_positives_used: BTreeSet<String>,
    /// False negatives that added a name the SBOM lacked
    pub false_negatives_used: BTreeSet<String>,
    pub licenses_found: usize,
}

impl ComparisonResult {
    /// No missing, no extra and full coverage. Partial coverage is never compliant.
    pub fn is_compliant(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.coverage_percentage == 100.0
    }
}

fn normalized(names: impl IntoIterator<Item = impl AsRef<str>>) -> BTreeSet<String> {
    names
        .into_iter()
        .map(|name| normalize_for_comparison(name.as_ref()))
        .filter(|name| !name.is_empty())
        .collect()
}

pub struct ComparisonEngine<'a> {
    exceptions: &'a ExceptionManager,
}

impl<'a> ComparisonEngine<'a> {
    pub fn new(exceptions: &'a ExceptionManager) -> Self {
        Self { exceptions }
    }

    /// Compare the third-party licenses of every artifact with the SBOM components
    pub fn compare(&self, extracted: &ExtractedLicenses, sbom: &Sbom) -> ComparisonResult {
        let records: Vec<_> = extracted
            .values()
            .flat_map(|licenses| licenses.third_party_licenses())
            .collect();

        let license_names: Vec<String> = records
            .iter()
            .map(|record| extract_dependency_name_from_filename(&record.name))
            .filter(|name| !GENERIC_LICENSE_NAMES.contains(&name.to_lowercase().as_str()))
            .collect();

        info!(
            "Comparing {} third-party licenses with {} SBOM components",
            records.len(),
            sbom.named_components().count()
        );

        let mut result = self.compare_names(license_names, sbom.component_names());
        result.licenses_found = records.len();
        result
    }

    /// Compare dependency names from license files with names reported by SCA
    pub fn compare_names(
        &self,
        license_names: impl IntoIterator<Item = impl AsRef<str>>,
        sca_names: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> ComparisonResult {
        let actual = normalized(license_names);
        let sca = normalized(sca_names);
        let false_positives = normalized(self.exceptions.false_positives());
        let false_negatives = normalized(self.exceptions.false_negatives());

        let declared: BTreeSet<String> = sca.union(&false_negatives).cloned().collect();
        let expected: BTreeSet<String> = declared.difference(&false_positives).cloned().collect();

        let mut matched: BTreeMap<String, String> = expected
            .intersection(&actual)
            .map(|name| (name.clone(), name.clone()))
            .collect();
        for (sca_name, license_name) in find_fuzzy_matches(&expected, &actual) {
            debug!("Fuzzy matched {} with license {}", sca_name, license_name);
            matched.insert(sca_name, license_name);
        }

        let used_licenses: BTreeSet<&String> = matched.values().collect();
        let missing: BTreeSet<String> = expected
            .iter()
            .filter(|name| !matched.contains_key(*name))
            .cloned()
            .collect();
        let extra: BTreeSet<String> = actual
            .iter()
            .filter(|name| !used_licenses.contains(name))
            .cloned()
            .collect();

        let coverage_percentage = if expected.is_empty() {
            0.0
        } else {
            matched.len() as f64 * 100.0 / expected.len() as f64
        };

        ComparisonResult {
            false_positives_used: false_positives.intersection(&declared).cloned().collect(),
            false_negatives_used: false_negatives.difference(&sca).cloned().collect(),
            expected,
            actual,
            matched,
            missing,
            extra,
            coverage_percentage,
            licenses_found: 0,
        }
    }
}
