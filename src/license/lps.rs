use serde::Serialize;
use tracing::{info, warn};

use super::comparison::{ComparisonEngine, ComparisonResult};
use super::content::{LicenseContentMatcher, LicenseContentValidator};
use super::extractor::{ExtractedLicenses, LicenseExtractor};
use super::sbom::Sbom;
use super::Artifact;
use crate::exceptions::ExceptionManager;

/// Coverage below this is reported as an issue of its own
pub const MIN_COVERAGE_PERCENTAGE: f64 = 80.0;

/// License Packaging Standard verdict for a set of artifacts
#[derive(Debug, Clone, Default, Serialize)]
pub struct LpsReport {
    pub compliant: bool,
    pub artifacts_processed: usize,
    pub licenses_extracted: ExtractedLicenses,
    pub sbom_comparison: Option<ComparisonResult>,
    pub issues: Vec<String>,
}

impl LpsReport {
    pub fn third_party_license_count(&self) -> usize {
        self.licenses_extracted
            .values()
            .map(|licenses| licenses.third_party_licenses().count())
            .sum()
    }

    /// Check third-party license texts against the licenses the SBOM declares.
    /// Every mismatch becomes an issue.
    pub fn apply_content_validation(&mut self, validator: &LicenseContentValidator, sbom: &Sbom) {
        let matches = LicenseContentMatcher::new(validator).match_licenses_to_components(&self.licenses_extracted, sbom);
        for error in &matches.validation_errors {
            self.issues
                .push(format!("{} in {}: {}", error.license_file, error.artifact, error.error));
        }
        self.compliant = self.issues.is_empty();
    }
}

#[derive(Debug, Clone, Default)]
pub struct LpsValidator {
    extractor: LicenseExtractor,
}

impl LpsValidator {
    pub fn new(extractor: LicenseExtractor) -> Self {
        Self { extractor }
    }

    pub fn validate_artifacts(
        &self,
        artifacts: &[Artifact],
        sbom: Option<&Sbom>,
        exceptions: &ExceptionManager,
    ) -> LpsReport {
        let extracted = self.extractor.extract_from_artifacts(artifacts);
        Self::validate_extracted(extracted, sbom, exceptions)
    }

    /// Judge licenses that were already extracted
    pub fn validate_extracted(
        extracted: ExtractedLicenses,
        sbom: Option<&Sbom>,
        exceptions: &ExceptionManager,
    ) -> LpsReport {
        let mut issues = packaging_issues(&extracted);

        let sbom_comparison = sbom.map(|sbom| {
            let comparison = ComparisonEngine::new(exceptions).compare(&extracted, sbom);
            if !comparison.missing.is_empty() {
                issues.push(format!(
                    "Missing licenses for {} SBOM components",
                    comparison.missing.len()
                ));
            }
            if comparison.coverage_percentage < MIN_COVERAGE_PERCENTAGE {
                issues.push(format!("Low license coverage: {:.1}%", comparison.coverage_percentage));
            }
            if !comparison.extra.is_empty() {
                issues.push(format!(
                    "Found {} license files without a matching SBOM component",
                    comparison.extra.len()
                ));
            }
            comparison
        });

        if sbom.is_none() {
            warn!("No SBOM available, skipping license comparison");
        }

        let report = LpsReport {
            compliant: issues.is_empty(),
            artifacts_processed: extracted.len(),
            licenses_extracted: extracted,
            sbom_comparison,
            issues,
        };
        info!(
            "LPS validation of {} artifacts: {} issues",
            report.artifacts_processed,
            report.issues.len()
        );
        report
    }
}

fn packaging_issues(extracted: &ExtractedLicenses) -> Vec<String> {
    let mut issues = Vec::new();

    for (artifact, licenses) in extracted {
        if let Some(reason) = &licenses.skipped {
            issues.push(format!("Could not inspect {}: {}", artifact, reason));
            continue;
        }
        if licenses.main_licenses().next().is_none() {
            issues.push(format!("Missing main LICENSE.txt in {}", artifact));
        }
        if licenses.third_party_licenses().next().is_none() {
            issues.push(format!("No third-party licenses found in {}", artifact));
        }
        if !licenses.has_licenses_dir {
            issues.push(format!("No licenses/ directory found in {}", artifact));
        }
        for inner in &licenses.non_compliant_inner_archives {
            issues.push(format!("Non-compliant inner archive {} in {}", inner, artifact));
        }
    }

    issues
}
