use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use super::{CheckContext, CheckResult, InlineCheck};
use crate::buildinfo::BuildInfo;
use crate::exceptions::{ExceptionManager, RemoteExceptions};
use crate::license::{Artifact, LicenseContentValidator, LicenseExtractor, LpsValidator, Sbom, SbomSource};

pub const CHECK_LICENSES: &str = "CheckLicenses";

const ARTIFACT_PATTERNS: [&str; 3] = ["*.jar", "*.zip", "*.nupkg"];

/// Where the artifacts of a build come from
pub trait ArtifactSource: Send + Sync {
    fn fetch_artifacts(&self, context: &CheckContext) -> Result<Vec<Artifact>>;
}

/// Artifacts already downloaded to a directory, optionally selected by a build info file
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    dir: PathBuf,
    build_info: Option<PathBuf>,
}

impl LocalArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            build_info: None,
        }
    }

    pub fn with_build_info(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_info = Some(path.into());
        self
    }

    fn all_archives(&self) -> Result<Vec<Artifact>> {
        let mut paths = Vec::new();
        for pattern in ARTIFACT_PATTERNS {
            let pattern = self.dir.join(pattern);
            for entry in glob::glob(&pattern.to_string_lossy()).context("Invalid artifact pattern")? {
                match entry {
                    Ok(path) => paths.push(path),
                    Err(e) => warn!("Error accessing artifact: {}", e),
                }
            }
        }
        paths.sort();
        Ok(paths.into_iter().map(Artifact::from_path).collect())
    }
}

impl ArtifactSource for LocalArtifactStore {
    fn fetch_artifacts(&self, context: &CheckContext) -> Result<Vec<Artifact>> {
        if !self.dir.is_dir() {
            anyhow::bail!("Artifact directory not found: {}", self.dir.display());
        }

        let Some(build_info_path) = &self.build_info else {
            return self.all_archives();
        };

        let build_info = BuildInfo::load(build_info_path)?;
        let mut artifacts = Vec::new();
        for coordinate in build_info.artifacts_for_inspection(&context.version) {
            let file_name = coordinate.file_name();
            let candidates = [self.dir.join(&file_name), self.dir.join(coordinate.repository_path())];
            match candidates.into_iter().find(|path| path.is_file()) {
                Some(path) => artifacts.push(Artifact::new(file_name, path)),
                None => warn!("Artifact {} not found in {}", file_name, self.dir.display()),
            }
        }
        Ok(artifacts)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LicenseCheckSettings {
    /// SBOM project; without one the check is bypassed
    pub project_key: Option<String>,
    /// Repository holding `.sca-exceptions/`
    pub repository_root: PathBuf,
    /// Reference license texts enabling content validation
    pub reference_licenses_dir: Option<PathBuf>,
    pub scratch_root: Option<PathBuf>,
}

/// License Packaging Standard compliance of the build artifacts
pub struct CheckLicenses {
    settings: LicenseCheckSettings,
    artifacts: Box<dyn ArtifactSource>,
    sbom: Option<Box<dyn SbomSource>>,
    remote_exceptions: Option<RemoteExceptions>,
}

impl CheckLicenses {
    pub fn new(settings: LicenseCheckSettings, artifacts: Box<dyn ArtifactSource>) -> Self {
        Self {
            settings,
            artifacts,
            sbom: None,
            remote_exceptions: None,
        }
    }

    pub fn with_sbom_source(mut self, sbom: Box<dyn SbomSource>) -> Self {
        self.sbom = Some(sbom);
        self
    }

    pub fn with_remote_exceptions(mut self, remote: RemoteExceptions) -> Self {
        self.remote_exceptions = Some(remote);
        self
    }

    fn fetch_sbom(&self, project_key: &str, branch: &str) -> Option<Sbom> {
        let source = self.sbom.as_ref()?;
        match source.fetch_sbom(project_key, branch) {
            Ok(sbom) => Some(sbom),
            Err(e) => {
                warn!("Failed to download SBOM for {} on {}: {:#}", project_key, branch, e);
                None
            }
        }
    }

    fn extractor(&self) -> LicenseExtractor {
        match &self.settings.scratch_root {
            Some(root) => LicenseExtractor::new().with_scratch_root(root),
            None => LicenseExtractor::new(),
        }
    }
}

impl InlineCheck for CheckLicenses {
    fn name(&self) -> &str {
        CHECK_LICENSES
    }

    fn execute(&self, context: &CheckContext) -> Result<CheckResult> {
        let Some(project_key) = self.settings.project_key.as_deref() else {
            return Ok(CheckResult::passed_with(
                CHECK_LICENSES,
                format!("License check bypassed: no SBOM project key configured for {}", context.repo_slug()),
            ));
        };

        let artifacts = self.artifacts.fetch_artifacts(context)?;
        if artifacts.is_empty() {
            return Ok(CheckResult::new(
                CHECK_LICENSES,
                super::CheckState::NotRelevant,
                Some("No artifacts to inspect".to_string()),
            ));
        }

        let sbom = self.fetch_sbom(project_key, &context.branch);
        let exceptions = ExceptionManager::load(&self.settings.repository_root, self.remote_exceptions.as_ref());
        let mut report = LpsValidator::new(self.extractor()).validate_artifacts(&artifacts, sbom.as_ref(), &exceptions);

        if let (Some(dir), Some(sbom)) = (&self.settings.reference_licenses_dir, &sbom) {
            let validator = LicenseContentValidator::load(dir)?;
            report.apply_content_validation(&validator, sbom);
        }

        info!(
            "License check for {}: {} artifacts, {} third-party licenses, {} issues",
            context,
            report.artifacts_processed,
            report.third_party_license_count(),
            report.issues.len()
        );

        let mut result = if report.compliant {
            CheckResult::passed_with(
                CHECK_LICENSES,
                format!("{} artifacts comply with the License Packaging Standard", report.artifacts_processed),
            )
        } else {
            CheckResult::failed_with(CHECK_LICENSES, format!("{} license issues found", report.issues.len()))
        };

        if !report.issues.is_empty() {
            result = result.with_detail("issues", report.issues.clone());
        }
        if let Some(comparison) = &report.sbom_comparison {
            if !comparison.missing.is_empty() {
                result = result.with_detail("missing", comparison.missing.iter().cloned().collect::<Vec<_>>());
            }
            if !comparison.extra.is_empty() {
                result = result.with_detail("extra", comparison.extra.iter().cloned().collect::<Vec<_>>());
            }
            result = result.with_detail("coverage", format!("{:.1}%", comparison.coverage_percentage));
        }

        Ok(result)
    }
}
