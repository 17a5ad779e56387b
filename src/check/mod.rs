//! Releasability checks: outcome model, execution context and the inline check seam.

use std::fmt;

pub mod licenses;
pub mod registry;
pub mod result;

pub use licenses::{ArtifactSource, CheckLicenses, LicenseCheckSettings, LocalArtifactStore, CHECK_LICENSES};
pub use registry::{CheckRegistry, DEFAULT_DISPATCHED_CHECKS};
pub use result::{CheckResult, CheckState, Detail};

/// Everything a check needs to know about the build under release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckContext {
    pub organization: String,
    pub repository: String,
    pub branch: String,
    pub version: String,
    pub commit: String,
}

impl CheckContext {
    pub fn new(
        organization: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
        version: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            branch: branch.into(),
            version: version.into(),
            commit: commit.into(),
        }
    }

    /// `organization/repository`
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.organization, self.repository)
    }
}

impl fmt::Display for CheckContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}@{}", self.organization, self.repository, self.version, self.commit)
    }
}

/// A check executed synchronously inside the orchestrating process.
///
/// An `Err` is not fatal: the orchestrator turns it into an ERROR result for
/// this check only.
pub trait InlineCheck: Send + Sync {
    fn name(&self) -> &str;

    fn execute(&self, context: &CheckContext) -> anyhow::Result<CheckResult>;
}

impl fmt::Debug for dyn InlineCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InlineCheck({})", self.name())
    }
}
