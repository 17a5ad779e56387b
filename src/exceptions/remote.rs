use anyhow::{bail, Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

/// A hosted repository at a given ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
}

impl RemoteRepository {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            git_ref: git_ref.into(),
        }
    }
}

impl fmt::Display for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.git_ref)
    }
}

/// Reads single files from a hosted repository
pub trait RemoteFileSource: fmt::Debug + Send + Sync {
    /// `Ok(None)` when the file does not exist at that ref
    fn fetch_file(&self, repository: &RemoteRepository, path: &str) -> Result<Option<String>>;
}

/// Remote exception files to merge into the local ones
#[derive(Debug)]
pub struct RemoteExceptions {
    pub repository: RemoteRepository,
    pub source: Box<dyn RemoteFileSource>,
}

/// Reads files from local clones laid out as `<root>/<owner>/<repo>`
#[derive(Debug, Clone)]
pub struct GitCheckoutSource {
    root: PathBuf,
}

impl GitCheckoutSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn checkout_dir(&self, repository: &RemoteRepository) -> PathBuf {
        self.root.join(&repository.owner).join(&repository.repo)
    }
}

impl RemoteFileSource for GitCheckoutSource {
    fn fetch_file(&self, repository: &RemoteRepository, path: &str) -> Result<Option<String>> {
        let checkout = self.checkout_dir(repository);
        if !checkout.is_dir() {
            bail!("No checkout of {} at {}", repository, checkout.display());
        }

        let output = Command::new("git")
            .arg("-C")
            .arg(&checkout)
            .arg("show")
            .arg(format!("{}:{}", repository.git_ref, path))
            .output()
            .with_context(|| format!("Failed to run git in {}", checkout.display()))?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("does not exist") || stderr.contains("exists on disk, but not in") {
            return Ok(None);
        }
        bail!("git show {}:{} failed: {}", repository.git_ref, path, stderr.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_checkout_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let source = GitCheckoutSource::new(temp_dir.path());
        let repository = RemoteRepository::new("sonar", "parent-oss", "master");

        assert_eq!(source.checkout_dir(&repository), temp_dir.path().join("sonar").join("parent-oss"));
        let err = source.fetch_file(&repository, ".sca-exceptions/false-positives.json").unwrap_err();
        assert!(err.to_string().contains("sonar/parent-oss@master"));
    }
}
