use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::check::CheckRegistry;
use crate::exceptions::{GitCheckoutSource, RemoteExceptions, RemoteRepository};
use crate::orchestrator::{
    OrchestratorSettings, DEFAULT_MAX_MESSAGES, DEFAULT_POLL_WAIT, DEFAULT_RESULT_QUEUE, DEFAULT_RESULT_TOPIC,
    DEFAULT_TIMEOUT, DEFAULT_TRIGGER_TOPIC,
};
use crate::version::VersionPolicy;

pub const CONFIG_FILE_NAME: &str = "releasability.toml";
pub const DEFAULT_SPOOL_DIR: &str = ".releasability/spool";

pub const ENV_PROJECT_KEY: &str = "RELEASABILITY_PROJECT_KEY";
pub const ENV_SPOOL_DIR: &str = "RELEASABILITY_SPOOL_DIR";
pub const ENV_TIMEOUT_SECS: &str = "RELEASABILITY_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub version: VersionPolicy,
    pub licenses: LicensesConfig,
    pub bus: BusConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub trigger_topic: String,
    pub result_topic: String,
    pub result_queue: String,
    pub timeout_secs: u64,
    pub poll_wait_secs: u64,
    pub max_messages: usize,
    pub drop_foreign_messages: bool,
    /// Replaces the built-in list of checks run by the worker pool
    pub dispatched_checks: Option<Vec<String>>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            trigger_topic: DEFAULT_TRIGGER_TOPIC.to_string(),
            result_topic: DEFAULT_RESULT_TOPIC.to_string(),
            result_queue: DEFAULT_RESULT_QUEUE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            poll_wait_secs: DEFAULT_POLL_WAIT.as_secs(),
            max_messages: DEFAULT_MAX_MESSAGES,
            drop_foreign_messages: true,
            dispatched_checks: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn settings(&self, version_policy: VersionPolicy) -> OrchestratorSettings {
        OrchestratorSettings {
            trigger_topic: self.trigger_topic.clone(),
            result_topic: self.result_topic.clone(),
            result_queue: self.result_queue.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            poll_wait: Duration::from_secs(self.poll_wait_secs),
            max_messages: self.max_messages,
            drop_foreign_messages: self.drop_foreign_messages,
            version_policy,
        }
    }

    /// Registry holding the configured dispatched checks and no inline ones
    pub fn registry(&self) -> CheckRegistry {
        match &self.dispatched_checks {
            Some(names) => CheckRegistry::new(names.iter().cloned()),
            None => CheckRegistry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicensesConfig {
    /// SBOM project key. Without one the license check is bypassed.
    pub project_key: Option<String>,
    pub repository_root: PathBuf,
    pub artifacts_dir: Option<PathBuf>,
    pub build_info: Option<PathBuf>,
    pub sbom: Option<PathBuf>,
    pub reference_licenses_dir: Option<PathBuf>,
    pub remote_exceptions: Option<RemoteExceptionsConfig>,
}

impl Default for LicensesConfig {
    fn default() -> Self {
        Self {
            project_key: None,
            repository_root: PathBuf::from("."),
            artifacts_dir: None,
            build_info: None,
            sbom: None,
            reference_licenses_dir: None,
            remote_exceptions: None,
        }
    }
}

/// Shared exception files kept in another repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteExceptionsConfig {
    pub owner: String,
    pub repo: String,
    #[serde(rename = "ref", default = "default_git_ref")]
    pub git_ref: String,
    /// Directory holding clones as `<owner>/<repo>`
    pub checkout_root: PathBuf,
}

fn default_git_ref() -> String {
    "master".to_string()
}

impl RemoteExceptionsConfig {
    pub fn to_remote(&self) -> RemoteExceptions {
        RemoteExceptions {
            repository: RemoteRepository::new(self.owner.as_str(), self.repo.as_str(), self.git_ref.as_str()),
            source: Box::new(GitCheckoutSource::new(&self.checkout_root)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Root of the directory spool used as message bus
    pub spool_dir: PathBuf,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::from(DEFAULT_SPOOL_DIR),
        }
    }
}

impl Config {
    /// Apply `RELEASABILITY_*` overrides read through `lookup`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(project_key) = lookup(ENV_PROJECT_KEY).filter(|value| !value.trim().is_empty()) {
            self.licenses.project_key = Some(project_key);
        }
        if let Some(spool_dir) = lookup(ENV_SPOOL_DIR).filter(|value| !value.trim().is_empty()) {
            self.bus.spool_dir = PathBuf::from(spool_dir);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            self.orchestrator.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_TIMEOUT_SECS, timeout))?;
        }
        Ok(())
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        self.orchestrator.settings(self.version)
    }
}

/// Process environment, for `apply_env_overrides`
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load an explicit config file, or `releasability.toml` in the current
/// directory when present. Defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        return load_config_from(path);
    }

    let default_path = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(CONFIG_FILE_NAME);

    if !default_path.exists() {
        debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        return Ok(Config::default());
    }

    load_config_from(&default_path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}
