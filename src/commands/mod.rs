use anyhow::Result;
use std::path::Path;

use releasability::check::{CheckLicenses, LicenseCheckSettings, LocalArtifactStore};
use releasability::config::{env_lookup, load_config, Config, LicensesConfig};
use releasability::license::SbomFile;

use crate::cli::LicenseArgs;

pub mod build_number;
pub mod check;
pub mod config;
pub mod exceptions;
pub mod licenses;
pub mod status;

pub use build_number::handle_build_number;
pub use check::handle_check;
pub use config::handle_config;
pub use exceptions::handle_exceptions;
pub use licenses::handle_licenses;
pub use status::handle_status;

/// Config file, then environment overrides
pub fn load_effective_config(path: Option<&Path>) -> Result<Config> {
    let mut config = load_config(path)?;
    config.apply_env_overrides(env_lookup)?;
    Ok(config)
}

/// Command line license options take precedence over the config
pub fn apply_license_args(licenses: &mut LicensesConfig, args: LicenseArgs) {
    if args.project_key.is_some() {
        licenses.project_key = args.project_key;
    }
    if args.artifacts_dir.is_some() {
        licenses.artifacts_dir = args.artifacts_dir;
    }
    if args.build_info.is_some() {
        licenses.build_info = args.build_info;
    }
    if args.sbom.is_some() {
        licenses.sbom = args.sbom;
    }
    if let Some(root) = args.repository_root {
        licenses.repository_root = root;
    }
    if args.reference_licenses.is_some() {
        licenses.reference_licenses_dir = args.reference_licenses;
    }
}

pub fn build_license_check(licenses: &LicensesConfig) -> CheckLicenses {
    let settings = LicenseCheckSettings {
        project_key: licenses.project_key.clone(),
        repository_root: licenses.repository_root.clone(),
        reference_licenses_dir: licenses.reference_licenses_dir.clone(),
        scratch_root: None,
    };

    let artifacts_dir = licenses
        .artifacts_dir
        .clone()
        .unwrap_or_else(|| licenses.repository_root.clone());
    let mut store = LocalArtifactStore::new(artifacts_dir);
    if let Some(build_info) = &licenses.build_info {
        store = store.with_build_info(build_info);
    }

    let mut check = CheckLicenses::new(settings, Box::new(store));
    if let Some(sbom) = &licenses.sbom {
        check = check.with_sbom_source(Box::new(SbomFile::new(sbom)));
    }
    if let Some(remote) = &licenses.remote_exceptions {
        check = check.with_remote_exceptions(remote.to_remote());
    }
    check
}
