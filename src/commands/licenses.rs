use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use releasability::check::{ArtifactSource, CheckContext, LocalArtifactStore};
use releasability::exceptions::ExceptionManager;
use releasability::buildinfo::BuildInfo;
use releasability::license::{Artifact, LicenseContentValidator, LpsValidator, Sbom};
use releasability::output::format_lps_table;

use super::{apply_license_args, load_effective_config};
use crate::cli::{LicenseArgs, OutputFormat};

#[allow(clippy::too_many_arguments)]
pub fn handle_licenses(
    artifacts: Vec<PathBuf>,
    args: LicenseArgs,
    format: OutputFormat,
    output: Option<PathBuf>,
    exit_zero: bool,
    config_path: Option<&Path>,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    let mut config = load_effective_config(config_path)?;
    apply_license_args(&mut config.licenses, args);
    let licenses = &config.licenses;

    let artifacts: Vec<Artifact> = if artifacts.is_empty() {
        let dir = licenses
            .artifacts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let mut store = LocalArtifactStore::new(dir);
        if let Some(build_info) = &licenses.build_info {
            store = store.with_build_info(build_info);
        }
        let version = match &licenses.build_info {
            Some(path) => BuildInfo::load(path)?.version().unwrap_or_default().to_string(),
            None => String::new(),
        };
        let context = CheckContext::new("", "", "", version, "");
        store.fetch_artifacts(&context)?
    } else {
        artifacts.into_iter().map(Artifact::from_path).collect()
    };

    let sbom = match &licenses.sbom {
        Some(path) => match Sbom::load(path) {
            Ok(sbom) => Some(sbom),
            Err(e) => {
                warn!("Ignoring SBOM: {:#}", e);
                None
            }
        },
        None => None,
    };

    let remote = licenses.remote_exceptions.as_ref().map(|remote| remote.to_remote());
    let exceptions = ExceptionManager::load(&licenses.repository_root, remote.as_ref());
    let mut report = LpsValidator::default().validate_artifacts(&artifacts, sbom.as_ref(), &exceptions);

    if let (Some(dir), Some(sbom)) = (&licenses.reference_licenses_dir, &sbom) {
        let validator = LicenseContentValidator::load(dir)?;
        report.apply_content_validation(&validator, sbom);
    }

    let output_content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Table => format_lps_table(&report, verbose),
    };

    match output {
        Some(path) => fs::write(&path, output_content)
            .with_context(|| format!("Failed to write report: {}", path.display()))?,
        None => {
            if !quiet {
                println!("{}", output_content);
            }
        }
    }

    if !report.compliant && !exit_zero {
        std::process::exit(1);
    }
    Ok(())
}
