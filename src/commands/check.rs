use anyhow::Result;
use std::path::{Path, PathBuf};

use releasability::check::{CheckContext, CheckRegistry};
use releasability::orchestrator::{Orchestrator, SpoolBus};
use releasability::output::CiOutputs;
use releasability::report::STATUS_KEY;

use super::{apply_license_args, build_license_check, load_effective_config};
use crate::cli::LicenseArgs;

pub struct CheckArgs {
    pub organization: String,
    pub repository: String,
    pub branch: String,
    pub version: String,
    pub commit: String,
    pub spool_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub inline_only: bool,
    pub licenses: LicenseArgs,
    pub exit_zero: bool,
}

pub fn handle_check(args: CheckArgs, config_path: Option<&Path>, quiet: bool) -> Result<()> {
    let mut config = load_effective_config(config_path)?;

    // CLI arguments override config values
    if let Some(timeout_secs) = args.timeout_secs {
        config.orchestrator.timeout_secs = timeout_secs;
    }
    if let Some(spool_dir) = args.spool_dir {
        config.bus.spool_dir = spool_dir;
    }
    apply_license_args(&mut config.licenses, args.licenses);

    let mut registry = if args.inline_only {
        CheckRegistry::new(Vec::new())
    } else {
        config.orchestrator.registry()
    };
    registry.register_inline_check(Box::new(build_license_check(&config.licenses)))?;

    let context = CheckContext::new(
        args.organization,
        args.repository,
        args.branch,
        args.version,
        args.commit,
    );
    let bus = SpoolBus::new(&config.bus.spool_dir);
    let mut orchestrator = Orchestrator::new(bus, registry, config.orchestrator_settings());
    let outputs = CiOutputs::from_env();

    let outcome = if args.inline_only {
        orchestrator.run_inline(&context)
    } else {
        orchestrator.run(&context)
    };
    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            println!("::error:: {}", e);
            outputs.set_output(STATUS_KEY, "1")?;
            std::process::exit(1);
        }
    };

    outputs.publish_report(&report)?;
    if !quiet {
        println!("{}", report);
    }

    if report.contains_error() {
        println!("::error::Releasability checks failed");
        if !args.exit_zero {
            std::process::exit(1);
        }
    } else {
        println!("::notice::Releasability checks passed successfully");
    }

    Ok(())
}
