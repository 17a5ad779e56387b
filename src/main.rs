use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{
    handle_build_number, handle_check, handle_config, handle_exceptions, handle_licenses, handle_status,
};

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Check {
            organization,
            repository,
            branch,
            version,
            commit,
            spool_dir,
            timeout_secs,
            inline_only,
            licenses,
            exit_zero,
        } => handle_check(
            commands::check::CheckArgs {
                organization,
                repository,
                branch,
                version,
                commit,
                spool_dir,
                timeout_secs,
                inline_only,
                licenses,
                exit_zero,
            },
            config_path,
            cli.quiet,
        ),
        Commands::Status {
            version,
            result,
            optional_checks,
        } => handle_status(&version, &result, &optional_checks, cli.quiet),
        Commands::Licenses {
            artifacts,
            licenses,
            format,
            output,
            exit_zero,
        } => handle_licenses(
            artifacts,
            licenses,
            format,
            output,
            exit_zero,
            config_path,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Exceptions {
            repository_root,
            action,
        } => handle_exceptions(repository_root, action, config_path, cli.quiet),
        Commands::BuildNumber { version, semantic } => handle_build_number(&version, semantic, config_path),
        Commands::Config { show, validate } => handle_config(show, validate, config_path, cli.quiet),
    }
}
