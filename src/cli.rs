use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use releasability::exceptions::ExceptionKind;

#[derive(Parser)]
#[command(name = "releasability")]
#[command(about = "Gate releases on releasability checks and license packaging")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ./releasability.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch releasability checks and wait for their results
    Check {
        #[arg(long, env = "INPUT_ORGANIZATION")]
        organization: String,

        #[arg(long, env = "INPUT_REPOSITORY")]
        repository: String,

        #[arg(long, env = "INPUT_BRANCH")]
        branch: String,

        /// Build version, e.g. 10.4.0.87286
        #[arg(long, env = "INPUT_VERSION")]
        version: String,

        #[arg(long, env = "INPUT_COMMIT_SHA")]
        commit: String,

        /// Directory spool used as message bus
        #[arg(long)]
        spool_dir: Option<PathBuf>,

        /// Give up waiting for dispatched results after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Run only the inline checks
        #[arg(long)]
        inline_only: bool,

        #[command(flatten)]
        licenses: LicenseArgs,

        /// Exit with code 0 even when checks fail
        #[arg(long)]
        exit_zero: bool,
    },
    /// Turn a published check result map into the final verdict
    Status {
        #[arg(long, env = "INPUT_VERSION", default_value = "")]
        version: String,

        /// JSON object of `releasability<Check>` -> state plus `status`
        #[arg(long, env = "RELEASABILITY_CHECK_RESULT", default_value = "")]
        result: String,

        /// Comma separated checks allowed to fail
        #[arg(long, env = "OPTIONAL_CHECKS", default_value = "")]
        optional_checks: String,
    },
    /// Validate license packaging of local artifacts
    Licenses {
        /// Artifacts to inspect (default: every archive in --artifacts-dir)
        artifacts: Vec<PathBuf>,

        #[command(flatten)]
        licenses: LicenseArgs,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with code 0 even on violations
        #[arg(long)]
        exit_zero: bool,
    },
    /// Manage false-positive and false-negative exceptions
    Exceptions {
        /// Repository holding .sca-exceptions/
        #[arg(long, global = true)]
        repository_root: Option<PathBuf>,

        #[command(subcommand)]
        action: ExceptionAction,
    },
    /// Print the build number (or semantic version) of a build version
    BuildNumber {
        #[arg(long, env = "INPUT_VERSION")]
        version: String,

        /// Print MAJOR.MINOR.PATCH instead
        #[arg(long)]
        semantic: bool,
    },
    /// Show or validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// License inputs shared by `check` and `licenses`
#[derive(clap::Args, Clone, Default)]
pub struct LicenseArgs {
    /// SBOM project key; the license check is bypassed without one
    #[arg(long)]
    pub project_key: Option<String>,

    /// Directory holding the downloaded artifacts
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Build info JSON selecting the artifacts to inspect
    #[arg(long)]
    pub build_info: Option<PathBuf>,

    /// CycloneDX SBOM JSON
    #[arg(long)]
    pub sbom: Option<PathBuf>,

    /// Repository holding .sca-exceptions/
    #[arg(long)]
    pub repository_root: Option<PathBuf>,

    /// Reference license texts enabling content validation
    #[arg(long)]
    pub reference_licenses: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ExceptionAction {
    /// Record an exception
    Add {
        #[arg(long, value_enum)]
        kind: KindArg,

        /// SBOM component name, e.g. guava
        name: String,

        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Create empty exception files
    Init,
    /// List exceptions, local and remote
    List {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    #[value(name = "fp", alias = "false-positive")]
    FalsePositive,
    #[value(name = "fn", alias = "false-negative")]
    FalseNegative,
}

impl From<KindArg> for ExceptionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::FalsePositive => ExceptionKind::FalsePositive,
            KindArg::FalseNegative => ExceptionKind::FalseNegative,
        }
    }
}

#[derive(Clone, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
