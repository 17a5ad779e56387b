use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

use crate::exceptions::{ExceptionEntry, ExceptionKind};
use crate::license::LpsReport;
use crate::report::{Report, STATUS_KEY};

pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";
pub const LOGS_OUTPUT: &str = "logs";

const MULTILINE_DELIMITER: &str = "EOF";

/// Named step outputs appended to the file CI points `GITHUB_OUTPUT` at
#[derive(Debug, Clone, Default)]
pub struct CiOutputs {
    path: Option<PathBuf>,
}

impl CiOutputs {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var_os(GITHUB_OUTPUT_ENV).map(PathBuf::from))
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    fn append(&self, text: &str) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open outputs file: {}", path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("Failed to write outputs file: {}", path.display()))
    }

    /// `name=value`
    pub fn set_output(&self, name: &str, value: &str) -> Result<()> {
        debug!("Setting output {}={}", name, value);
        self.append(&format!("{}={}\n", name, value))
    }

    /// `name<<EOF`, the value, `EOF`
    pub fn set_multiline_output(&self, name: &str, value: &str) -> Result<()> {
        self.append(&format!(
            "{}<<{}\n{}\n{}\n",
            name, MULTILINE_DELIMITER, value, MULTILINE_DELIMITER
        ))
    }

    /// Rendered report as `logs`, `status` and one output per check
    pub fn publish_report(&self, report: &Report) -> Result<()> {
        self.set_multiline_output(LOGS_OUTPUT, &report.render())?;
        self.set_output(STATUS_KEY, report.status_code())?;
        for (name, state) in report.status_map() {
            if name != STATUS_KEY {
                self.set_output(&name, &state)?;
            }
        }
        Ok(())
    }
}

pub fn format_lps_table(report: &LpsReport, verbose: bool) -> String {
    let mut output = String::new();

    let comparison = report.sbom_comparison.as_ref();
    output.push_str(&format!(
        "📦 License Packaging Summary ({} artifacts, {} third-party licenses)\n",
        report.artifacts_processed,
        report.third_party_license_count()
    ));
    match comparison {
        Some(comparison) => output.push_str(&format!(
            "✅ {} matched  ⚠️ {} missing  🚫 {} extra  📊 {:.1}% coverage\n\n",
            comparison.matched.len(),
            comparison.missing.len(),
            comparison.extra.len(),
            comparison.coverage_percentage
        )),
        None => output.push_str("⚠️ No SBOM available, comparison skipped\n\n"),
    }

    if verbose {
        output.push_str("📄 License Files:\n");
        output.push_str(&format_license_file_table(report));
        output.push('\n');
    }

    if report.issues.is_empty() {
        output.push_str("✅ No issues found!\n");
    } else {
        output.push_str("⚠️  Issues Found:\n");
        for issue in &report.issues {
            output.push_str(&format!("  • {}\n", issue));
        }
    }

    if let Some(comparison) = comparison {
        if !comparison.missing.is_empty() || !comparison.extra.is_empty() {
            output.push('\n');
            output.push_str(&format_dependency_table(
                comparison.missing.iter().map(|name| (name.as_str(), "Missing license")),
                comparison.extra.iter().map(|name| (name.as_str(), "Not in SBOM")),
            ));
        }
    }

    if !verbose && report.third_party_license_count() > 0 {
        output.push_str(&format!(
            "\n💡 Run with --verbose to see all {} license files\n",
            report.licenses_extracted.values().map(|licenses| licenses.records.len()).sum::<usize>()
        ));
    }

    output
}

fn format_license_file_table(report: &LpsReport) -> String {
    let files: Vec<_> = report
        .licenses_extracted
        .iter()
        .flat_map(|(artifact, licenses)| licenses.records.iter().map(move |record| (artifact, record)))
        .collect();
    if files.is_empty() {
        return "No license files found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str("┌─────────────────┬─────────────────────────┬─────────────┬─────────────────┐\n");
    output.push_str("│ Artifact        │ File                    │ Kind        │ Source          │\n");
    output.push_str("├─────────────────┼─────────────────────────┼─────────────┼─────────────────┤\n");
    for (artifact, record) in files {
        let kind = if record.is_third_party() { "third-party" } else { "main" };
        output.push_str(&format!(
            "│ {:<15} │ {:<23} │ {:<11} │ {:<15} │\n",
            truncate(artifact, 15),
            truncate(&record.name, 23),
            kind,
            truncate(&record.source, 15)
        ));
    }
    output.push_str("└─────────────────┴─────────────────────────┴─────────────┴─────────────────┘\n");
    output
}

fn format_dependency_table<'a>(
    missing: impl Iterator<Item = (&'a str, &'a str)>,
    extra: impl Iterator<Item = (&'a str, &'a str)>,
) -> String {
    let mut output = String::new();
    output.push_str("┌─────────────────────────────────┬─────────────────────┐\n");
    output.push_str("│ Dependency                      │ Issue               │\n");
    output.push_str("├─────────────────────────────────┼─────────────────────┤\n");
    for (name, issue) in missing.chain(extra) {
        output.push_str(&format!("│ {:<31} │ {:<19} │\n", truncate(name, 31), issue));
    }
    output.push_str("└─────────────────────────────────┴─────────────────────┘\n");
    output
}

pub fn format_exceptions_table(kind: ExceptionKind, entries: &[ExceptionEntry]) -> String {
    let mut output = format!("📋 {} exceptions ({})\n", kind, entries.len());
    if entries.is_empty() {
        output.push_str("No exceptions recorded.\n");
        return output;
    }

    output.push_str("┌─────────────────────────────────┬─────────────────────────────────┐\n");
    output.push_str("│ Dependency                      │ Comment                         │\n");
    output.push_str("├─────────────────────────────────┼─────────────────────────────────┤\n");
    for entry in entries {
        output.push_str(&format!(
            "│ {:<31} │ {:<31} │\n",
            truncate(&entry.name, 31),
            truncate(&entry.comment, 31)
        ));
    }
    output.push_str("└─────────────────────────────────┴─────────────────────────────────┘\n");
    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
