use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::check::CheckResult;

/// Prefix of the per-check keys in a status map
pub const CHECK_KEY_PREFIX: &str = "releasability";
pub const STATUS_KEY: &str = "status";

/// Every outcome of one release-gating run.
///
/// Order is inline results first, then dispatched results, but only
/// membership is meaningful to callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    results: Vec<CheckResult>,
}

impl Report {
    pub fn new(results: Vec<CheckResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn contains_error(&self) -> bool {
        self.results.iter().any(|result| !result.passed())
    }

    pub fn failed_checks(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|result| !result.passed())
            .map(CheckResult::name)
            .collect()
    }

    /// `"0"` when every check passed, `"1"` otherwise
    pub fn status_code(&self) -> &'static str {
        if self.contains_error() {
            "1"
        } else {
            "0"
        }
    }

    /// `releasability<Name> -> STATE` for every result, plus the overall `status`
    pub fn status_map(&self) -> IndexMap<String, String> {
        let mut map: IndexMap<String, String> = self
            .results
            .iter()
            .map(|result| {
                (
                    format!("{}{}", CHECK_KEY_PREFIX, result.name()),
                    result.state().as_str().to_string(),
                )
            })
            .collect();
        map.insert(STATUS_KEY.to_string(), self.status_code().to_string());
        map
    }

    pub fn render(&self) -> String {
        self.results
            .iter()
            .map(|result| result.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
