//! Turns the status map published by a `check` run into the final verdict,
//! letting some checks be optional.

use indexmap::IndexMap;
use serde::Serialize;

use crate::report::{CHECK_KEY_PREFIX, STATUS_KEY};

pub const STATE_SUCCESS: &str = "success";
pub const STATE_FAILURE: &str = "failure";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusOutcome {
    pub status: String,
    pub state: String,
    pub message: String,
}

/// Names of the checks whose state is neither PASSED nor NOT_RELEVANT, in key order
pub fn find_failed_checks(result: &IndexMap<String, String>) -> Vec<String> {
    result
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(CHECK_KEY_PREFIX)?;
            match value.as_str() {
                "PASSED" | "NOT_RELEVANT" => None,
                _ => Some(name.to_string()),
            }
        })
        .collect()
}

pub fn evaluate_status(
    version: &str,
    result: &IndexMap<String, String>,
    optional_checks: &[String],
) -> StatusOutcome {
    let status = result.get(STATUS_KEY).map(String::as_str).unwrap_or("1");
    if status == "0" {
        return StatusOutcome {
            status: "0".to_string(),
            state: STATE_SUCCESS.to_string(),
            message: format!("\u{2708} {} passed releasability checks", version),
        };
    }

    let failed = find_failed_checks(result);
    let failed_checks = failed.join(",");

    if failed.iter().all(|name| optional_checks.contains(name)) {
        return StatusOutcome {
            status: "0".to_string(),
            state: STATE_SUCCESS.to_string(),
            message: format!("\u{2708} {} failed optional checks -> {}", version, failed_checks),
        };
    }

    StatusOutcome {
        status: status.to_string(),
        state: STATE_FAILURE.to_string(),
        message: format!("\u{2708} {} failed checks -> {}", version, failed_checks),
    }
}

/// Parse `a,b , c` into check names, dropping blanks
pub fn parse_optional_checks(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_find_failed_checks_keeps_key_order() {
        let result = map(&[
            ("releasabilityQA", "ERROR"),
            ("releasabilityJira", "FAILED"),
            ("releasabilityGitHub", "NOT_RELEVANT"),
            ("status", "1"),
        ]);
        assert_eq!(find_failed_checks(&result), vec!["QA", "Jira"]);
    }

    #[test]
    fn test_success_status() {
        let result = map(&[("releasabilityQA", "PASSED"), ("status", "0")]);
        let outcome = evaluate_status("1.2.3.4", &result, &[]);
        assert_eq!(outcome.status, "0");
        assert_eq!(outcome.state, STATE_SUCCESS);
        assert!(outcome.message.contains("1.2.3.4 passed releasability checks"));
    }

    #[test]
    fn test_only_optional_checks_failed() {
        let result = map(&[
            ("releasabilityQA", "PASSED"),
            ("releasabilityJira", "FAILED"),
            ("status", "1"),
        ]);
        let outcome = evaluate_status("1.2.3.4", &result, &["Jira".to_string()]);
        assert_eq!(outcome.status, "0");
        assert_eq!(outcome.state, STATE_SUCCESS);
        assert!(outcome.message.ends_with("failed optional checks -> Jira"));
    }

    #[test]
    fn test_mandatory_check_failed() {
        let result = map(&[
            ("releasabilityQA", "ERROR"),
            ("releasabilityJira", "FAILED"),
            ("status", "1"),
        ]);
        let outcome = evaluate_status("1.2.3.4", &result, &["Jira".to_string()]);
        assert_eq!(outcome.status, "1");
        assert_eq!(outcome.state, STATE_FAILURE);
        assert!(outcome.message.ends_with("failed checks -> QA,Jira"));
    }

    #[test]
    fn test_parse_optional_checks() {
        assert_eq!(parse_optional_checks("Jira, QA,,"), vec!["Jira", "QA"]);
        assert!(parse_optional_checks("").is_empty());
    }
}
