use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;

use releasability::output::CiOutputs;
use releasability::status::{evaluate_status, parse_optional_checks, StatusOutcome, STATE_FAILURE};

fn publish(outputs: &CiOutputs, outcome: &StatusOutcome) -> Result<()> {
    outputs.set_output("status", &outcome.status)?;
    outputs.set_output("state", &outcome.state)?;
    outputs.set_output("message", &outcome.message)
}

/// Status maps come from CI step outputs, so values are usually strings
fn parse_result_map(raw: &str) -> Result<IndexMap<String, String>> {
    let values: IndexMap<String, Value> =
        serde_json::from_str(raw).context("RELEASABILITY_CHECK_RESULT is not a JSON object")?;
    Ok(values
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect())
}

pub fn handle_status(version: &str, result: &str, optional_checks: &str, quiet: bool) -> Result<()> {
    let outputs = CiOutputs::from_env();

    if version.trim().is_empty() || result.trim().is_empty() {
        let outcome = StatusOutcome {
            status: "1".to_string(),
            state: STATE_FAILURE.to_string(),
            message: "Releasability checks failed, check logs for more details".to_string(),
        };
        publish(&outputs, &outcome)?;
        eprintln!("{}", outcome.message);
        std::process::exit(1);
    }

    let map = parse_result_map(result)?;
    let outcome = evaluate_status(version, &map, &parse_optional_checks(optional_checks));
    publish(&outputs, &outcome)?;

    if !quiet {
        println!("{}", outcome.message);
    }
    if outcome.state == STATE_FAILURE {
        std::process::exit(1);
    }
    Ok(())
}
