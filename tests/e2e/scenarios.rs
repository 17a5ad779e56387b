use std::thread;
use std::time::Duration;

use releasability::check::{CheckContext, CheckRegistry, CheckState};
use releasability::orchestrator::{
    MessageBus, Orchestrator, OrchestratorSettings, ResultKind, ResultMessage, RunState, SpoolBus, TriggerMessage,
    DEFAULT_RESULT_QUEUE, DEFAULT_TRIGGER_TOPIC,
};

use super::helpers::{stderr, stdout, zip_bytes, TestProject};

const VERSION: &str = "10.4.0.87286";

fn check_args<'a>(extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "check",
        "--organization",
        "sonar",
        "--repository",
        "sonar-dummy",
        "--branch",
        "master",
        "--version",
        VERSION,
        "--commit",
        "abc123",
    ];
    args.extend_from_slice(extra);
    args
}

#[test]
fn test_inline_only_check_without_project_key() {
    let project = TestProject::new();

    let output = project.run(&check_args(&["--inline-only"]));
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("License check bypassed"));
    assert!(out.contains("::notice::Releasability checks passed successfully"));

    let outputs = project.outputs();
    assert!(outputs.starts_with("logs<<EOF\n"));
    assert!(outputs.contains("status=0\n"));
    assert!(outputs.contains("releasabilityCheckLicenses=PASSED\n"));

    // No trigger is published for an inline-only run
    assert!(!project.path().join(".releasability/spool").exists());
}

#[test]
fn test_check_times_out_without_workers() {
    let project = TestProject::new();
    project.write_file(
        "releasability.toml",
        "[orchestrator]\ndispatched_checks = [\"QA\"]\npoll_wait_secs = 1\n",
    );

    let output = project.run(&check_args(&["--timeout-secs", "1"]));
    assert!(!output.status.success());
    assert!(stdout(&output).contains("::error::"));
    assert!(project.outputs().contains("status=1\n"));

    // The trigger was still published to the spool
    let trigger_dir = project.path().join(".releasability/spool").join(DEFAULT_TRIGGER_TOPIC);
    assert_eq!(std::fs::read_dir(trigger_dir).unwrap().count(), 1);
}

#[test]
fn test_check_rejects_invalid_version() {
    let project = TestProject::new();
    let output = project.run(&[
        "check",
        "--organization",
        "sonar",
        "--repository",
        "sonar-dummy",
        "--branch",
        "master",
        "--version",
        "1.2",
        "--commit",
        "abc123",
        "--inline-only",
    ]);
    assert!(!output.status.success());
    assert!(project.outputs().contains("status=1\n"));
}

#[test]
fn test_status_success_and_optional_failures() {
    let project = TestProject::new();

    let passed = r#"{"releasabilityCheckLicenses": "PASSED", "releasabilityQA": "PASSED", "status": "0"}"#;
    let output = project.run(&["status", "--version", VERSION, "--result", passed]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("10.4.0.87286 passed releasability checks"));

    let optional = r#"{"releasabilityJira": "FAILED", "releasabilityQA": "PASSED", "status": "1"}"#;
    let output = project.run_with_env(
        &["status"],
        &[
            ("INPUT_VERSION", VERSION),
            ("RELEASABILITY_CHECK_RESULT", optional),
            ("OPTIONAL_CHECKS", "Jira, WhiteSource"),
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("failed optional checks -> Jira"));

    let outputs = project.outputs();
    assert!(outputs.contains("state=success\n"));
    assert!(!outputs.contains("state=failure\n"));
}

#[test]
fn test_status_failure() {
    let project = TestProject::new();

    let failed = r#"{"releasabilityJira": "FAILED", "releasabilityQA": "ERROR", "status": "1"}"#;
    let output = project.run(&["status", "--version", VERSION, "--result", failed, "--optional-checks", "Jira"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("failed checks -> Jira,QA"));

    let outputs = project.outputs();
    assert!(outputs.contains("status=1\n"));
    assert!(outputs.contains("state=failure\n"));
}

#[test]
fn test_status_missing_input() {
    let project = TestProject::new();

    let output = project.run(&["status", "--version", VERSION]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Releasability checks failed, check logs for more details"));
    assert!(project.outputs().contains("state=failure\n"));
}

#[test]
fn test_build_number() {
    let project = TestProject::new();

    let output = project.run(&["build-number", "--version", VERSION]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "87286");

    let output = project.run_with_env(&["build-number", "--semantic"], &[("INPUT_VERSION", VERSION)]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "10.4.0");

    let output = project.run(&["build-number", "--version", "10.4.0-SNAPSHOT"]);
    assert!(!output.status.success());
}

#[test]
fn test_build_number_with_dash_separator_config() {
    let project = TestProject::new();
    project.write_file("releasability.toml", "[version]\nallow_dash_separator = true\n");

    let output = project.run(&["build-number", "--version", "1.2.3-456"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "456");
}

fn write_sample_jar(project: &TestProject) {
    let jar = zip_bytes(&[
        ("licenses/LICENSE.txt", b"Copyright SonarSource"),
        ("licenses/THIRD_PARTY_LICENSES/guava-LICENSE.txt", b"Apache License"),
        ("org/sonar/App.class", b"\xca\xfe\xba\xbe"),
    ]);
    project.write_file("build/app-1.0.jar", jar);
    project.write_file(
        "build/sbom.json",
        r#"{"components": [
            {"name": "guava", "group": "com.google.guava"},
            {"name": "lombok", "group": "org.projectlombok"}
        ]}"#,
    );
}

#[test]
fn test_licenses_with_false_positive_exception() {
    let project = TestProject::new();
    write_sample_jar(&project);

    let args = ["licenses", "--artifacts-dir", "build", "--sbom", "build/sbom.json"];
    let output = project.run(&args);
    assert!(!output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Missing licenses for 1 SBOM components"));
    assert!(out.contains("│ lombok"));

    let output = project.run(&[
        "exceptions",
        "add",
        "--kind",
        "fp",
        "lombok",
        "--comment",
        "compile only",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(project.path().join(".sca-exceptions/false-positives.json").exists());

    let output = project.run(&args);
    assert!(output.status.success(), "{}", stdout(&output));
    let out = stdout(&output);
    assert!(out.contains("100.0% coverage"));
    assert!(out.contains("No issues found!"));
}

#[test]
fn test_licenses_json_report_to_file() {
    let project = TestProject::new();
    let bare = zip_bytes(&[("org/sonar/App.class", b"\xca\xfe\xba\xbe")]);
    let artifact = project.write_file("bare.jar", bare);

    let output = project.run(&[
        "licenses",
        artifact.to_str().unwrap(),
        "--format",
        "json",
        "--output",
        "report.json",
        "--exit-zero",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(project.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report["compliant"], false);
    assert_eq!(report["artifacts_processed"], 1);
    let issues = report["issues"].as_array().unwrap();
    assert!(issues.iter().any(|issue| issue == "Missing main LICENSE.txt in bare.jar"));
}

#[test]
fn test_exceptions_init_and_list() {
    let project = TestProject::new();

    let output = project.run(&["exceptions", "init"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("false-negatives.json"));

    let output = project.run(&["exceptions", "init"]);
    assert!(stdout(&output).contains("Exception files already exist"));

    project.run(&["exceptions", "add", "--kind", "fn", "io.netty:netty-codec", "--comment", "shaded"]);
    let output = project.run(&["exceptions", "list", "--kind", "false-negative"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("false negative exceptions (1)"));
    assert!(out.contains("io.netty:netty-codec"));
    assert!(out.contains("shaded"));
}

#[test]
fn test_config_show_and_validate() {
    let project = TestProject::new();
    project.write_file("releasability.toml", "[orchestrator]\ntimeout_secs = 30\n");

    let output = project.run(&["config", "--show"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("timeout_secs = 30"));

    let output = project.run(&["config", "--validate"]);
    assert!(output.status.success());

    project.write_file("broken.toml", "[orchestrator\n");
    let output = project.run(&["--config", "broken.toml", "config", "--validate"]);
    assert!(!output.status.success());
}

fn result_body(correlation_id: &str, check_name: &str, kind: ResultKind) -> String {
    serde_json::to_string(&ResultMessage {
        request_uuid: correlation_id.to_string(),
        check_name: check_name.to_string(),
        kind,
        message: None,
    })
    .unwrap()
}

#[test]
fn test_orchestrator_run_over_spool_with_worker() {
    let project = TestProject::new();
    let bus = SpoolBus::new(project.path().join("spool"));
    let worker_bus = bus.clone();

    let worker = thread::spawn(move || {
        let envelopes = (0..100)
            .map(|_| {
                worker_bus
                    .receive(DEFAULT_TRIGGER_TOPIC, 1, Duration::from_millis(100))
                    .unwrap()
            })
            .find(|envelopes| !envelopes.is_empty())
            .expect("no trigger message published");
        let trigger: TriggerMessage = serde_json::from_str(&envelopes[0].body).unwrap();
        worker_bus.delete(DEFAULT_TRIGGER_TOPIC, &envelopes[0].receipt).unwrap();
        let id = trigger.uuid.as_str();

        worker_bus
            .push(DEFAULT_RESULT_QUEUE, &result_body("another-run", "QA", ResultKind::State(CheckState::Failed)))
            .unwrap();
        worker_bus.push(DEFAULT_RESULT_QUEUE, &result_body(id, "QA", ResultKind::Ack)).unwrap();
        worker_bus
            .push(DEFAULT_RESULT_QUEUE, &result_body(id, "QA", ResultKind::State(CheckState::Passed)))
            .unwrap();
        // Topic notifications wrap the result in a `Message` field
        let wrapped = serde_json::json!({
            "Type": "Notification",
            "Message": result_body(id, "Jira", ResultKind::State(CheckState::NotRelevant)),
        });
        worker_bus.push(DEFAULT_RESULT_QUEUE, &wrapped.to_string()).unwrap();
        trigger
    });

    let registry = CheckRegistry::new(["QA".to_string(), "Jira".to_string()]);
    let settings = OrchestratorSettings {
        timeout: Duration::from_secs(20),
        poll_wait: Duration::from_secs(1),
        ..OrchestratorSettings::default()
    };
    let mut orchestrator = Orchestrator::new(bus, registry, settings);
    let context = CheckContext::new("sonar", "sonar-dummy", "master", VERSION, "abc123");

    let report = orchestrator.run(&context).unwrap();
    let trigger = worker.join().unwrap();

    assert_eq!(orchestrator.state(), RunState::Complete);
    assert_eq!(trigger.repo_slug, "sonar/sonar-dummy");
    assert_eq!(trigger.artifactory_build_number, 87286);
    assert!(!report.contains_error());

    let mut names: Vec<&str> = report.results().iter().map(|result| result.name()).collect();
    names.sort();
    assert_eq!(names, vec!["Jira", "QA"]);

    // Every message was consumed, foreign ones included
    let queue_dir = project.path().join("spool").join(DEFAULT_RESULT_QUEUE);
    let leftover = std::fs::read_dir(&queue_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .count();
    assert_eq!(leftover, 0);
}
