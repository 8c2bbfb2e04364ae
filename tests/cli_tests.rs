//! CLI integration tests for agent-router
//!
//! Drives the binary end to end for the commands that need no API key,
//! and checks the startup errors that must exit non-zero.

#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the agent-router command with no provider credentials.
fn router_cmd() -> Command {
    let mut cmd = Command::cargo_bin("agent-router").unwrap();
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("AGENT_ROUTER_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Help & Version
// ============================================================================

#[test]
fn test_help_lists_commands() {
    router_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("eval"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("route"))
        .stdout(predicate::str::contains("agents"));
}

#[test]
fn test_version_output() {
    router_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("agent-router"));
}

#[test]
fn test_eval_help_shows_flags() {
    router_cmd()
        .args(["eval", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--routing-only"))
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--output"));
}

// ============================================================================
// route / agents
// ============================================================================

#[test]
fn test_route_finance_query() {
    router_cmd()
        .args(["route", "What is the current P/E ratio for AAPL?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Primary:     finance"))
        .stdout(predicate::str::contains("Multi-agent: no"));
}

#[test]
fn test_route_json_cross_domain() {
    let output = router_cmd()
        .args([
            "--format",
            "json",
            "route",
            "What are the legal and financial implications of a healthcare data breach?",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let decision: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decision["requires_multi_agent"], true);
    assert_eq!(decision["primary"], "finance");
    assert_eq!(decision["secondary"], serde_json::json!(["legal", "healthcare"]));
}

#[test]
fn test_route_no_keywords_is_general() {
    router_cmd()
        .args(["route", "Tell me a joke"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Primary:     general"))
        .stdout(predicate::str::contains("Confidence:  0.50"));
}

#[test]
fn test_agents_listing() {
    router_cmd()
        .arg("agents")
        .assert()
        .success()
        .stdout(predicate::str::contains("FinanceAgent (finance)"))
        .stdout(predicate::str::contains("LegalAgent (legal)"))
        .stdout(predicate::str::contains("HealthcareAgent (healthcare)"))
        .stdout(predicate::str::contains("- calculate_dcf_valuation"))
        .stdout(predicate::str::contains("- search_knowledge_base"));
}

// ============================================================================
// eval
// ============================================================================

#[test]
fn test_eval_routing_only_report() {
    router_cmd()
        .args(["eval", "--dataset", "routing", "--routing-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running evaluation: routing_accuracy (15 cases)"))
        .stdout(predicate::str::contains("EVALUATION REPORT"))
        .stdout(predicate::str::contains("Failed Cases"))
        .stdout(predicate::str::contains("[route_amb_02]"));
}

#[test]
fn test_eval_writes_json_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.json");

    router_cmd()
        .args(["eval", "--dataset", "full", "--routing-only", "--output"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Results written to"));

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["summary"]["overview"]["total_cases"], 25);
    for block in ["overview", "routing", "tool_usage", "response_quality", "latency"] {
        assert!(report["summary"][block].is_object(), "missing {block}");
    }
    assert_eq!(report["all_results"].as_array().unwrap().len(), 25);
    assert!(report["failures"].is_array());
    assert!(report["summary"]["routing"]["accuracy"].is_number());
}

#[test]
fn test_eval_json_to_stdout() {
    let output = router_cmd()
        .args(["--format", "json", "eval", "--dataset", "routing", "--routing-only", "--domain", "legal"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["overview"]["total_cases"], 4);
    assert_eq!(report["summary"]["overview"]["passed"], 3);
    assert_eq!(report["summary"]["overview"]["failed"], 1);
    assert_eq!(report["failures"][0]["case_id"], "route_amb_02");
}

#[test]
fn test_eval_custom_dataset_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cases.json");
    fs::write(
        &path,
        r#"{
            "name": "custom",
            "description": "two cases",
            "cases": [
                {"id": "c1", "query": "Review the NDA clause", "expected_domain": "legal"},
                {"id": "c2", "query": "Tell me a joke", "expected_domain": "finance"}
            ]
        }"#,
    )
    .unwrap();

    router_cmd()
        .args(["eval", "--routing-only", "--dataset-file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running evaluation: custom (2 cases)"))
        .stdout(predicate::str::contains("Pass Rate:    50.0%"));
}

// ============================================================================
// Startup errors
// ============================================================================

#[test]
fn test_eval_unknown_dataset_fails() {
    router_cmd()
        .args(["eval", "--dataset", "bogus", "--routing-only"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown dataset 'bogus'"));
}

#[test]
fn test_eval_missing_dataset_file_fails() {
    router_cmd()
        .args(["eval", "--routing-only", "--dataset-file", "/nonexistent/cases.json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to load dataset"));
}

#[test]
fn test_eval_without_api_key_fails() {
    router_cmd()
        .args(["eval", "--dataset", "routing"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("API key missing"));
}

#[test]
fn test_eval_unwritable_output_fails() {
    router_cmd()
        .args([
            "eval",
            "--dataset",
            "routing",
            "--routing-only",
            "--output",
            "/nonexistent/dir/report.json",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_ask_without_api_key_fails() {
    router_cmd()
        .args(["ask", "What is the P/E ratio for AAPL?"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("API key missing"));
}

#[test]
fn test_ask_rejects_unknown_agent() {
    router_cmd()
        .args(["ask", "hello", "--agents", "astrology"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown domain 'astrology'"));
}
