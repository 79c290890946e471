use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn aed(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("aed").unwrap();
    cmd.arg("--workspace")
        .arg(workspace)
        .arg("--log-output")
        .arg("none");
    cmd
}

fn sales_pipeline(output_config: Value) -> Value {
    json!({
        "name": "us-sales",
        "nodes": [
            {"id": "src", "type": "SOURCE", "subtype": "CSV_SOURCE", "config": {"file_path": "sales.csv"}},
            {"id": "us", "type": "TRANSFORM", "subtype": "FILTER", "label": "US only",
             "config": {"column": "country", "operator": "==", "value": "US"}},
            {"id": "out", "type": "LOAD", "subtype": "CSV_LOAD", "config": output_config}
        ],
        "edges": [
            {"from": "src", "to": "us"},
            {"from": "us", "to": "out"}
        ]
    })
}

fn workspace_with(pipeline: &Value) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("uploads")).unwrap();
    fs::write(
        temp.path().join("uploads/sales.csv"),
        "country,amount\nUS,10\nUK,7\nUS,5\n",
    )
    .unwrap();
    let path = temp.path().join("pipeline.json");
    fs::write(&path, serde_json::to_string_pretty(pipeline).unwrap()).unwrap();
    (temp, path)
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_help_lists_pipeline_commands() {
    let mut cmd = Command::cargo_bin("aed").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("PIPELINE COMMANDS"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("runs"));
}

#[test]
fn test_run_help_mentions_timeout() {
    let mut cmd = Command::cargo_bin("aed").unwrap();
    cmd.arg("run").arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--timeout"));
}

#[test]
fn test_validate_reports_valid_pipeline() {
    let (temp, pipeline) = workspace_with(&sales_pipeline(json!({"output_path": "us.csv"})));
    let output = aed(temp.path())
        .arg("validate")
        .arg(&pipeline)
        .output()
        .unwrap();

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["valid"], json!(true));
    assert_eq!(report["errors"], json!([]));
}

#[test]
fn test_validate_invalid_pipeline_exits_with_failure() {
    let (temp, pipeline) = workspace_with(&sales_pipeline(json!({})));
    let output = aed(temp.path())
        .arg("validate")
        .arg(&pipeline)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let report = stdout_json(&output);
    assert_eq!(report["valid"], json!(false));
    assert_eq!(
        report["errors"],
        json!(["Node 'out': CSV_LOAD requires 'output_path'"])
    );
}

#[test]
fn test_plan_prints_execution_order() {
    let (temp, pipeline) = workspace_with(&sales_pipeline(json!({"output_path": "us.csv"})));
    aed(temp.path())
        .arg("plan")
        .arg(&pipeline)
        .assert()
        .success()
        .stdout(predicate::str::contains("  1. src (SOURCE CSV_SOURCE)"))
        .stdout(predicate::str::contains("  2. US only (TRANSFORM FILTER)"))
        .stdout(predicate::str::contains("  3. out (LOAD CSV_LOAD)"));
}

#[test]
fn test_run_writes_output_and_prints_record() {
    let (temp, pipeline) = workspace_with(&sales_pipeline(json!({"output_path": "us.csv"})));
    let output = aed(temp.path()).arg("run").arg(&pipeline).output().unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let record = stdout_json(&output);
    assert_eq!(record["status"], json!("SUCCESS"));
    assert_eq!(
        fs::read_to_string(temp.path().join("outputs/us.csv")).unwrap(),
        "country,amount\nUS,10\nUS,5\n"
    );
    assert!(temp.path().join(".aed/logs/aed.log").exists());
}

#[test]
fn test_failed_run_exits_with_failure() {
    let mut pipeline = sales_pipeline(json!({"output_path": "us.csv"}));
    pipeline["nodes"][1]["config"]["column"] = json!("region");
    let (temp, pipeline) = workspace_with(&pipeline);

    let output = aed(temp.path()).arg("run").arg(&pipeline).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let record = stdout_json(&output);
    assert_eq!(record["status"], json!("FAILED"));
    assert!(record["error_message"]
        .as_str()
        .unwrap()
        .starts_with("Node 'us' (FILTER) failed: "));
    assert!(!temp.path().join("outputs/us.csv").exists());
}

#[test]
fn test_runs_are_recorded_in_sqlite() {
    let (temp, pipeline) = workspace_with(&sales_pipeline(json!({"output_path": "us.csv"})));
    fs::write(
        temp.path().join("aed.toml"),
        "[recorder]\nbackend = \"sqlite\"\n",
    )
    .unwrap();

    let output = aed(temp.path()).arg("run").arg(&pipeline).output().unwrap();
    assert!(output.status.success());
    let run_id = stdout_json(&output)["id"].as_str().unwrap().to_string();
    assert!(temp.path().join(".aed/runs.db").exists());

    let output = aed(temp.path())
        .args(["runs", "show", &run_id])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["status"], json!("SUCCESS"));

    let output = aed(temp.path())
        .args(["runs", "list", "--limit", "5"])
        .output()
        .unwrap();
    let runs = stdout_json(&output);
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["id"], json!(run_id));
}

#[test]
fn test_unknown_run_is_an_error() {
    let temp = TempDir::new().unwrap();
    aed(temp.path())
        .args(["runs", "show", "6f1c0d7e-2a8e-4a39-9d55-3b7f0f3c9a10"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_zero_timeout_is_rejected() {
    let (temp, pipeline) = workspace_with(&sales_pipeline(json!({"output_path": "us.csv"})));
    aed(temp.path())
        .arg("run")
        .arg(&pipeline)
        .args(["--timeout", "0s"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--timeout must be greater than zero"));
}

#[test]
fn test_suggest_profiles_sample_file() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("uploads")).unwrap();
    fs::write(
        temp.path().join("uploads/orders.csv"),
        "order_id,created_at,amount\n1,2024-01-01,10\n2,2024-01-02,\n3,2024-01-03,30\n",
    )
    .unwrap();

    let output = aed(temp.path())
        .args(["suggest", "orders.csv", "--limit", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["total_rows"], json!(3));
    assert_eq!(report["total_columns"], json!(3));
    assert_eq!(report["profile"]["amount"]["null_count"], json!(1));
    assert_eq!(report["profile"]["created_at"]["dtype"], json!("text"));

    let suggestions = report["suggestions"].as_array().unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0]["type"], json!("PARSE_DATE"));
    assert_eq!(suggestions[0]["subtype"], json!("CAST"));
    assert_eq!(suggestions[0]["column"], json!("created_at"));
}

#[test]
fn test_suggest_rejects_unknown_extension() {
    let temp = TempDir::new().unwrap();
    aed(temp.path())
        .args(["suggest", "notes.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot tell the format"));
}
