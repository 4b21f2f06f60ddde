use serde_json::Value;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const ARP_ENV_VARS: &[&str] = &[
    "ARP_SERVICE_NAME",
    "ARP_SERVICE_VERSION",
    "ARP_TERMINAL_NODE_RUN_POLICY",
    "ARP_STATE_DIR",
    "ARP_ATOMIC_EXECUTOR_URL",
    "ARP_COMPOSITE_EXECUTOR_URL",
    "ARP_SELECTION_SERVICE_URL",
    "ARP_PDP_URL",
    "ARP_NODE_REGISTRY_URL",
];

fn run_cli_with_env(args: &[&str], cwd: &Path, env: &[(&str, &str)]) -> std::process::Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_arp-coordinator"));
    for key in ARP_ENV_VARS {
        command.env_remove(key);
    }
    command
        .args(args)
        .envs(env.iter().copied())
        .current_dir(cwd)
        .output()
        .expect("cli process should start")
}

fn run_cli(args: &[&str], cwd: &Path) -> std::process::Output {
    run_cli_with_env(args, cwd, &[])
}

fn assert_success(output: &std::process::Output) {
    assert!(
        output.status.success(),
        "stdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn smoke_command_expected_failed_child_summary() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["smoke", "--no-stream-events"], temp.path());
    assert_success(&output);

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    assert!(stdout.contains("run_id: run_1"));
    assert!(stdout.contains("run_state: running"));
    assert!(stdout.contains("node_run_state: failed"));
    assert!(stdout.contains("completion_error_code: boom"));
    assert!(!stdout.contains("[event"));
}

#[test]
fn smoke_command_event_json_expected_lifecycle_events_before_summary() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["smoke", "--run-id", "run_json", "--event-json"], temp.path());
    assert_success(&output);

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    let events: Vec<Value> = stdout
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).expect("event line should be json"))
        .collect();
    let kinds: Vec<&str> = events
        .iter()
        .map(|event| event["kind"]["kind"].as_str().expect("kind should be a string"))
        .collect();
    assert_eq!(
        kinds,
        vec!["run_started", "node_runs_created", "node_run_completed"]
    );
    assert!(stdout.contains("run_id: run_json"));
}

#[test]
fn smoke_command_state_dir_expected_snapshot_and_duplicate_rejected() {
    let temp = TempDir::new().expect("tempdir should create");
    let state_dir = temp.path().join("state");
    let state_dir_arg = state_dir.to_str().expect("state dir should be utf8");

    let first = run_cli(
        &["smoke", "--no-stream-events", "--state-dir", state_dir_arg],
        temp.path(),
    );
    assert_success(&first);
    assert!(state_dir.join("lifecycle-state.json").exists());

    let second = run_cli(
        &["smoke", "--no-stream-events", "--state-dir", state_dir_arg],
        temp.path(),
    );
    assert_eq!(second.status.code(), Some(1));
    let stderr = String::from_utf8(second.stderr).expect("stderr should be utf8");
    assert!(stderr.contains("error: run_already_exists"));
}

#[test]
fn version_command_expected_env_identity() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli_with_env(
        &["version"],
        temp.path(),
        &[
            ("ARP_SERVICE_NAME", "coordinator-smoke"),
            ("ARP_SERVICE_VERSION", "1.2.3"),
        ],
    );
    assert_success(&output);

    let version: Value = serde_json::from_slice(&output.stdout).expect("version should be json");
    assert_eq!(version["service_name"], "coordinator-smoke");
    assert_eq!(version["service_version"], "1.2.3");
    assert_eq!(version["supported_api_versions"], serde_json::json!(["v1"]));
}

#[test]
fn health_command_expected_ok_status() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["health"], temp.path());
    assert_success(&output);

    let health: Value = serde_json::from_slice(&output.stdout).expect("health should be json");
    assert_eq!(health["status"], "ok");
    assert!(health["time"].is_string());
}

#[test]
fn events_command_node_run_expected_single_ndjson_line() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["events", "--node-run-id", "node_run_x"], temp.path());
    assert_success(&output);

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: Value = serde_json::from_str(lines[0]).expect("record should be json");
    assert_eq!(record["node_run_id"], "node_run_x");
    assert_eq!(record["seq"], 0);
    assert_eq!(record["type"], "node_run_started");
}

#[test]
fn events_command_without_target_expected_usage_error() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["events"], temp.path());
    assert!(!output.status.success());
}

#[test]
fn probe_command_unreachable_dependency_expected_exit_code_two() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli_with_env(
        &["probe"],
        temp.path(),
        &[("ARP_PDP_URL", "http://127.0.0.1:1")],
    );
    assert_eq!(
        output.status.code(),
        Some(2),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let statuses: Value = serde_json::from_slice(&output.stdout).expect("probe should be json");
    assert_eq!(statuses[0]["service"], "pdp");
    assert_eq!(statuses[0]["healthy"], false);
    assert_eq!(statuses[0]["error"]["code"], "pdp_unavailable");
}

#[test]
fn probe_command_no_dependencies_expected_success() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["probe"], temp.path());
    assert_success(&output);
    let statuses: Value = serde_json::from_slice(&output.stdout).expect("probe should be json");
    assert_eq!(statuses, serde_json::json!([]));
}

#[test]
fn invalid_policy_env_expected_error_exit() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli_with_env(
        &["health"],
        temp.path(),
        &[("ARP_TERMINAL_NODE_RUN_POLICY", "sometimes")],
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr should be utf8");
    assert!(stderr.contains("error: invalid value for ARP_TERMINAL_NODE_RUN_POLICY"));
}
