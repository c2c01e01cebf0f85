use assert_cmd::Command;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SESSION: &str = "valid_session_1";

/// Command running inside `dir` with instant simulated sends
fn dmrelay(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dmrelay"));
    command
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("DMRELAY_SESSION_ID")
        .env("DMRELAY__DISPATCH__TEST_MODE_DELAY_MS", "0");
    command
}

fn write_input(dir: &Path, name: &str, value: serde_json::Value) -> String {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    path.display().to_string()
}

fn read_report(path: &Path) -> serde_json::Value {
    let content = fs::read_to_string(path).expect("report not written");
    serde_json::from_str(&content).expect("report is not JSON")
}

#[test]
fn validate_accepts_valid_input() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        dir.path(),
        "input.json",
        serde_json::json!({
            "sessionId": SESSION,
            "usernames": ["@alice", "bob", "alice"],
            "message": "Hello!"
        }),
    );

    let output = dmrelay(dir.path()).args(["validate", &input]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Input validation successful"));
    assert!(stdout.contains("Target users: alice, bob"));
}

#[test]
fn validate_rejects_long_message() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        dir.path(),
        "input.json",
        serde_json::json!({
            "sessionId": SESSION,
            "usernames": ["alice"],
            "message": "x".repeat(1001)
        }),
    );

    let assert = dmrelay(dir.path()).args(["validate", &input]).assert();

    let output = assert.code(2).get_output().clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("message cannot exceed 1000 characters"));
}

#[test]
fn validate_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    dmrelay(dir.path())
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .code(2);
}

#[test]
fn run_in_test_mode_writes_report() {
    let dir = TempDir::new().unwrap();

    dmrelay(dir.path())
        .args([
            "run",
            "--session-id",
            SESSION,
            "--usernames",
            "alice,@alice",
            "--message",
            "Hello from the CLI",
            "--output-file",
            "report.json",
            "--test-mode",
        ])
        .assert()
        .success();

    let report = read_report(&dir.path().join("report.json"));
    assert_eq!(report["success"], true);
    assert_eq!(report["total_attempted"], 1);
    assert_eq!(report["successful_sends"], 1);
    assert_eq!(report["results"][0]["username"], "alice");
    assert_eq!(report["results"][0]["status"], "SUCCESS");
    assert_eq!(report["session_valid"], true);
}

#[test]
fn run_from_input_file_with_simulated_failures() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("dmrelay.toml"),
        "[simulation]\nmissing_usernames = [\"ghost\"]\n",
    )
    .unwrap();
    let input = write_input(
        dir.path(),
        "input.json",
        serde_json::json!({
            "sessionId": SESSION,
            "usernames": ["ghost"],
            "message": "Hello!"
        }),
    );

    dmrelay(dir.path())
        .args(["run", "--input-file", &input])
        .assert()
        .code(1);

    let report = read_report(&dir.path().join("output.json"));
    assert_eq!(report["success"], false);
    assert_eq!(report["failed_sends"], 1);
    assert_eq!(report["results"][0]["status"], "USER_NOT_FOUND");
    assert_eq!(report["results"][0]["retry_count"], 0);
}

#[test]
fn run_with_rejected_session_reports_authentication_failure() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    fs::write(
        &config,
        "[simulation]\nreject_sessions = [\"expired_session_1\"]\n",
    )
    .unwrap();

    dmrelay(dir.path())
        .args([
            "--config",
            config.to_str().unwrap(),
            "run",
            "--session-id",
            "expired_session_1",
            "--usernames",
            "alice,bob",
            "--message",
            "Hello!",
        ])
        .assert()
        .code(1);

    let report = read_report(&dir.path().join("output.json"));
    assert_eq!(report["error"], "Authentication failed");
    assert_eq!(report["total_attempted"], 0);
    assert_eq!(report["results"], serde_json::json!([]));
}

#[test]
fn run_rejects_invalid_inline_request() {
    let dir = TempDir::new().unwrap();

    dmrelay(dir.path())
        .args(["run", "--session-id", "short", "--message", "Hello!"])
        .assert()
        .code(2);

    assert!(!dir.path().join("output.json").exists());
}

#[test]
fn test_connection_succeeds() {
    let dir = TempDir::new().unwrap();

    let output = dmrelay(dir.path())
        .args(["test-connection", "--session-id", SESSION])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Connection test successful"));
}

#[test]
fn missing_config_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();

    dmrelay(dir.path())
        .args(["--config", "does-not-exist.toml", "validate", "input.json"])
        .assert()
        .code(3);
}
