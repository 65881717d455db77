//! Integration tests for the `keemple` CLI binary.
//!
//! Argument parsing, help output, shell completions, and error handling
//! run without network access; the end-to-end cases talk to a mocked
//! cloud through `--base-url`.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `keemple` binary with env isolation.
///
/// Clears all `KEEMPLE_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn keemple_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("keemple");
    cmd.env("HOME", "/tmp/keemple-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/keemple-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("KEEMPLE_PROFILE")
        .env_remove("KEEMPLE_ACCOUNT")
        .env_remove("KEEMPLE_PASSWORD")
        .env_remove("KEEMPLE_COUNTRY_CODE")
        .env_remove("KEEMPLE_BASE_URL")
        .env_remove("KEEMPLE_OUTPUT")
        .env_remove("KEEMPLE_INSECURE")
        .env_remove("KEEMPLE_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Command wired to a mock server with credentials from the environment.
fn mocked_cmd(server: &MockServer) -> assert_cmd::Command {
    let mut cmd = keemple_cmd();
    cmd.env("KEEMPLE_ACCOUNT", "user1")
        .env("KEEMPLE_PASSWORD", "pw")
        .args(["--base-url", &server.uri()]);
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn mock_cloud() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/phoneuser/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCode": 0,
            "token": "tok-1",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/data/querychangeddata2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCode": 0,
            "appliancestatus": [
                { "nuid": 101, "deviceid": "a1", "devicetype": "41", "status": 255,
                  "statuses": [], "zwavedeviceid": 5001 },
                { "nuid": 103, "deviceid": "a3", "devicetype": "43", "status": 40,
                  "statuses": [], "zwavedeviceid": 5003 }
            ],
            "remote": [{ "appliancelist": [
                { "nuid": 101, "name": "Lamp" },
                { "nuid": 103, "name": "Blind" }
            ]}],
            "rooms": [{ "name": "Kitchen", "appliancelist": [{ "nuid": 101 }] }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/phoneuser/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultCode": 0 })))
        .mount(&server)
        .await;

    server
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = keemple_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    keemple_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Keemple")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("switch"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    keemple_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keemple"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    keemple_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    keemple_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = keemple_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_list_without_config() {
    keemple_cmd()
        .args(["devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_unknown_profile() {
    keemple_cmd()
        .args(["--profile", "cabin", "devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cabin"));
}

#[test]
fn test_invalid_output_format() {
    let output = keemple_cmd()
        .args(["-o", "xml", "devices", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_position_out_of_range() {
    let output = keemple_cmd()
        .args(["cover", "set", "103", "101"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_show_without_file() {
    keemple_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile"));
}

// ── Against a mocked cloud ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_list_json() {
    let server = mock_cloud().await;

    let output = mocked_cmd(&server)
        .args(["devices", "list", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let devices = devices.as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["id"], "101");
    assert_eq!(devices[0]["unique_id"], "keemple_41_101");
    assert_eq!(devices[0]["room"], "Kitchen");
    assert_eq!(devices[0]["reading"]["on"], true);
    assert_eq!(devices[1]["kind"], "blind");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_get_by_name() {
    let server = mock_cloud().await;

    mocked_cmd(&server)
        .args(["devices", "get", "blind", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keemple_43_103"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_switch_on_blind_is_unsupported() {
    let server = mock_cloud().await;

    let output = mocked_cmd(&server)
        .args(["switch", "on", "103"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cover_set_sends_native_position() {
    let server = mock_cloud().await;
    Mock::given(method("POST"))
        .and(path("/device/operate"))
        .and(query_param("command", r#"{"operation":"open","value":99}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "resultCode": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    mocked_cmd(&server)
        .args(["cover", "set", "103", "100", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"current_position\": 100"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_login_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/phoneuser/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultCode": 1,
            "resultMessage": "wrong password"
        })))
        .mount(&server)
        .await;

    let output = mocked_cmd(&server).arg("login").output().unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
}
