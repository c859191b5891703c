//! relayd help, version and startup failure specs
//!
//! None of these reach the network: they stop before a session is created.

use crate::prelude::*;

#[test]
fn version_prints_package_version() {
    let output = relayd().arg("--version").output().unwrap();

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "relayd 0.1.0");
}

#[test]
fn help_lists_config_option() {
    let output = relayd().arg("--help").output().unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("USAGE:"), "got: {text}");
    assert!(text.contains("--config <path>"), "got: {text}");
    assert!(text.contains("RELAY_TOKEN"), "got: {text}");
}

#[test]
fn unknown_argument_exits_2() {
    relayd().arg("--frobnicate").assert().code(2);
}

#[test]
fn config_flag_without_path_exits_2() {
    relayd().arg("--config").assert().code(2);
}

#[test]
fn missing_config_is_reported_and_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let output = relayd().arg("--config").arg(&path).output().unwrap();

    assert!(output.status.success());
    let err = stderr(&output);
    assert!(err.contains("failed to read config"), "got: {err}");
}

#[test]
fn invalid_config_is_reported_and_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".agent.toml");
    std::fs::write(&path, "server_url = 3\n").unwrap();

    let output = relayd().env("RELAY_WORK_DIR", dir.path()).output().unwrap();

    assert!(output.status.success());
    let err = stderr(&output);
    assert!(err.contains("invalid config"), "got: {err}");
}
