// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::env::tests::ENV_LOCK;

const MINIMAL: &str = r#"
server_url = "https://dev.example.com/org"
pool_id = 3
agent_name = "builder-01"
agent_id = 12
work_folder = "/var/relay/work"
"#;

#[test]
fn parse_fills_defaults() {
    let config = Config::parse(MINIMAL).unwrap();

    assert_eq!(config.server_url, "https://dev.example.com/org");
    assert_eq!(config.pool_id, 3);
    assert_eq!(config.pool_name, "");
    assert_eq!(config.poll_retry(), Duration::from_secs(15));
    assert_eq!(config.max_session_retries, 10);
    assert_eq!(config.drain_timeout_secs, 60);
    assert!(!config.enable_access_token);
    assert_eq!(config.worker_path, None);
    assert_eq!(config.token, None);
}

#[test]
fn parse_reads_overrides() {
    let content = format!(
        "{}poll_retry_secs = 5\nmax_session_retries = 2\nenable_access_token = true\nworker_path = \"/opt/relay/relay-worker\"\n",
        MINIMAL
    );

    let config = Config::parse(&content).unwrap();

    assert_eq!(config.poll_retry(), Duration::from_secs(5));
    assert_eq!(config.max_session_retries, 2);
    assert!(config.enable_access_token);
    assert_eq!(config.worker_binary(), PathBuf::from("/opt/relay/relay-worker"));
}

#[test]
fn parse_rejects_missing_fields() {
    assert!(Config::parse("server_url = \"x\"").is_err());
}

#[yare::parameterized(
    cli_wins = { Some("/cli.toml"), Some("/env.toml"), "/cli.toml" },
    env_next = { None, Some("/env.toml"), "/env.toml" },
    work_folder_last = { None, None, "/work/.agent.toml" },
)]
fn resolve_path_precedence(cli: Option<&str>, env: Option<&str>, expected: &str) {
    let path = resolve_path(
        cli.map(PathBuf::from),
        env.map(PathBuf::from),
        Some(PathBuf::from("/work")),
    )
    .unwrap();

    assert_eq!(path, PathBuf::from(expected));
}

#[test]
fn load_reports_missing_file() {
    let _lock = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let err = Config::load(Some(dir.path().join("missing.toml"))).unwrap_err();

    assert!(matches!(err, LifecycleError::ReadConfig { .. }));
}

#[test]
fn load_takes_the_token_from_the_environment() {
    let _lock = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(&path, format!("{}token = \"ignored\"\n", MINIMAL)).unwrap();
    std::env::set_var(env::TOKEN_VAR, "secret-token");

    let config = Config::load(Some(path));
    std::env::remove_var(env::TOKEN_VAR);

    assert_eq!(config.unwrap().token.as_deref(), Some("secret-token"));
}

#[test]
fn worker_config_carries_agent_settings() {
    let _lock = ENV_LOCK.lock().unwrap();
    std::env::set_var(env::MAX_ISSUES_VAR, "4");
    let config = Config::parse(MINIMAL).unwrap();

    let worker = config.worker();
    std::env::remove_var(env::MAX_ISSUES_VAR);

    assert_eq!(worker.agent_id, 12);
    assert_eq!(worker.agent_name, "builder-01");
    assert_eq!(worker.pool_id, 3);
    assert_eq!(worker.work_folder, PathBuf::from("/var/relay/work"));
    assert_eq!(worker.drain_timeout_secs, 60);
    assert_eq!(worker.max_issues, 4);
}

#[test]
fn listener_config_uses_owner_and_retry_settings() {
    let config = Config::parse(MINIMAL).unwrap();

    let listener = config.listener("owner-9".to_string());

    assert_eq!(listener.session.owner_name, "owner-9");
    assert_eq!(listener.session.agent_id, 12);
    assert_eq!(listener.retry_delay, Duration::from_secs(15));
    assert_eq!(listener.max_session_retries, 10);
}

#[test]
fn diag_dir_is_under_the_work_folder() {
    assert_eq!(
        diag_dir(Path::new("/var/relay/work")),
        PathBuf::from("/var/relay/work/_diag")
    );
}

#[test]
fn panics_are_written_to_the_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("relayd.log");

    install_panic_hook(log_path.clone());
    let caught = std::panic::catch_unwind(|| panic!("worker blew up"));
    // Back to the default hook
    drop(std::panic::take_hook());

    assert!(caught.is_err());
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.lines().any(|l| l.starts_with("ERROR panicked at")));
    assert!(log.contains("worker blew up"));
}

#[test]
fn fatal_errors_are_appended() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("relayd.log");
    std::fs::write(&log_path, "earlier line\n").unwrap();

    write_fatal_error(&log_path, "serve failed");

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log, "earlier line\nERROR serve failed\n");
}
