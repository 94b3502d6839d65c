//! CLI behaviour that does not need a running server.

use std::process::{Command, Output};

const ENV_VARS: &[&str] = &[
    "PRIMARY_HOST",
    "PRIMARY_PORT",
    "PRIMARY_USER",
    "PRIMARY_PASSWORD",
    "PRIMARY_SSL_CA",
    "REPLICA_HOST",
    "REPLICA_PORT",
    "REPLICA_USER",
    "REPLICA_PASSWORD",
    "REPLICA_SSL_CA",
    "CHECK_TABLES",
    "CHECK_IGNORE_TABLES",
    "CHECK_WAIT_TIMEOUT",
    "CHECK_CONNECT_TIMEOUT",
];

/// Execute mysql-replication-check with a clean environment and return the output
fn execute_check(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_mysql-replication-check"));
    for var in ENV_VARS {
        command.env_remove(var);
    }
    command
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run mysql-replication-check")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_exits_zero() {
    let output = execute_check(&["--help"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("--primary-host"));
    assert!(text.contains("--ignore-tables"));
    assert!(text.contains("--quiet"));
}

#[test]
fn test_version_exits_zero() {
    let output = execute_check(&["--version"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_host_is_usage_error() {
    let output = execute_check(&["--replica-host", "db2"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--primary-host"));
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let output = execute_check(&["--primary-host", "a", "--replica-host", "b", "--frobnicate"]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_invalid_filter_fails_before_connecting() {
    // Nothing listens on port 1; a connection attempt would report that instead.
    let output = execute_check(&[
        "--primary-host",
        "127.0.0.1",
        "--primary-port",
        "1",
        "--replica-host",
        "127.0.0.1",
        "--replica-port",
        "1",
        "--tables",
        "orders",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.contains("Invalid filter: orders"), "stderr: {err}");
    assert!(err.contains("database.table"), "stderr: {err}");
    assert!(!err.contains("cannot connect"), "stderr: {err}");
}

#[test]
fn test_invalid_wait_timeout_is_usage_error() {
    let output = execute_check(&[
        "--primary-host",
        "127.0.0.1",
        "--replica-host",
        "127.0.0.1",
        "--wait-timeout",
        "soon",
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--wait-timeout"));
}

#[test]
fn test_out_of_range_wait_timeout_is_usage_error() {
    for value in ["6000000000000000h", "18446744073709551615"] {
        let output = execute_check(&[
            "--primary-host",
            "127.0.0.1",
            "--replica-host",
            "127.0.0.1",
            "--wait-timeout",
            value,
        ]);

        assert_eq!(output.status.code(), Some(1), "--wait-timeout {value}");
        let err = stderr(&output);
        assert!(err.contains("--wait-timeout"), "stderr: {err}");
        assert!(!err.contains("panicked"), "stderr: {err}");
    }
}

#[test]
fn test_unreachable_primary_is_fatal() {
    let output = execute_check(&[
        "--primary-host",
        "127.0.0.1",
        "--primary-port",
        "1",
        "--replica-host",
        "127.0.0.1",
        "--replica-port",
        "1",
        "--connect-timeout",
        "5s",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(
        err.contains("cannot connect to primary server 127.0.0.1:1"),
        "stderr: {err}"
    );
}
