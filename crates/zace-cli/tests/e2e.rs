//! End-to-end tests for the `zace` binary. Requires a configured LLM
//! endpoint for anything beyond argument parsing and config bootstrap.

use std::process::Command;

fn zace_cmd(tmp: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_zace"));
    cmd.arg("--cd").arg(tmp);
    cmd
}

#[test]
fn cli_help_displays_correctly() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = zace_cmd(tmp.path()).arg("--help").output().expect("failed to run zace --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("chat"));
    assert!(stdout.contains("session"));
    assert!(stdout.contains("config"));
    assert!(stdout.contains("doctor"));
}

#[test]
fn config_init_then_show_round_trips() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let init = zace_cmd(tmp.path()).args(["config", "init"]).output().expect("failed to run zace config init");
    assert!(init.status.success());
    assert!(tmp.path().join(".zace/config.toml").exists());

    let show = zace_cmd(tmp.path()).args(["config", "show"]).output().expect("failed to run zace config show");
    assert!(show.status.success());
    let stdout = String::from_utf8_lossy(&show.stdout);
    assert!(stdout.contains("max_steps"));
}

#[test]
fn config_validate_on_default_config_succeeds() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let validate = zace_cmd(tmp.path()).args(["config", "validate"]).output().expect("failed to run zace config validate");
    assert!(validate.status.success());
}

#[test]
fn session_list_on_fresh_project_is_empty() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = zace_cmd(tmp.path()).args(["session", "list"]).output().expect("failed to run zace session list");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).trim().is_empty());
}
