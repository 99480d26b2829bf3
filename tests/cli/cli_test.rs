//! CLI contract tests.

use assert_cmd::Command;

fn coachbot(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("coachbot").expect("binary should build");
    cmd.env("HOME", home).env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = coachbot(tmp.path())
        .arg("--help")
        .output()
        .expect("binary should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("start"));
    assert!(stdout.contains("history"));
    assert!(stdout.contains("errors"));
}

#[test]
fn history_on_fresh_install_prints_empty_notice() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = coachbot(tmp.path())
        .arg("history")
        .output()
        .expect("binary should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No broadcasts recorded."));
    assert!(tmp.path().join(".coachbot").join("coachbot.db").exists());
}

#[test]
fn errors_on_fresh_install_prints_empty_notice() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = coachbot(tmp.path())
        .args(["errors", "--limit", "5"])
        .output()
        .expect("binary should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No errors recorded."));
}

#[test]
fn start_without_token_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let config = tmp.path().join("config.toml");
    std::fs::write(
        &config,
        "[telegram]\nbot_token_env = \"COACHBOT_TEST_TOKEN_UNSET\"\noperators = [1]\n",
    )
    .expect("write config");

    let output = coachbot(tmp.path())
        .arg("--config")
        .arg(&config)
        .arg("start")
        .env_remove("COACHBOT_TEST_TOKEN_UNSET")
        .output()
        .expect("binary should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("COACHBOT_TEST_TOKEN_UNSET"));
}
