use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("pbar")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("count"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_demo_help_shows_options() {
    cargo_bin_cmd!("pbar")
        .args(["demo", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--counters"))
        .stdout(predicate::str::contains("--unknown-total"))
        .stdout(predicate::str::contains("--remove-when-done"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("pbar")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_unknown_command_fails() {
    cargo_bin_cmd!("pbar")
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
