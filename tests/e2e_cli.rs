//! CLI end-to-end tests
//!
//! Tests for the keycut command-line interface. None of these need a real
//! ffmpeg: every case fails (or finishes) before an engine would run.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the keycut binary
#[allow(deprecated)]
fn keycut_cmd() -> Command {
    Command::cargo_bin("keycut").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = keycut_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = keycut_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("keycut"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = keycut_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keycut"));
}

#[test]
fn test_cli_trim_help_mentions_aliases() {
    let mut cmd = keycut_cmd();
    cmd.args(["trim", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--from"))
        .stdout(predicate::str::contains("-ss"));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = keycut_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"))
        .stdout(predicate::str::is_match("Ready to trim|Cannot trim without").unwrap());
}

#[test]
fn test_cli_invalid_range_fails_without_output() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.mp4");

    let mut cmd = keycut_cmd();
    cmd.arg(dir.path().join("in.mp4"))
        .arg(&dest)
        .args(["-ss", "00:00:10", "-to", "00:00:05"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid range"));

    assert!(!dest.exists());
}

#[test]
fn test_cli_equal_bounds_are_an_invalid_range() {
    let dir = tempdir().unwrap();

    let mut cmd = keycut_cmd();
    cmd.args(["trim", "--from", "1:00", "--to", "00:01:00.000000"])
        .arg(dir.path().join("in.mp4"))
        .arg(dir.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid range"));
}

#[test]
fn test_cli_missing_source_is_a_probe_error() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.mp4");

    let mut cmd = keycut_cmd();
    cmd.arg("trim")
        .arg(dir.path().join("missing.mp4"))
        .arg(&dest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));

    assert!(!dest.exists());
}

#[test]
fn test_cli_malformed_timecode() {
    let mut cmd = keycut_cmd();
    cmd.args(["in.mp4", "out.mp4", "--from", "1:75"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timecode"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = keycut_cmd();
    cmd.args(["probe", "/nonexistent/file.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn test_cli_split_point_requires_from() {
    let mut cmd = keycut_cmd();
    cmd.args(["split-point", "in.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--from"));
}

#[test]
fn test_cli_missing_config_file() {
    let mut cmd = keycut_cmd();
    cmd.args(["--config", "/nonexistent/keycut.toml", "check-tools"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_cli_invalid_config_file() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("keycut.toml");
    std::fs::write(&config, "[trim]\npacket_window = 0\n").unwrap();

    let mut cmd = keycut_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("check-tools")
        .assert()
        .failure()
        .stderr(predicate::str::contains("packet_window"));
}
