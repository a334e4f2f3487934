mod common;

use assert_cmd::Command;
use common::write_scan;
use predicates::prelude::*;

fn hdfscan() -> Command {
    Command::cargo_bin("hdfscan").unwrap()
}

#[test]
fn test_eval_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", 5);
    hdfscan()
        .arg("eval")
        .arg(&path)
        .arg("eta.max()")
        .assert()
        .success()
        .stdout("5.0\n");
}

#[test]
fn test_format_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", 5);
    hdfscan()
        .arg("format")
        .arg(&path)
        .arg("{title}: {eta.shape}")
        .assert()
        .success()
        .stdout("scan 1: (5,)\n");
}

#[test]
fn test_unsafe_expression_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", 5);
    hdfscan()
        .arg("eval")
        .arg(&path)
        .arg("__import__('os')")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not allowed"));
}

#[test]
fn test_map_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", 5);
    let output = hdfscan().arg("map").arg("--json").arg(&path).output().unwrap();
    assert!(output.status.success());
    let map: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(map["arrays"]["eta"], "/entry1/measurement/eta");
}

#[test]
fn test_map_and_axes_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", 5);
    hdfscan()
        .arg("map")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Scan length: 5"));
    hdfscan()
        .args(["axes", "--strict"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("signal: /entry1/measurement/sum"));
}

#[test]
fn test_describe_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", 5);
    hdfscan()
        .arg("describe")
        .arg(&path)
        .arg("/entry1/measurement/eta")
        .assert()
        .success()
        .stdout(predicate::str::contains("Shape: (5,)"));
}

#[test]
fn test_table_command() {
    let dir = tempfile::tempdir().unwrap();
    write_scan(dir.path(), "1.nxs", "first", 3);
    write_scan(dir.path(), "2.nxs", "second", 4);
    hdfscan()
        .arg("table")
        .arg(dir.path())
        .arg("title")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.nxs\tfirst"))
        .stdout(predicate::str::contains("2.nxs\tsecond"));
}

#[test]
fn test_missing_file() {
    hdfscan()
        .args(["eval", "/no/such/file.nxs", "eta"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path not found"));
}

#[test]
fn test_log_file_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scan(dir.path(), "1001.nxs", "scan 1", 5);
    let log = dir.path().join("hdfscan.log");
    hdfscan()
        .arg("--log")
        .arg(&log)
        .arg("eval")
        .arg(&path)
        .arg("len(eta)")
        .assert()
        .success()
        .stdout("5\n");
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Starting hdfscan"));
}
