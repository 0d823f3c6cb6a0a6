//! End-to-end tests of the falseshare binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn falseshare() -> Command {
    Command::cargo_bin("falseshare").unwrap()
}

// ============================================================================
// analyze
// ============================================================================

#[test]
fn test_analyze_minimal_scenario() {
    let tmp_dir = TempDir::new().unwrap();
    let trace = tmp_dir.path().join("pinatrace.out");
    let globals = tmp_dir.path().join("fs_globals.txt");
    fs::write(&trace, "pc W 1000 1 1 0\npc R 1001 1 2 0\n").unwrap();
    fs::write(&globals, "v 1000 2\n").unwrap();

    falseshare()
        .arg("analyze")
        .arg(&trace)
        .arg("--symbols")
        .arg(&globals)
        .assert()
        .success()
        .stdout("v 0 1 v 1 1 1\n");
}

#[test]
fn test_analyze_shared_globals() {
    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .assert()
        .success()
        .stdout("thread_data1 0 1 thread_data3 0 1 4\n")
        .stderr(predicate::str::contains("Line #12 formatted incorrectly"));
}

#[test]
fn test_analyze_tolerates_non_utf8_trace() {
    let tmp_dir = TempDir::new().unwrap();
    let trace = tmp_dir.path().join("pinatrace.out");
    let globals = tmp_dir.path().join("fs_globals.txt");
    fs::write(&trace, b"pc W 1000 1 1 0\n\xff\xfe R 10zz 1 3 0\npc R 1001 1 2 \x80\n").unwrap();
    fs::write(&globals, "v 1000 2\n").unwrap();

    falseshare()
        .arg("analyze")
        .arg(&trace)
        .arg("--symbols")
        .arg(&globals)
        .assert()
        .success()
        .stdout("v 0 1 v 1 1 1\n")
        .stderr(predicate::str::contains("Line #2 formatted incorrectly"));
}

#[test]
fn test_analyze_with_potential_conflicts() {
    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .arg("--potential")
        .arg(fixture("potential.txt"))
        .assert()
        .success()
        .stdout(
            "thread_data1 0 1 thread_data3 0 1 7\n\
             thread_data2 0 1 thread_data4 0 1 10\n",
        );
}

#[test]
fn test_analyze_top_ranks_by_priority() {
    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .arg("--potential")
        .arg(fixture("potential.txt"))
        .arg("--top")
        .arg("1")
        .assert()
        .success()
        .stdout("thread_data2 0 1 thread_data4 0 1 10\n");
}

#[test]
fn test_analyze_small_cache_line_separates_globals() {
    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .arg("--cache-line-size")
        .arg("8")
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_analyze_json_output() {
    let output = falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["cache_line_size"], 64);
    assert_eq!(json["conflicts"][0]["first"]["name"], "thread_data1");
    assert_eq!(json["conflicts"][0]["priority"], 4);
    assert_eq!(json["trace"]["records"], 8);
    assert_eq!(json["trace"]["malformed_lines"], 1);
    assert_eq!(json["trace"]["raw_conflicts"], 5);
    assert_eq!(json["aggregate"]["unresolved_pairs"], 1);
}

#[test]
fn test_analyze_writes_output_file() {
    let tmp_dir = TempDir::new().unwrap();
    let report = tmp_dir.path().join("mapped_conflicts.out");

    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .arg("-o")
        .arg(&report)
        .assert()
        .success()
        .stdout("");

    assert_eq!(
        fs::read_to_string(&report).unwrap(),
        "thread_data1 0 1 thread_data3 0 1 4\n"
    );
}

// ============================================================================
// detect + map
// ============================================================================

#[test]
fn test_detect_then_map() {
    let tmp_dir = TempDir::new().unwrap();
    let trace = tmp_dir.path().join("pinatrace.out");
    fs::copy(fixture("shared_globals.trace"), &trace).unwrap();

    falseshare()
        .arg("detect")
        .arg(&trace)
        .assert()
        .success()
        .stderr(predicate::str::contains("Number of interferences: 5"));

    let interferences = tmp_dir.path().join("pinatrace.out.interferences");
    let raw = fs::read_to_string(&interferences).unwrap();
    assert_eq!(raw.lines().count(), 5);
    assert_eq!(raw.lines().next(), Some("601040\t601048"));
    assert_eq!(raw.lines().last(), Some("7ffd5c2e1a40\t7ffd5c2e1a48"));

    falseshare()
        .arg("map")
        .arg("--realized")
        .arg(&interferences)
        .arg("--potential")
        .arg(fixture("potential.txt"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .assert()
        .success()
        .stdout(
            "thread_data1 0 1 thread_data3 0 1 7\n\
             thread_data2 0 1 thread_data4 0 1 10\n",
        );
}

#[test]
fn test_detect_explicit_output() {
    let tmp_dir = TempDir::new().unwrap();
    let out = tmp_dir.path().join("raw.txt");

    falseshare()
        .arg("detect")
        .arg(fixture("shared_globals.trace"))
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    assert!(fs::read_to_string(&out).unwrap().starts_with("601040\t601048\n"));
}

// ============================================================================
// logging
// ============================================================================

fn analyze_shared_globals() -> Command {
    let mut cmd = falseshare();
    cmd.arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"));
    cmd
}

#[test]
fn test_rust_log_enables_debug_output() {
    analyze_shared_globals()
        .env("RUST_LOG", "debug")
        .assert()
        .success()
        .stderr(predicate::str::contains("Unresolved conflict"));
}

#[test]
fn test_default_log_level_is_info() {
    analyze_shared_globals()
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded 4 global variables"))
        .stderr(predicate::str::contains("Unresolved conflict").not());
}

#[test]
fn test_quiet_overrides_rust_log() {
    analyze_shared_globals()
        .env("RUST_LOG", "debug")
        .arg("--quiet")
        .assert()
        .success()
        .stderr(predicate::str::contains("Unresolved conflict").not())
        .stderr(predicate::str::contains("Loaded").not())
        .stderr(predicate::str::contains("Line #12 formatted incorrectly"));
}

// ============================================================================
// configuration and failures
// ============================================================================

#[test]
fn test_config_file_sets_cache_line_size() {
    let tmp_dir = TempDir::new().unwrap();
    let config = tmp_dir.path().join("falseshare.toml");
    fs::write(&config, "cache_line_size = 8\n").unwrap();

    falseshare()
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_rejects_non_power_of_two_cache_line() {
    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .arg("--cache-line-size")
        .arg("48")
        .assert()
        .failure()
        .stderr(predicate::str::contains("power of two"));
}

#[test]
fn test_missing_trace_fails() {
    falseshare()
        .arg("analyze")
        .arg("/nonexistent/pinatrace.out")
        .arg("--symbols")
        .arg(fixture("fs_globals.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open trace"));
}

#[test]
fn test_missing_symbols_fails() {
    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .arg("--symbols")
        .arg("/nonexistent/fs_globals.txt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open symbol table"));
}

#[test]
fn test_requires_symbol_source() {
    falseshare()
        .arg("analyze")
        .arg(fixture("shared_globals.trace"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--symbols"));
}

#[test]
fn test_help() {
    falseshare()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("analyze"));
}
