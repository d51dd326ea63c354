//! CLI integration tests

use std::process::Command;
use tempfile::TempDir;

fn power_predict(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "power-predict-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = power_predict(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("CPU Power Predictor"), "Should show app name");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("convert"), "Should show convert command");
    assert!(stdout.contains("aggregate"), "Should show aggregate command");
    assert!(stdout.contains("energy"), "Should show energy command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = power_predict(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("power-predict"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = power_predict(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "predict help should succeed");
    assert!(stdout.contains("--mode"), "Should show mode option");
    assert!(stdout.contains("--model-dir"), "Should show model-dir option");
}

/// Test that an unknown prediction mode is rejected by argument parsing
#[test]
fn test_predict_rejects_unknown_mode() {
    let output = power_predict(&["predict", "report.csv", "--mode", "median"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unknown mode should fail");
    assert!(stderr.contains("invalid mode 'median'"), "Should name the bad mode");
}

/// Test converting a raw report end to end
#[test]
fn test_convert_writes_canonical_csv() {
    let temp_dir = TempDir::new().unwrap();
    let report = temp_dir.path().join("report.tsv");
    let converted = temp_dir.path().join("converted.csv");
    std::fs::write(
        &report,
        "Function\tCPU Time\tRetiring(%)\tModule\nmain\t1.5\t40.0\tapp\n",
    )
    .unwrap();

    let output = power_predict(&[
        "convert",
        report.to_str().unwrap(),
        "--output",
        converted.to_str().unwrap(),
        "--cpu-brand",
        "Intel(R) Xeon(R) Gold 6230",
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "convert should succeed");

    let written = std::fs::read_to_string(&converted).unwrap();
    assert_eq!(
        written.lines().next().unwrap(),
        "Function / Call Stack,CPU Time,Retiring,Module"
    );
}

/// Test that a failing command is logged and exits non-zero
#[test]
fn test_failed_command_is_logged() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.tsv");

    let output = power_predict(&[
        "convert",
        missing.to_str().unwrap(),
        "--cpu-brand",
        "Intel(R) Xeon(R) Gold 6230",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing report should fail");
    assert!(stderr.contains("Command failed"), "Should log the failure");
    assert!(stderr.contains("missing.tsv"), "Should name the report");
}
