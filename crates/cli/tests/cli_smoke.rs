//! CLI smoke tests for streamsub.
//!
//! These tests verify that the commands that need no build service run
//! end to end, and that service commands fail cleanly without credentials.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the streamsub binary with no ambient credentials.
fn streamsub_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("streamsub");
  cmd.env_remove("VCAP_SERVICES").env_remove("STREAMSUB_CREDENTIALS");
  cmd
}

const MAIN_SPL: &str = r#"namespace sample;

composite Main {
  graph
    stream<int32 x> Numbers = Beacon() {}
}
"#;

/// Create an application directory and return the path of its main source file.
fn temp_app() -> (TempDir, PathBuf) {
  let temp = TempDir::new().unwrap();
  let app = temp.path().join("app");
  std::fs::create_dir_all(app.join("sample")).unwrap();
  std::fs::create_dir_all(app.join("output")).unwrap();
  std::fs::write(app.join("info.xml"), "<info/>").unwrap();
  std::fs::write(app.join("output/stale.sab"), "old").unwrap();
  let main = app.join("sample/Main.spl");
  std::fs::write(&main, MAIN_SPL).unwrap();
  (temp, main)
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  streamsub_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  streamsub_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("streamsub"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["build", "package", "submit", "console", "dashboard"] {
    streamsub_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// package
// =============================================================================

#[test]
fn package_writes_archive() {
  let (temp, main) = temp_app();

  streamsub_cmd()
    .arg("package")
    .arg(&main)
    .assert()
    .success()
    .stdout(predicate::str::contains("Archive written for sample::Main"));

  let archives: Vec<_> = std::fs::read_dir(temp.path().join("app"))
    .unwrap()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_name().to_string_lossy().starts_with(".build_sample.Main_"))
    .collect();
  assert_eq!(archives.len(), 1);
}

#[test]
fn package_json_lists_entries() {
  let (_temp, main) = temp_app();

  let output = streamsub_cmd()
    .args(["--format", "json", "package"])
    .arg(&main)
    .output()
    .unwrap();
  assert!(output.status.success());

  let archive: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let entries: Vec<&str> = archive["entries"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|e| e.as_str())
    .collect();
  assert!(entries.contains(&"sample/Main.spl"));
  assert!(entries.contains(&"Makefile"));
  assert!(!entries.iter().any(|e| e.starts_with("output")));
}

#[test]
fn package_without_main_composite_fails() {
  let temp = TempDir::new().unwrap();
  let file = temp.path().join("Helper.spl");
  std::fs::write(&file, "namespace sample;\ncomposite Helper(output Out) {\n}\n").unwrap();

  streamsub_cmd()
    .arg("package")
    .arg(&file)
    .assert()
    .failure()
    .stderr(predicate::str::contains("--composite"));
}

#[test]
fn package_nonexistent_file_fails() {
  streamsub_cmd()
    .arg("package")
    .arg("/nonexistent/path/Main.spl")
    .assert()
    .failure()
    .stderr(predicate::str::contains("File not found"));
}

// =============================================================================
// Service commands
// =============================================================================

#[test]
#[serial]
fn build_without_credentials_fails_and_cleans_up() {
  let (temp, main) = temp_app();

  streamsub_cmd()
    .arg("build")
    .arg(&main)
    .assert()
    .failure()
    .stderr(predicate::str::contains(
      "Unable to determine Streaming Analytics service credentials.",
    ));

  let leftovers = std::fs::read_dir(temp.path().join("app"))
    .unwrap()
    .filter_map(|e| e.ok())
    .filter(|e| e.file_name().to_string_lossy().starts_with(".build_"))
    .count();
  assert_eq!(leftovers, 0);
}

#[test]
#[serial]
fn console_without_credentials_fails() {
  streamsub_cmd()
    .arg("console")
    .assert()
    .failure()
    .stderr(predicate::str::contains("credentials"));
}

#[test]
fn submit_missing_bundle_fails() {
  streamsub_cmd()
    .arg("submit")
    .arg("/nonexistent/app.sab")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Bundle not found"));
}

#[test]
fn job_config_requires_submit() {
  let (_temp, main) = temp_app();

  streamsub_cmd()
    .arg("build")
    .arg(&main)
    .args(["--job-config", "job.json"])
    .assert()
    .failure();
}

// =============================================================================
// dashboard
// =============================================================================

#[test]
#[serial]
fn dashboard_prints_url() {
  streamsub_cmd()
    .env_remove("STREAMSUB_DASHBOARD_URL")
    .arg("dashboard")
    .assert()
    .success()
    .stdout(predicate::str::contains("https://cloud.ibm.com/resources"));
}

#[test]
#[serial]
fn dashboard_url_can_be_overridden() {
  streamsub_cmd()
    .env("STREAMSUB_DASHBOARD_URL", "https://dashboard.example/list")
    .args(["--format", "json", "dashboard"])
    .assert()
    .success()
    .stdout(predicate::str::contains(r#""url": "https://dashboard.example/list""#));
}
