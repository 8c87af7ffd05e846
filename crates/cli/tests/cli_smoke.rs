//! CLI smoke tests for srcbuild.
//!
//! These tests verify that every command runs end to end and returns
//! appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the srcbuild binary, isolated from the caller's config.
fn srcbuild_cmd() -> Command {
  let mut cmd = cargo_bin_cmd!("srcbuild");
  cmd.env_remove("SRCBUILD_CONFIG");
  cmd
}

/// Create a temp directory holding `config.json`.
fn temp_config(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("config.json"), content).unwrap();
  temp
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  srcbuild_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  srcbuild_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("srcbuild"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["env", "patch", "flags"] {
    srcbuild_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// config
// =============================================================================

#[test]
fn invalid_config_fails() {
  let temp = temp_config("{ not json");

  srcbuild_cmd()
    .arg("--config")
    .arg(temp.path().join("config.json"))
    .args(["flags", "--", "--corba"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn config_from_environment_variable() {
  let temp = temp_config(r#"{ "generator": { "options": ["--extended-states"] } }"#);

  srcbuild_cmd()
    .env("SRCBUILD_CONFIG", temp.path().join("config.json"))
    .arg("flags")
    .assert()
    .success()
    .stdout("--extended-states\n");
}

// =============================================================================
// flags
// =============================================================================

#[test]
fn flags_are_merged_and_sorted() {
  srcbuild_cmd()
    .args(["flags", "--", "--transports=corba", "--corba", "--no-corba"])
    .assert()
    .success()
    .stdout("--no-corba\n--transports=corba\n");
}

#[test]
fn flags_override_configured_options() {
  let temp = temp_config(r#"{ "generator": { "options": ["--corba", "--extended-states"] } }"#);

  srcbuild_cmd()
    .arg("--config")
    .arg(temp.path().join("config.json"))
    .args(["flags", "--", "--no-extended-states"])
    .assert()
    .success()
    .stdout("--corba\n--no-extended-states\n");
}

#[test]
fn flags_json_output() {
  srcbuild_cmd()
    .args(["--output", "json", "flags", "--", "--corba"])
    .assert()
    .success()
    .stdout(predicate::str::contains("\"--corba\""));
}

// =============================================================================
// env
// =============================================================================

#[test]
fn env_adds_prefix_directories() {
  let temp = TempDir::new().unwrap();
  let bin = temp.path().join("bin");
  std::fs::create_dir_all(&bin).unwrap();

  srcbuild_cmd()
    .arg("env")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("PATH="))
    .stdout(predicate::str::contains(bin.to_string_lossy().into_owned()));
}

#[test]
fn env_empty_prefix_changes_nothing() {
  let temp = TempDir::new().unwrap();

  srcbuild_cmd()
    .arg("env")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("No variables changed"));
}

#[test]
fn env_missing_prefix_fails() {
  let temp = TempDir::new().unwrap();

  srcbuild_cmd()
    .arg("env")
    .arg(temp.path().join("missing"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Prefix not found"));
}

// =============================================================================
// patch
// =============================================================================

#[test]
fn patch_without_patches_is_in_sync() {
  let temp = TempDir::new().unwrap();

  srcbuild_cmd()
    .arg("patch")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Patches already in sync"));
}

#[test]
fn patch_missing_srcdir_fails() {
  let temp = TempDir::new().unwrap();

  srcbuild_cmd()
    .arg("patch")
    .arg(temp.path().join("missing"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Source directory not found"));
}

#[cfg(unix)]
#[test]
fn patch_records_applied_stack() {
  let config = temp_config(r#"{ "tools": { "patch": "true" } }"#);
  let src = TempDir::new().unwrap();
  let patch = config.path().join("fix.patch");
  std::fs::write(&patch, "").unwrap();

  srcbuild_cmd()
    .arg("--config")
    .arg(config.path().join("config.json"))
    .arg("patch")
    .arg(src.path())
    .arg(&patch)
    .assert()
    .success()
    .stdout(predicate::str::contains("1 patch applied"));

  let stamp = std::fs::read_to_string(src.path().join("patches-autobuild-stamp")).unwrap();
  assert_eq!(stamp.trim_end(), patch.to_string_lossy());

  srcbuild_cmd()
    .arg("--config")
    .arg(config.path().join("config.json"))
    .arg("patch")
    .arg(src.path())
    .arg(&patch)
    .assert()
    .success()
    .stdout(predicate::str::contains("Patches already in sync"));
}

#[cfg(unix)]
#[test]
fn failing_patch_tool_fails() {
  let config = temp_config(r#"{ "tools": { "patch": "false" } }"#);
  let src = TempDir::new().unwrap();
  let patch = config.path().join("fix.patch");
  std::fs::write(&patch, "").unwrap();

  srcbuild_cmd()
    .arg("--config")
    .arg(config.path().join("config.json"))
    .arg("patch")
    .arg(src.path())
    .arg(&patch)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to patch"));
}
