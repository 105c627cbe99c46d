#![allow(deprecated)] // TODO: move from Command::cargo_bin to the cargo_bin_cmd! macro

mod common;

use common::TestProject;
use predicates::prelude::*;

/// Top-level help lists every command
#[test]
fn test_cli_help() {
    TestProject::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("lookup-subnet"));
}

#[test]
fn test_cli_version() {
    TestProject::new()
        .cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cumulus"));
}

#[test]
fn test_apply_help() {
    TestProject::new()
        .cmd()
        .args(["apply", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--file"))
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_invalid_command() {
    TestProject::new()
        .cmd()
        .arg("invalid-command")
        .assert()
        .failure();
}

#[test]
fn test_plan_requires_token() {
    let project = TestProject::new();
    project.write_manifest("resources: []\n");

    project
        .cmd()
        .arg("plan")
        .env_remove("OS_AUTH_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("token"));
}

#[test]
fn test_plan_missing_manifest() {
    TestProject::new()
        .cmd()
        .args(["plan", "-f", "missing.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.yaml"));
}

#[test]
fn test_plan_empty_manifest_has_no_changes() {
    let project = TestProject::new();
    project.write_manifest("resources: []\n");

    project
        .cmd()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));
}

#[test]
fn test_plan_unknown_kind() {
    let project = TestProject::new();
    project.write_manifest(
        r#"
resources:
  - kind: volume
    name: data
    spec: {}
"#,
    );

    project
        .cmd()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("volume"));
}

/// Validation runs offline, so an unreachable endpoint is never contacted
#[test]
fn test_plan_rejects_invalid_spec() {
    let project = TestProject::new();
    project.write_manifest(
        r#"
resources:
  - kind: backup_policy
    name: nightly
    spec:
      name: nightly
      start_time: "02:00"
      frequency: 30
      retention: 7
      retain_first: "N"
      status: "ON"
"#,
    );

    project
        .cmd()
        .arg("plan")
        .env("OS_ENDPOINT_VBS", "http://127.0.0.1:9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("frequency"));
}

#[test]
fn test_plan_new_resource() {
    let project = TestProject::new();
    project.write_manifest(
        r#"
resources:
  - kind: backup_policy
    name: nightly
    spec:
      name: nightly
      start_time: "02:00"
      frequency: 1
      retention: 7
      retain_first: "N"
      status: "ON"
"#,
    );

    project
        .cmd()
        .arg("plan")
        .env("OS_ENDPOINT_VBS", "http://127.0.0.1:9")
        .assert()
        .success()
        .stdout(predicate::str::contains("create backup_policy.nightly"))
        .stdout(predicate::str::contains("1 to create"));
}

/// Without --yes apply only prints the plan
#[test]
fn test_apply_without_yes_changes_nothing() {
    let project = TestProject::new();
    project.write_manifest(
        r#"
resources:
  - kind: backup_policy
    name: nightly
    spec:
      name: nightly
      start_time: "02:00"
      frequency: 1
      retention: 7
      retain_first: "N"
      status: "ON"
"#,
    );

    project
        .cmd()
        .arg("apply")
        .env("OS_ENDPOINT_VBS", "http://127.0.0.1:9")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"));
    assert!(!project.state_file().exists());
}

#[test]
fn test_show_empty_state() {
    TestProject::new()
        .cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("No resources in state"));
}

#[test]
fn test_show_recorded_state() {
    let project = TestProject::new();
    project.write_state(
        r#"{
  "version": 1,
  "updated_at": "2026-01-01T00:00:00Z",
  "resources": {
    "network.main": {
      "kind": "network",
      "id": "net-1",
      "observed": {"id": "net-1", "name": "main", "status": "ACTIVE"},
      "created_at": "2026-01-01T00:00:00Z",
      "updated_at": "2026-01-01T00:00:00Z"
    }
  }
}"#,
    );

    project
        .cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("network.main"))
        .stdout(predicate::str::contains("net-1"));

    project
        .cmd()
        .args(["show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"ACTIVE\""));
}

#[test]
fn test_destroy_empty_state() {
    TestProject::new()
        .cmd()
        .args(["destroy", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to destroy"));
}

#[test]
fn test_lookup_subnet_conflicting_dhcp_flags() {
    TestProject::new()
        .cmd()
        .args(["lookup-subnet", "--dhcp-enabled", "--dhcp-disabled"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
