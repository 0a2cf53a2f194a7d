// CLI tests for the oracle-voting-draft binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const VALID_DRAFT: &str = r#"
title = "Which client ships first?"
description = "Resolved by the release tags"
options = ["Alpha", "Beta", "Gamma"]
voting_duration = 172800
public_voting_duration = 3600
committee_size = 50
quorum = 30
"#;

const IMMEDIATE_DRAFT: &str = r#"
title = "Start right away"
options = ["Yes", "No"]
should_start_immediately = true
"#;

fn write_draft(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("draft.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("oracle-voting-draft").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("estimate"))
        .stdout(predicate::str::contains("publish"));
}

#[test]
fn test_validate_accepts_valid_draft() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, VALID_DRAFT);
    cli(&dir)
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Draft is valid"));
}

#[test]
fn test_validate_lists_every_invalid_field() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, "options = [\"Only one\"]\nquorum = 0\n");
    cli(&dir)
        .args(["validate", "--json"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"valid\": false"))
        .stdout(predicate::str::contains("\"title\""))
        .stdout(predicate::str::contains("\"options\""))
        .stdout(predicate::str::contains("\"quorum\""));
}

#[test]
fn test_estimate_reports_required_funds() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, VALID_DRAFT);
    cli(&dir)
        .arg("estimate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Required votes:      15"))
        .stdout(predicate::str::contains("Min balance:         70 iDNA"))
        .stdout(predicate::str::contains("2 days"));
}

#[test]
fn test_publish_deploys_voting() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, VALID_DRAFT);
    cli(&dir)
        .arg("publish")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("deployed"))
        .stdout(predicate::str::contains("started").not());
}

#[test]
fn test_publish_and_start() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, IMMEDIATE_DRAFT);
    cli(&dir)
        .args(["publish", "--json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\": \"done\""))
        .stdout(predicate::str::contains("\"didStart\": true"));
}

#[test]
fn test_publish_start_failure_is_reported_as_partial() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, IMMEDIATE_DRAFT);
    cli(&dir)
        .args(["publish", "--fail-start", "insufficient stake"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("was deployed but could not be started"))
        .stderr(predicate::str::contains("insufficient stake"));
}

#[test]
fn test_publish_deploy_failure() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, VALID_DRAFT);
    cli(&dir)
        .args(["publish", "--fail-deploy", "node unreachable"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Deploy failed: node unreachable"));
}

#[test]
fn test_publish_rejects_low_balance() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, VALID_DRAFT);
    cli(&dir)
        .args(["publish", "--balance", "1"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Funding rejected"))
        .stdout(predicate::str::contains("balance"));
}

#[test]
fn test_unknown_draft_key_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_draft(&dir, "title = \"x\"\ncolour = \"red\"\n");
    cli(&dir)
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse draft file"));
}
