use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_the_pipeline_commands() {
    Command::cargo_bin("recast")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transform"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("diff"))
        .stdout(predicate::str::contains("PIPELINE COMMANDS"));
}

#[test]
fn version_reports_the_crate_version() {
    Command::cargo_bin("recast")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn transform_requires_a_transformation_name() {
    Command::cargo_bin("recast")
        .unwrap()
        .arg("transform")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TRANSFORMATION"));
}

#[test]
fn migrate_requires_a_results_file() {
    Command::cargo_bin("recast")
        .unwrap()
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("RESULTS_FILE"));
}

#[test]
fn diff_fails_cleanly_on_a_missing_results_file() {
    Command::cargo_bin("recast")
        .unwrap()
        .args(["diff", "/nonexistent/results.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read result set"));
}
