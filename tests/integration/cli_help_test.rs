use assert_cmd::Command;
use predicates::prelude::*;

fn pipewright() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pipewright"))
}

#[test]
fn test_root_help_lists_pipeline_commands() {
    pipewright()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("PIPELINE COMMANDS:"))
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("graph"));
}

#[test]
fn test_version_flag_prints_crate_version() {
    pipewright()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(pipewright::VERSION));
}

#[test]
fn test_build_help_documents_output_and_name() {
    pipewright()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("pipewright build pipeline.yaml -o assembly.nf"));
}

#[test]
fn test_check_help_lists_formats() {
    pipewright()
        .args(["check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--format"))
        .stdout(predicate::str::contains("json"));
}

#[test]
fn test_missing_subcommand_fails() {
    pipewright().assert().failure();
}
