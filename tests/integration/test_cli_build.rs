use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const PIPELINE: &str = r#"
name: two-stage
stages:
  - id: A
    kind: assembly:spades
  - id: B
    kind: report
    inputs:
      - role: contigs
        from: A.contigs
"#;

fn pipewright(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pipewright"));
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("PIPEWRIGHT_PIPELINE_NAME")
        .env_remove("PIPEWRIGHT_HOOKS_DIR")
        .env_remove("PIPEWRIGHT_TEMPLATES_DIR");
    cmd
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("pipeline.yaml"), PIPELINE).unwrap();
    dir
}

#[test]
fn build_writes_document_with_nf_extension() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "-o", "assembly"])
        .assert()
        .success()
        .stdout(predicate::str::contains("assembly.nf"));

    let text = fs::read_to_string(dir.path().join("assembly.nf")).unwrap();
    assert!(text.contains("// Pipeline: two-stage"));
    assert!(text.contains("process spades_A {"));
    assert!(text.contains("from A_contigs"));
}

#[test]
fn build_to_stdout_keeps_stdout_clean() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["--debug", "build", "pipeline.yaml", "-o", "-"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#!/usr/bin/env nextflow"))
        .stdout(predicate::str::contains("compiled pipeline").not());
}

#[test]
fn name_flag_overrides_document_name() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "-o", "-", "-n", "renamed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("// Pipeline: renamed"));
}

#[test]
fn configured_project_name_applies_to_unnamed_pipeline() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("pipeline.yaml"),
        "stages:\n  - id: A\n    kind: assembly:skesa\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("pipewright.toml"),
        "[project]\nname = \"from-config\"\n",
    )
    .unwrap();
    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "-o", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("// Pipeline: from-config"));
}

#[test]
fn build_into_missing_directory_fails() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "-o", "missing/assembly.nf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn build_reports_compile_error_code() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("pipeline.yaml"),
        "stages:\n  - id: B\n    kind: report\n    inputs:\n      - role: contigs\n        from: A.contigs\n",
    )
    .unwrap();
    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "-o", "out.nf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PW-CHAN-002"));
    assert!(!dir.path().join("out.nf").exists());
}

#[test]
fn check_json_reports_digest() {
    let dir = workspace();
    let output = pipewright(dir.path())
        .args(["check", "pipeline.yaml", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["compiled"], serde_json::json!(true));
    assert_eq!(report["digest"].as_str().unwrap().len(), 64);
    assert!(report["results"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["severity"] != "error"));
}

#[test]
fn check_fails_on_lint_errors() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("pipeline.yaml"),
        "stages:\n  - id: A\n    kind: assembly:velvet\n",
    )
    .unwrap();
    pipewright(dir.path())
        .args(["check", "pipeline.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error PW-LINT-003 [A]"));
}

#[test]
fn list_shows_builtin_kinds() {
    let dir = TempDir::new().unwrap();
    pipewright(dir.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("assembly:spades"))
        .stdout(predicate::str::contains("polish:pilon"));

    pipewright(dir.path())
        .args(["list", "--detailed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("label: spades_<id>"))
        .stdout(predicate::str::contains("reads (default @fastq)"))
        .stdout(predicate::str::contains("min_coverage: integer = 2"));
}

#[test]
fn recipe_builds_without_a_description_file() {
    let dir = TempDir::new().unwrap();
    pipewright(dir.path())
        .args(["build", "-r", "innuca", "-o", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("// Pipeline: innuca"))
        .stdout(predicate::str::contains("process pilon_pol {"));

    pipewright(dir.path())
        .args(["list", "--recipes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("compare_assemblers"));
}

#[test]
fn unknown_recipe_is_reported() {
    let dir = TempDir::new().unwrap();
    pipewright(dir.path())
        .args(["build", "-r", "velvet", "-o", "-"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PW-RECIPE-001"))
        .stderr(predicate::str::contains("innuca"));
}

#[test]
fn recipe_and_description_are_exclusive() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "-r", "innuca", "-o", "-"])
        .assert()
        .failure();
    pipewright(dir.path())
        .args(["build", "-o", "-"])
        .assert()
        .failure();
}

#[test]
fn auto_deps_inserts_required_read_check() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "-o", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains("integrity_coverage").not());

    pipewright(dir.path())
        .args(["build", "pipeline.yaml", "--auto-deps", "-o", "-"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "process integrity_coverage_integrity_coverage_A {",
        ))
        .stdout(predicate::str::contains("from integrity_coverage_A_reads\n"));
}

#[test]
fn graph_renders_dot() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["graph", "pipeline.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph"))
        .stdout(predicate::str::contains("contigs -> contigs"));
}

#[test]
fn explicit_missing_config_is_an_error() {
    let dir = workspace();
    pipewright(dir.path())
        .args(["--config", "nope.toml", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PW-CFG-001"));
}
