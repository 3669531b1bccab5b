use pipewright::core::config::ConfigLoader;
use pipewright::core::pipeline::hooks::DEFAULT_NOTIFY_SNIPPET;
use pipewright::core::pipeline::{PipelineAssembler, PipelineDocument};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn clear_pipewright_env() {
    for v in &[
        "PIPEWRIGHT_PIPELINE_NAME",
        "PIPEWRIGHT_HOOKS_DIR",
        "PIPEWRIGHT_TEMPLATES_DIR",
    ] {
        env::remove_var(v);
    }
}

const FASTQC_TEMPLATE: &str = r#"
kind: "qc:fastqc"
description: "Read quality report"
inputs:
  - name: reads
    fallback: fastq
outputs:
  - name: reads
body: |
  process {{ label }} {

      {{ hook:notify }}
      tag { sample_id }

      input:
      set sample_id, file(fastq_pair) from {{ in.reads }}

      output:
      set sample_id, file(fastq_pair) into {{ out.reads }}

      script:
      template "fastqc.py"
  }
"#;

#[test]
#[serial]
fn test_missing_config_uses_defaults() {
    clear_pipewright_env();
    let temp_dir = TempDir::new().unwrap();
    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert_eq!(config.project.name, "pipewright");
    assert!(config.hooks.kinds.is_empty());

    let resolved = ConfigLoader::resolve(config, temp_dir.path()).unwrap();
    assert!(resolved.hooks.is_empty());
    assert_eq!(resolved.catalog.len(), 7);
}

#[test]
#[serial]
fn test_config_loading_integration() {
    clear_pipewright_env();
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path();
    fs::create_dir(workspace.join("templates")).unwrap();
    fs::write(workspace.join("templates/fastqc.yaml"), FASTQC_TEMPLATE).unwrap();
    fs::write(
        workspace.join("pipewright.toml"),
        r#"
[project]
name = "outbreak-assembly"

[templates]
directory = "templates"

[hooks.kinds."assembly:spades"]
notify = true
report = true

[hooks.kinds."qc:fastqc"]
notify = true
snippet = "afterScript 'qc_done.sh {{ stage_id }}'"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_workspace(workspace).unwrap();
    assert_eq!(config.project.name, "outbreak-assembly");

    let resolved = ConfigLoader::resolve(config, workspace).unwrap();
    assert!(resolved.catalog.contains("qc:fastqc"));
    assert_eq!(resolved.catalog.len(), 8);

    let spades = resolved.hooks.for_kind("assembly:spades").unwrap();
    assert_eq!(spades.notify.as_deref(), Some(DEFAULT_NOTIFY_SNIPPET));
    assert!(spades.report);
    let fastqc = resolved.hooks.for_kind("qc:fastqc").unwrap();
    assert_eq!(
        fastqc.notify.as_deref(),
        Some("afterScript 'qc_done.sh {{ stage_id }}'")
    );
    assert!(!fastqc.report);
}

#[test]
#[serial]
fn test_env_overrides_take_precedence() {
    clear_pipewright_env();
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path();
    fs::write(
        workspace.join("pipewright.toml"),
        "[project]\nname = \"from-file\"\n",
    )
    .unwrap();
    let hooks_dir = workspace.join("env-hooks");
    fs::create_dir(&hooks_dir).unwrap();

    env::set_var("PIPEWRIGHT_PIPELINE_NAME", "from-env");
    env::set_var("PIPEWRIGHT_HOOKS_DIR", &hooks_dir);
    let config = ConfigLoader::load_from_workspace(workspace).unwrap();
    clear_pipewright_env();

    assert_eq!(config.project.name, "from-env");
    assert_eq!(config.hooks.directory.as_deref(), Some(hooks_dir.as_path()));
}

#[test]
#[serial]
fn test_hook_files_are_probed_per_kind() {
    clear_pipewright_env();
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path();
    let hooks_dir = workspace.join("hooks");
    fs::create_dir(&hooks_dir).unwrap();
    fs::write(
        hooks_dir.join("assembly_spades.post"),
        "afterScript 'ping {{ label }}'\n",
    )
    .unwrap();
    fs::write(
        workspace.join("pipewright.toml"),
        "[hooks]\ndirectory = \"hooks\"\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_workspace(workspace).unwrap();
    let resolved = ConfigLoader::resolve(config, workspace).unwrap();
    assert_eq!(
        resolved.hooks.for_kind("assembly:spades").unwrap().notify.as_deref(),
        Some("afterScript 'ping {{ label }}'")
    );
    assert!(resolved.hooks.for_kind("report").is_none());

    let pipeline = PipelineDocument::parse_str(
        r#"
stages:
  - id: A
    kind: assembly:spades
"#,
    )
    .unwrap();
    let document = PipelineAssembler::new(&resolved.catalog)
        .compile(&pipeline, &resolved.hooks)
        .unwrap();
    assert!(document.text().contains("    afterScript 'ping spades_A'\n"));
}

#[test]
#[serial]
fn test_unknown_hook_kind_is_rejected() {
    clear_pipewright_env();
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path();
    fs::write(
        workspace.join("pipewright.toml"),
        "[hooks.kinds.\"assembly:velvet\"]\nnotify = true\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_workspace(workspace).unwrap();
    let err = ConfigLoader::resolve(config, workspace).unwrap_err();
    assert_eq!(err.code, "PW-CFG-003");
}

#[test]
#[serial]
fn test_malformed_toml_reports_parse_error() {
    clear_pipewright_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("pipewright.toml"), "[project\nname = 1").unwrap();
    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.code, "PW-CFG-002");
}

#[test]
fn test_explicit_config_must_exist() {
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_explicit(&temp_dir.path().join("missing.toml")).unwrap_err();
    assert_eq!(err.code, "PW-CFG-001");
}

#[test]
fn test_env_var_documentation_lists_all_overrides() {
    let docs = ConfigLoader::env_var_documentation();
    assert_eq!(docs.len(), 3);
    assert!(docs.iter().any(|line| line.starts_with("PIPEWRIGHT_TEMPLATES_DIR")));
}
