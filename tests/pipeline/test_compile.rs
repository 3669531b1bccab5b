use pipewright::core::config::{ConfigLoader, PipewrightConfig};
use pipewright::core::pipeline::hooks::HookConfig;
use pipewright::core::pipeline::{
    compile, ChannelOrigin, ChannelRef, PipelineAssembler, PipelineDocument, StageSpec,
    TemplateCatalog,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn parse(yaml: &str) -> PipelineDocument {
    PipelineDocument::parse_str(yaml).expect("parse pipeline")
}

/// Channels read by every `from` clause, with the offset of the reading line.
/// Arguments of `.mix(...)` and `.join(...)` count as reads too.
fn read_channels(text: &str) -> Vec<(String, usize)> {
    let mut reads = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if let Some(rest) = line.split(" from ").nth(1) {
            let mut names: Vec<&str> = rest
                .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .take(1)
                .collect();
            for combinator in [".mix(", ".join("] {
                for piece in rest.split(combinator).skip(1) {
                    let args = piece.split(')').next().unwrap_or_default();
                    names.extend(args.split(',').map(str::trim));
                }
            }
            reads.extend(
                names
                    .into_iter()
                    .filter(|name| !name.is_empty() && *name != "Channel")
                    .map(|name| (name.to_string(), offset)),
            );
        }
        offset += line.len();
    }
    reads
}

fn assert_reads_defined_before_use(text: &str) {
    for (channel, used) in read_channels(text) {
        let defined = definition_offset(text, &channel)
            .unwrap_or_else(|| panic!("channel {} is never defined", channel));
        assert!(defined < used, "channel {} used before definition", channel);
    }
}

fn definition_offset(text: &str, channel: &str) -> Option<usize> {
    [
        format!("into {}\n", channel),
        format!("{} = ", channel),
        format!(" {} }}", channel),
        format!(" {};", channel),
        format!("set{{ {} }}", channel),
    ]
    .iter()
    .filter_map(|pattern| text.find(pattern.as_str()))
    .min()
}

#[test]
fn spades_then_report_end_to_end() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("A", "assembly:spades").with_output("contigs"),
        StageSpec::new("B", "report").with_input("contigs", ChannelRef::stage("A", "contigs")),
    ]);
    let document = compile(&pipeline, &HookConfig::disabled()).unwrap();
    let text = document.text();

    assert!(text.starts_with("#!/usr/bin/env nextflow\n\n// Pipeline: pipewright\n\n"));
    assert!(text.contains("IN_fastq = Channel.fromFilePairs(params.fastq)"));

    let a = text.find("process spades_A {").unwrap();
    let b = text.find("process report_B {").unwrap();
    assert!(a < b);
    assert!(text[a..b].contains("optional true into A_contigs\n"));
    assert!(text[a..b].contains("from IN_fastq\n"));
    assert!(text[b..].contains("set sample_id, file(assembly) from A_contigs\n"));

    assert_eq!(document.stages.len(), 2);
    assert_eq!(document.stage("A").unwrap().label, "spades_A");
    let contigs = document.channel("A_contigs").unwrap();
    assert_eq!(contigs.producer(), Some("A"));
    assert_eq!(contigs.consumers.len(), 1);
    assert_eq!(contigs.consumers[0].stage, "B");
    assert!(matches!(
        document.channel("IN_fastq").unwrap().origin,
        ChannelOrigin::External { .. }
    ));
}

#[test]
fn every_read_channel_is_defined_before_use() {
    let pipeline = parse(
        r#"
name: polish
inputs:
  - name: fastq
    source: file_pairs
    default: "data/*_{1,2}.fastq.gz"
stages:
  - id: qc
    kind: reads:integrity_coverage
  - id: trim
    kind: trim:trimmomatic
    inputs:
      - role: reads
        from: qc.reads
  - id: asm
    kind: assembly:spades
    inputs:
      - role: reads
        from: trim.reads
  - id: pol
    kind: polish:pilon
    inputs:
      - role: contigs
        from: asm.contigs
      - role: reads
        from: trim.reads
  - id: rep
    kind: report
    inputs:
      - role: contigs
        from: pol.contigs
"#,
    );
    let document = compile(&pipeline, &HookConfig::disabled()).unwrap();
    let text = document.text();

    let reads = read_channels(text);
    assert!(reads.iter().any(|(name, _)| name == "trim_reads_asm"));
    assert!(reads.iter().any(|(name, _)| name == "trim_reads_pol"));
    assert_reads_defined_before_use(text);

    assert!(text.contains("params.fastq = 'data/*_{1,2}.fastq.gz'"));
    assert!(text.contains("trim_reads.into{ trim_reads_asm; trim_reads_pol }"));
    assert!(text.contains("from pol_contigs\n"));
}

#[test]
fn compile_twice_is_byte_identical() {
    let yaml = r#"
stages:
  - id: B
    kind: annotation:abricate
    inputs:
      - role: contigs
        from: A.contigs
  - id: A
    kind: assembly:skesa
  - id: C
    kind: report
    inputs:
      - role: contigs
        from: A.contigs
"#;
    let first = compile(&parse(yaml), &HookConfig::disabled()).unwrap();
    let second = compile(&parse(yaml), &HookConfig::disabled()).unwrap();
    assert_eq!(first.text(), second.text());
    assert_eq!(first.digest(), second.digest());
    assert_eq!(first, second);
}

#[test]
fn stages_are_ordered_producers_first_then_by_id() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("Z", "report").with_input("contigs", ChannelRef::stage("M", "contigs")),
        StageSpec::new("M", "assembly:skesa"),
        StageSpec::new("C", "assembly:spades"),
    ]);
    let document = compile(&pipeline, &HookConfig::disabled()).unwrap();
    let order: Vec<&str> = document.stages.iter().map(|s| s.stage_id.as_str()).collect();
    assert_eq!(order, vec!["C", "M", "Z"]);
}

#[test]
fn resources_and_options_are_rendered() {
    let pipeline = parse(
        r#"
stages:
  - id: A
    kind: assembly:spades
    options:
      kmers: "21,33,55"
      min_coverage: 5
    resources:
      cpus: 8
      memory: "16 GB"
      time: "4h"
"#,
    );
    let document = compile(&pipeline, &HookConfig::disabled()).unwrap();
    let text = document.text();
    assert!(text.contains("    cpus 8\n    memory '16 GB'\n    time '4h'\n"));
    assert!(text.contains("val kmers from Channel.value('21,33,55')"));
    assert!(text.contains("val min_coverage from Channel.value(5)"));
    assert!(text.contains("val min_kmer_coverage from Channel.value(2)"));
    assert!(!text.contains("{{"));
}

#[test]
fn cycle_is_rejected_with_members() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("A", "polish:pilon").with_input("contigs", ChannelRef::stage("B", "contigs")),
        StageSpec::new("B", "polish:pilon").with_input("contigs", ChannelRef::stage("A", "contigs")),
    ]);
    let err = compile(&pipeline, &HookConfig::disabled()).unwrap_err();
    assert_eq!(err.code(), "PW-GRAPH-001");
    assert_eq!(err.stage_ids(), vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn duplicate_output_is_rejected() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("A", "assembly:spades").with_output("assembly"),
        StageSpec::new("A", "assembly:spades").with_output("assembly"),
    ]);
    let err = compile(&pipeline, &HookConfig::disabled()).unwrap_err();
    assert_eq!(err.code(), "PW-CHAN-001");
    assert_eq!(err.channel(), Some("assembly"));
}

#[test]
fn dangling_input_is_unresolved() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("B", "report").with_input("contigs", ChannelRef::stage("A", "contigs")),
    ]);
    let err = compile(&pipeline, &HookConfig::disabled()).unwrap_err();
    assert_eq!(err.code(), "PW-CHAN-002");
    assert_eq!(err.channel(), Some("A.contigs"));
}

#[test]
fn undeclared_external_input_is_unresolved() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("B", "report").with_input("contigs", ChannelRef::external("assemblies")),
    ]);
    let err = compile(&pipeline, &HookConfig::disabled()).unwrap_err();
    assert_eq!(err.code(), "PW-CHAN-002");
}

#[test]
fn unknown_kind_is_rejected() {
    let pipeline =
        PipelineDocument::from_stages(vec![StageSpec::new("A", "assembly:velvet")]);
    let err = compile(&pipeline, &HookConfig::disabled()).unwrap_err();
    assert_eq!(err.code(), "PW-TPL-001");
}

#[test]
fn wrong_option_type_is_a_binding_error() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("A", "assembly:spades").with_option("min_coverage", json!("lots")),
    ]);
    let err = compile(&pipeline, &HookConfig::disabled()).unwrap_err();
    assert_eq!(err.code(), "PW-TPL-002");
    assert_eq!(err.channel(), Some("opt.min_coverage"));
}

#[test]
fn unknown_output_role_is_a_binding_error() {
    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("A", "assembly:spades").with_output("scaffolds"),
    ]);
    let err = compile(&pipeline, &HookConfig::disabled()).unwrap_err();
    assert_eq!(err.code(), "PW-TPL-002");
}

#[test]
fn label_clash_is_rejected() {
    let mut catalog = TemplateCatalog::builtin();
    let mut renamed = catalog.lookup("assembly:spades").unwrap().clone();
    renamed.kind = "other:spades_x".to_string();
    catalog.insert(renamed).unwrap();

    let pipeline = PipelineDocument::from_stages(vec![
        StageSpec::new("A", "other:spades_x"),
        StageSpec::new("x_A", "assembly:spades"),
    ]);
    let err = PipelineAssembler::new(&catalog)
        .compile(&pipeline, &HookConfig::disabled())
        .unwrap_err();
    assert_eq!(err.code(), "PW-GRAPH-003");
    assert!(err.to_string().contains("spades_x_A"));
}

const STATS_TEMPLATE: &str = r#"
kind: "qc:stats"
description: "Per-sample read statistics"
inputs:
  - name: reads
    fallback: fastq
outputs:
  - name: stats
body: |
  process {{ label }} {

      {{ hook:notify }}
      tag { sample_id }

      input:
      set sample_id, file(fastq_pair) from {{ in.reads }}

      output:
      set sample_id, file('*_stats.txt') into {{ out.stats }}
      {{ hook:status }}

      script:
      template "read_stats.py"
  }
"#;

#[test]
fn directory_templates_with_report_hooks_define_every_read_channel() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("templates")).unwrap();
    fs::write(dir.path().join("templates/stats.yaml"), STATS_TEMPLATE).unwrap();
    let config_path = dir.path().join("pipewright.toml");
    fs::write(
        &config_path,
        r#"
[templates]
directory = "templates"

[hooks.kinds."qc:stats"]
notify = true
report = true

[hooks.kinds.report]
report = true
"#,
    )
    .unwrap();

    let config: PipewrightConfig = ConfigLoader::load_from_file(&config_path)
        .unwrap()
        .unwrap();
    let resolved = ConfigLoader::resolve(config, dir.path()).unwrap();
    let pipeline = parse(
        r#"
stages:
  - id: Q
    kind: qc:stats
  - id: R
    kind: report
    inputs:
      - role: contigs
        from: Q.stats
  - id: S
    kind: report
    inputs:
      - role: contigs
        from: Q.stats
"#,
    );
    let document = PipelineAssembler::new(&resolved.catalog)
        .compile(&pipeline, &resolved.hooks)
        .unwrap();
    let text = document.text();

    assert!(text.contains("Q_stats.into{ Q_stats_R; Q_stats_S }"));
    assert!(text.contains("into STATUS_stats_Q\n"));
    assert!(text.contains("from STATUS_stats_Q.mix(STATUS_report_R, STATUS_report_S)\n"));
    assert!(!text.contains("\n\n\n"));
    let reads = read_channels(text);
    assert!(reads.iter().any(|(name, _)| name == "STATUS_report_S"));
    assert_reads_defined_before_use(text);
}
