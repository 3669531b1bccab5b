use insta::assert_snapshot;
use pipewright::core::pipeline::lint::{LintRegistry, LintResult, LintSeverity};
use pipewright::core::pipeline::PipelineDocument;

fn lint(yaml: &str) -> Vec<LintResult> {
    let pipeline = PipelineDocument::parse_str(yaml).expect("parse pipeline");
    LintRegistry::new().run(&pipeline)
}

fn summary(results: &[LintResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "{} {} {}",
                r.severity,
                r.code,
                r.location.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn severity_rank(severity: LintSeverity) -> u8 {
    match severity {
        LintSeverity::Error => 3,
        LintSeverity::Warning => 2,
        LintSeverity::Info => 1,
    }
}

#[test]
fn lint_results_are_stably_sorted() {
    let results = lint(
        r#"
inputs:
  - name: plasmids
    source: files
stages:
  - id: A
    kind: assembly:spades
    options:
      kmers: 21
  - id: A
    kind: assembly:skesa
  - id: B
    kind: report
    inputs:
      - role: contigs
        from: Q.contigs
  - id: C
    kind: assembly:velvet
"#,
    );
    assert!(!results.is_empty());
    for pair in results.windows(2) {
        let (left, right) = (&pair[0], &pair[1]);
        assert!(severity_rank(left.severity) >= severity_rank(right.severity));
        if left.severity == right.severity {
            assert!(left.code <= right.code);
        }
    }

    assert_snapshot!(summary(&results), @r"
    Error PW-LINT-001 A
    Error PW-LINT-002 B.contigs
    Error PW-LINT-003 C
    Error PW-LINT-007 A
    Warning PW-LINT-006 @plasmids
    Info PW-LINT-005 A.contigs
    ");
}

#[test]
fn cycle_is_reported_once_with_sorted_members() {
    let results = lint(
        r#"
stages:
  - id: P2
    kind: polish:pilon
    inputs:
      - role: contigs
        from: P1.contigs
  - id: P1
    kind: polish:pilon
    inputs:
      - role: contigs
        from: P2.contigs
"#,
    );
    let cycles: Vec<&LintResult> = results.iter().filter(|r| r.code == "PW-LINT-004").collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].location.as_deref(), Some("P1"));
    assert!(cycles[0].message.contains("[P1, P2]"));
}

#[test]
fn structural_problems_are_reported() {
    let results = lint(
        r#"
stages:
  - id: 9lives
    kind: report
    inputs:
      - role: contigs
        from: [A.contigs, A.contigs]
  - id: A
    kind: assembly:spades
"#,
    );
    let structure: Vec<&LintResult> = results.iter().filter(|r| r.code == "PW-LINT-008").collect();
    assert_eq!(structure.len(), 1);
    assert_eq!(structure[0].location.as_deref(), Some("9lives"));
    assert!(structure[0].is_error());
}

#[test]
fn clean_pipeline_only_reports_info() {
    let results = lint(
        r#"
stages:
  - id: A
    kind: assembly:spades
  - id: B
    kind: annotation:abricate
    inputs:
      - role: contigs
        from: A.contigs
"#,
    );
    assert_snapshot!(summary(&results), @"Info PW-LINT-005 B.results");
}
