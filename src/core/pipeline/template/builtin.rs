//! Built-in stage kinds shipped with the compiler.

use super::{OptionKind, OptionSpec, RoleSpec, StageTemplate};
use serde_json::json;

/// Raw paired-end reads input read by first stages.
pub const RAW_READS_INPUT: &str = "fastq";

/// Read check that raw-read consumers expect upstream.
pub const INTEGRITY_COVERAGE_KIND: &str = "reads:integrity_coverage";

pub fn templates() -> Vec<StageTemplate> {
    vec![
        integrity_coverage(),
        trimmomatic(),
        spades(),
        skesa(),
        pilon(),
        abricate(),
        report(),
    ]
}

fn reads_input() -> RoleSpec {
    RoleSpec::new("reads")
        .with_fallback(RAW_READS_INPUT)
        .describe("paired-end reads as (sample_id, [r1, r2])")
}

fn integrity_coverage() -> StageTemplate {
    StageTemplate {
        kind: INTEGRITY_COVERAGE_KIND.to_string(),
        description: "Checks read file integrity and estimates coverage against an expected genome size"
            .to_string(),
        inputs: vec![reads_input()],
        outputs: vec![RoleSpec::new("reads").describe("reads passing the coverage threshold")],
        options: vec![
            OptionSpec::new("genome_size", OptionKind::Float, Some(json!(2.1)))
                .describe("expected genome size in Mb"),
            OptionSpec::new("min_coverage", OptionKind::Integer, Some(json!(15)))
                .describe("minimum estimated coverage to keep a sample"),
        ],
        requires: Vec::new(),
        body: r#"process {{ label }} {

    {{ hook:notify }}
    tag { sample_id + " {{ stage_id }}" }
    {{ resources }}

    input:
    set sample_id, file(fastq_pair) from {{ in.reads }}
    val gsize from Channel.value({{ opt.genome_size }})
    val cov from Channel.value({{ opt.min_coverage }})

    output:
    set sample_id, file(fastq_pair) optional true into {{ out.reads }}
    file('*_coverage_report.txt') optional true
    {{ hook:status }}

    script:
    template "integrity_coverage.py"
}"#
        .to_string(),
    }
}

fn trimmomatic() -> StageTemplate {
    StageTemplate {
        kind: "trim:trimmomatic".to_string(),
        description: "Adapter and quality trimming of paired-end reads".to_string(),
        inputs: vec![reads_input()],
        outputs: vec![RoleSpec::new("reads").describe("trimmed paired-end reads")],
        options: vec![
            OptionSpec::new("sliding_window", OptionKind::Text, Some(json!("5:20"))),
            OptionSpec::new("leading", OptionKind::Integer, Some(json!(3))),
            OptionSpec::new("trailing", OptionKind::Integer, Some(json!(3))),
            OptionSpec::new("min_length", OptionKind::Integer, Some(json!(55))),
        ],
        requires: vec![INTEGRITY_COVERAGE_KIND.to_string()],
        body: r#"process {{ label }} {

    {{ hook:notify }}
    tag { sample_id + " {{ stage_id }}" }
    {{ resources }}
    publishDir 'results/trimmomatic/{{ label }}/', pattern: '*_trimlog.txt', mode: 'copy'

    input:
    set sample_id, file(fastq_pair) from {{ in.reads }}
    val sliding from Channel.value({{ opt.sliding_window }})
    val leading from Channel.value({{ opt.leading }})
    val trailing from Channel.value({{ opt.trailing }})
    val min_len from Channel.value({{ opt.min_length }})

    output:
    set sample_id, file('*_trim_*P*') optional true into {{ out.reads }}
    file('*_trimlog.txt') optional true
    {{ hook:status }}

    script:
    template "trimmomatic.py"
}"#
        .to_string(),
    }
}

fn spades() -> StageTemplate {
    StageTemplate {
        kind: "assembly:spades".to_string(),
        description: "De novo assembly of paired-end reads with SPAdes".to_string(),
        inputs: vec![reads_input()],
        outputs: vec![RoleSpec::new("contigs").describe("assembled contigs per sample")],
        options: vec![
            OptionSpec::new("kmers", OptionKind::Text, Some(json!("auto")))
                .describe("comma separated k-mer sizes, or 'auto'"),
            OptionSpec::new("min_coverage", OptionKind::Integer, Some(json!(2))),
            OptionSpec::new("min_kmer_coverage", OptionKind::Integer, Some(json!(2))),
        ],
        requires: vec![INTEGRITY_COVERAGE_KIND.to_string()],
        body: r#"process {{ label }} {

    {{ hook:notify }}
    tag { sample_id + " {{ stage_id }}" }
    {{ resources }}
    publishDir 'results/assembly/spades_{{ stage_id }}/', pattern: '*_spades.assembly.fasta', mode: 'copy'

    input:
    set sample_id, file(fastq_pair) from {{ in.reads }}
    val kmers from Channel.value({{ opt.kmers }})
    val min_coverage from Channel.value({{ opt.min_coverage }})
    val min_kmer_coverage from Channel.value({{ opt.min_kmer_coverage }})

    output:
    set sample_id, file('*_spades.assembly.fasta') optional true into {{ out.contigs }}
    {{ hook:status }}

    script:
    template "spades.py"
}"#
        .to_string(),
    }
}

fn skesa() -> StageTemplate {
    StageTemplate {
        kind: "assembly:skesa".to_string(),
        description: "De novo assembly of paired-end reads with SKESA".to_string(),
        inputs: vec![reads_input()],
        outputs: vec![RoleSpec::new("contigs")],
        options: Vec::new(),
        requires: Vec::new(),
        body: r#"process {{ label }} {

    {{ hook:notify }}
    tag { sample_id + " {{ stage_id }}" }
    {{ resources }}
    publishDir 'results/assembly/skesa_{{ stage_id }}/', pattern: '*_skesa.assembly.fasta', mode: 'copy'

    input:
    set sample_id, file(fastq_pair) from {{ in.reads }}

    output:
    set sample_id, file('*_skesa.assembly.fasta') optional true into {{ out.contigs }}
    {{ hook:status }}

    script:
    """
    skesa --fastq ${fastq_pair[0]},${fastq_pair[1]} --cores ${task.cpus} > ${sample_id}_skesa.assembly.fasta
    """
}"#
        .to_string(),
    }
}

fn pilon() -> StageTemplate {
    StageTemplate {
        kind: "polish:pilon".to_string(),
        description: "Polishes an assembly by mapping the sample's reads back onto it".to_string(),
        inputs: vec![
            RoleSpec::new("contigs").describe("assembly to polish"),
            reads_input(),
        ],
        outputs: vec![RoleSpec::new("contigs").describe("polished assembly")],
        options: vec![OptionSpec::new("fix", OptionKind::Text, Some(json!("all")))],
        requires: Vec::new(),
        body: r#"process {{ label }} {

    {{ hook:notify }}
    tag { sample_id + " {{ stage_id }}" }
    {{ resources }}
    publishDir 'results/polish/pilon_{{ stage_id }}/', pattern: '*_polished.assembly.fasta', mode: 'copy'

    input:
    set sample_id, file(assembly), file(fastq_pair) from {{ in.contigs }}.join({{ in.reads }})
    val fix from Channel.value({{ opt.fix }})

    output:
    set sample_id, file('*_polished.assembly.fasta') into {{ out.contigs }}
    {{ hook:status }}

    script:
    template "pilon.py"
}"#
        .to_string(),
    }
}

fn abricate() -> StageTemplate {
    StageTemplate {
        kind: "annotation:abricate".to_string(),
        description: "Screens contigs for resistance and virulence genes".to_string(),
        inputs: vec![RoleSpec::new("contigs")],
        outputs: vec![RoleSpec::new("results").describe("per-sample abricate tables")],
        options: vec![OptionSpec::new(
            "databases",
            OptionKind::Text,
            Some(json!("resfinder card vfdb")),
        )
        .describe("space separated abricate databases")],
        requires: Vec::new(),
        body: r#"process {{ label }} {

    {{ hook:notify }}
    tag { sample_id + " {{ stage_id }}" }
    {{ resources }}
    publishDir 'results/annotation/abricate_{{ stage_id }}/', mode: 'copy'

    input:
    set sample_id, file(assembly) from {{ in.contigs }}
    val databases from Channel.value({{ opt.databases }})

    output:
    set sample_id, file('*_abricate.tsv') into {{ out.results }}
    {{ hook:status }}

    script:
    template "abricate.py"
}"#
        .to_string(),
    }
}

fn report() -> StageTemplate {
    StageTemplate {
        kind: "report".to_string(),
        description: "Summarises an assembly into a JSON report".to_string(),
        inputs: vec![RoleSpec::new("contigs")],
        outputs: Vec::new(),
        options: vec![OptionSpec::new(
            "min_contig_length",
            OptionKind::Integer,
            Some(json!(200)),
        )],
        requires: Vec::new(),
        body: r#"process {{ label }} {

    {{ hook:notify }}
    tag { sample_id + " {{ stage_id }}" }
    {{ resources }}
    publishDir 'reports/{{ label }}/', pattern: '*_report.json', mode: 'copy'

    input:
    set sample_id, file(assembly) from {{ in.contigs }}
    val min_len from Channel.value({{ opt.min_contig_length }})

    output:
    file('*_report.json')
    {{ hook:status }}

    script:
    template "assembly_report.py"
}"#
        .to_string(),
    }
}
