use super::{LintContext, LintResult, LintSeverity, PipelineLintRule};
use crate::core::pipeline::schema::ChannelRef;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub fn built_in_rules() -> Vec<Box<dyn PipelineLintRule>> {
    vec![
        Box::new(DuplicateStageIdsRule),
        Box::new(UnknownInputReferenceRule),
        Box::new(UnknownStageKindRule),
        Box::new(DependencyCycleRule),
        Box::new(UnconsumedOutputRule),
        Box::new(UnusedExternalInputRule),
        Box::new(StageOptionsRule),
        Box::new(StageStructureRule),
    ]
}

struct DuplicateStageIdsRule;

impl PipelineLintRule for DuplicateStageIdsRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for stage in &ctx.pipeline.stages {
            *counts.entry(stage.id.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(stage_id, count)| {
                LintResult::new(
                    "PW-LINT-001",
                    LintSeverity::Error,
                    format!("duplicate stage id '{}' found {} times", stage_id, count),
                    Some(stage_id.to_string()),
                    Some("rename stages so every stage id is unique".to_string()),
                )
            })
            .collect()
    }
}

struct UnknownInputReferenceRule;

impl PipelineLintRule for UnknownInputReferenceRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        let mut out = Vec::new();
        for (stage_id, role, source) in &ctx.reads {
            if ctx.produces(source) {
                continue;
            }
            let suggestion = match source {
                ChannelRef::Stage { .. } => "point the input at an output role of an existing stage",
                ChannelRef::External { .. } => "declare the external input under 'inputs'",
            };
            out.push(LintResult::new(
                "PW-LINT-002",
                LintSeverity::Error,
                format!(
                    "input '{}' of stage '{}' references unknown channel '{}'",
                    role, stage_id, source
                ),
                Some(format!("{}.{}", stage_id, role)),
                Some(suggestion.to_string()),
            ));
        }
        out
    }
}

struct UnknownStageKindRule;

impl PipelineLintRule for UnknownStageKindRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        ctx.pipeline
            .stages
            .iter()
            .filter(|stage| !ctx.catalog.contains(&stage.kind))
            .map(|stage| {
                LintResult::new(
                    "PW-LINT-003",
                    LintSeverity::Error,
                    format!("stage '{}' uses unknown kind '{}'", stage.id, stage.kind),
                    Some(stage.id.clone()),
                    Some("run `pipewright list` to see available stage kinds".to_string()),
                )
            })
            .collect()
    }
}

struct DependencyCycleRule;

impl PipelineLintRule for DependencyCycleRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for stage in &ctx.pipeline.stages {
            nodes
                .entry(stage.id.as_str())
                .or_insert_with(|| graph.add_node(stage.id.as_str()));
        }
        for (stage_id, _, source) in &ctx.reads {
            let Some(producer) = source.producer() else {
                continue;
            };
            if let (Some(&from), Some(&to)) = (nodes.get(producer), nodes.get(stage_id)) {
                if graph.find_edge(from, to).is_none() {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut out = Vec::new();
        for scc in tarjan_scc(&graph) {
            let looped = scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some();
            if !looped {
                continue;
            }
            let mut members: Vec<&str> = scc.iter().map(|&node| graph[node]).collect();
            members.sort();
            out.push(LintResult::new(
                "PW-LINT-004",
                LintSeverity::Error,
                format!("stages [{}] form a dependency cycle", members.join(", ")),
                Some(members[0].to_string()),
                Some("break the cycle; pipelines must be acyclic".to_string()),
            ));
        }
        out
    }
}

struct UnconsumedOutputRule;

impl PipelineLintRule for UnconsumedOutputRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        let read: BTreeSet<&ChannelRef> = ctx.reads.iter().map(|(_, _, source)| source).collect();
        let mut out = Vec::new();
        for (stage_id, roles) in &ctx.outputs {
            for role in roles {
                if read.contains(&ChannelRef::stage(*stage_id, role)) {
                    continue;
                }
                out.push(LintResult::new(
                    "PW-LINT-005",
                    LintSeverity::Info,
                    format!("output '{}' of stage '{}' is never consumed", role, stage_id),
                    Some(format!("{}.{}", stage_id, role)),
                    None,
                ));
            }
        }
        out
    }
}

struct UnusedExternalInputRule;

impl PipelineLintRule for UnusedExternalInputRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        ctx.pipeline
            .inputs
            .iter()
            .filter(|input| {
                let reference = ChannelRef::external(&input.name);
                !ctx.reads.iter().any(|(_, _, source)| *source == reference)
            })
            .map(|input| {
                LintResult::new(
                    "PW-LINT-006",
                    LintSeverity::Warning,
                    format!("external input '{}' is never read", input.name),
                    Some(format!("@{}", input.name)),
                    Some("remove the input or bind it to a stage".to_string()),
                )
            })
            .collect()
    }
}

struct StageOptionsRule;

impl PipelineLintRule for StageOptionsRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        let mut out = Vec::new();
        for stage in &ctx.pipeline.stages {
            let Some(template) = ctx.catalog.lookup(&stage.kind) else {
                continue;
            };
            for (name, value) in &stage.options {
                let problem = match template.option(name) {
                    None => Some(format!("unknown option '{}'", name)),
                    Some(spec) => spec
                        .kind
                        .render(value)
                        .err()
                        .map(|reason| format!("option '{}': {}", name, reason)),
                };
                if let Some(problem) = problem {
                    out.push(LintResult::new(
                        "PW-LINT-007",
                        LintSeverity::Error,
                        format!("stage '{}' ({}): {}", stage.id, stage.kind, problem),
                        Some(stage.id.clone()),
                        Some(format!(
                            "see `pipewright list --detailed` for the options of '{}'",
                            stage.kind
                        )),
                    ));
                }
            }
            for spec in template.options.iter().filter(|spec| spec.default.is_none()) {
                if !stage.options.contains_key(&spec.name) {
                    out.push(LintResult::new(
                        "PW-LINT-007",
                        LintSeverity::Error,
                        format!(
                            "stage '{}' ({}): required option '{}' is not set",
                            stage.id, stage.kind, spec.name
                        ),
                        Some(stage.id.clone()),
                        None,
                    ));
                }
            }
        }
        out
    }
}

struct StageStructureRule;

impl PipelineLintRule for StageStructureRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult> {
        ctx.pipeline
            .stages
            .iter()
            .filter_map(|stage| stage.validate().err())
            .map(|err| {
                let location = err.stage_ids().into_iter().next();
                LintResult::new("PW-LINT-008", LintSeverity::Error, err.to_string(), location, None)
            })
            .collect()
    }
}
