//! Dependency ordering and consumer planning for a normalized pipeline.

use crate::core::pipeline::channel::ConsumerRef;
use crate::core::pipeline::error::CompileError;
use crate::core::pipeline::schema::{ChannelRef, PipelineInput, StageSpec};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// One consumer of a channel: the reading input and its source slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedConsumer {
    pub consumer: ConsumerRef,
    pub slot: usize,
}

/// Stage order and the full consumer set of every referenced channel.
#[derive(Debug, Clone)]
pub struct DependencyPlan {
    order: Vec<usize>,
    consumers: BTreeMap<ChannelRef, Vec<PlannedConsumer>>,
    feeds: Vec<(ConsumerRef, usize)>,
}

impl DependencyPlan {
    /// Check references and order `stages` producers-first, ties broken by id.
    pub fn build(stages: &[StageSpec], inputs: &[PipelineInput]) -> Result<Self, CompileError> {
        let mut producers: HashMap<ChannelRef, usize> = HashMap::new();
        for (idx, stage) in stages.iter().enumerate() {
            for role in &stage.outputs {
                if producers
                    .insert(ChannelRef::stage(&stage.id, role), idx)
                    .is_some()
                {
                    return Err(CompileError::DuplicateOutput {
                        stage: stage.id.clone(),
                        role: role.clone(),
                    });
                }
            }
        }

        let mut ids = HashSet::new();
        for stage in stages {
            if !ids.insert(stage.id.as_str()) {
                return Err(CompileError::DuplicateStageId {
                    stage: stage.id.clone(),
                });
            }
        }

        let externals: HashSet<&str> = inputs.iter().map(|input| input.name.as_str()).collect();
        let mut downstream: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); stages.len()];
        let mut consumers: BTreeMap<ChannelRef, Vec<PlannedConsumer>> = BTreeMap::new();
        let mut feeds = Vec::new();

        for (idx, stage) in stages.iter().enumerate() {
            for binding in &stage.inputs {
                let consumer = ConsumerRef::new(&stage.id, &binding.role);
                feeds.push((consumer.clone(), binding.from.len()));
                for (slot, source) in binding.from.iter().enumerate() {
                    let known = match source {
                        ChannelRef::Stage { .. } => match producers.get(source) {
                            Some(&producer) => {
                                downstream[producer].insert(idx);
                                true
                            }
                            None => false,
                        },
                        ChannelRef::External { name } => externals.contains(name.as_str()),
                    };
                    if !known {
                        return Err(CompileError::UnresolvedInput {
                            stage: stage.id.clone(),
                            role: binding.role.clone(),
                            reference: source.to_string(),
                        });
                    }
                    consumers
                        .entry(source.clone())
                        .or_default()
                        .push(PlannedConsumer {
                            consumer: consumer.clone(),
                            slot,
                        });
                }
            }
        }

        let order = topological_order(stages, &downstream)?;
        let sequence: Vec<&str> = order.iter().map(|&i| stages[i].id.as_str()).collect();
        tracing::debug!(order = %sequence.join(" -> "), "ordered stages");
        Ok(Self {
            order,
            consumers,
            feeds,
        })
    }

    /// Stage indices in dependency order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Every reader of `source`, in declaration order.
    pub fn consumers_of(&self, source: &ChannelRef) -> &[PlannedConsumer] {
        self.consumers
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every stage input with the number of sources it declares.
    pub fn feeds(&self) -> &[(ConsumerRef, usize)] {
        &self.feeds
    }
}

fn topological_order(
    stages: &[StageSpec],
    downstream: &[BTreeSet<usize>],
) -> Result<Vec<usize>, CompileError> {
    let mut indegree = vec![0usize; stages.len()];
    for targets in downstream {
        for &target in targets {
            indegree[target] += 1;
        }
    }

    let mut ready: BTreeSet<(&str, usize)> = stages
        .iter()
        .enumerate()
        .filter(|(idx, _)| indegree[*idx] == 0)
        .map(|(idx, stage)| (stage.id.as_str(), idx))
        .collect();
    let mut order = Vec::with_capacity(stages.len());
    while let Some((_, idx)) = ready.pop_first() {
        order.push(idx);
        for &next in &downstream[idx] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.insert((stages[next].id.as_str(), next));
            }
        }
    }

    if order.len() == stages.len() {
        Ok(order)
    } else {
        Err(CompileError::CyclicPipeline {
            stages: cycle_members(stages, downstream, &order),
        })
    }
}

/// Ids of stages sitting on a cycle among the stages Kahn's pass could not order.
fn cycle_members(
    stages: &[StageSpec],
    downstream: &[BTreeSet<usize>],
    ordered: &[usize],
) -> Vec<String> {
    let done: HashSet<usize> = ordered.iter().copied().collect();
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();
    for idx in (0..stages.len()).filter(|idx| !done.contains(idx)) {
        nodes.insert(idx, graph.add_node(idx));
    }
    for (&idx, &node) in &nodes {
        for target in &downstream[idx] {
            if let Some(&target_node) = nodes.get(target) {
                graph.add_edge(node, target_node, ());
            }
        }
    }

    let mut members: Vec<String> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some())
        .flatten()
        .map(|node| stages[graph[node]].id.clone())
        .collect();
    if members.is_empty() {
        members = nodes.keys().map(|&idx| stages[idx].id.clone()).collect();
    }
    members.sort();
    members
}
