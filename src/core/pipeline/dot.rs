use crate::core::pipeline::schema::{ChannelRef, PipelineDocument};
use crate::core::pipeline::template::TemplateCatalog;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeMap;
use std::fmt;

/// Node weight: a stage or an external input.
enum GraphNode {
    Stage { id: String, kind: String },
    Input { name: String },
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Stage { id, kind } => write!(f, "{}\\n{}", id, kind),
            GraphNode::Input { name } => write!(f, "@{}", name),
        }
    }
}

/// Edge weight: `output -> input` role pair.
struct RoleEdge {
    label: String,
}

impl fmt::Display for RoleEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Render the stage graph as Graphviz DOT.
///
/// Fallback inputs the catalog would bind are drawn as edges from their
/// external input, so the picture matches what `compile` wires.
pub fn pipeline_to_dot(pipeline: &PipelineDocument, catalog: &TemplateCatalog) -> String {
    let mut graph: DiGraph<GraphNode, RoleEdge> = DiGraph::new();
    let mut stages: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    let mut inputs: BTreeMap<String, NodeIndex> = BTreeMap::new();

    for input in &pipeline.inputs {
        let node = graph.add_node(GraphNode::Input {
            name: input.name.clone(),
        });
        inputs.insert(input.name.clone(), node);
    }
    for stage in &pipeline.stages {
        if stages.contains_key(stage.id.as_str()) {
            continue;
        }
        let node = graph.add_node(GraphNode::Stage {
            id: stage.id.clone(),
            kind: stage.kind.clone(),
        });
        stages.insert(stage.id.as_str(), node);
    }

    for stage in &pipeline.stages {
        let to = stages[stage.id.as_str()];
        let mut edges: Vec<(ChannelRef, String)> = stage
            .inputs
            .iter()
            .flat_map(|binding| {
                binding
                    .from
                    .iter()
                    .map(move |source| (source.clone(), binding.role.clone()))
            })
            .collect();
        if let Some(template) = catalog.lookup(&stage.kind) {
            for role in &template.inputs {
                if let (None, Some(fallback)) = (stage.input(&role.name), &role.fallback) {
                    edges.push((ChannelRef::external(fallback), role.name.clone()));
                }
            }
        }

        for (source, role) in edges {
            let (from, label) = match &source {
                ChannelRef::Stage {
                    stage: producer,
                    role: output,
                } => match stages.get(producer.as_str()) {
                    Some(&node) => (node, format!("{} -> {}", output, role)),
                    None => continue,
                },
                ChannelRef::External { name } => {
                    let node = *inputs.entry(name.clone()).or_insert_with(|| {
                        graph.add_node(GraphNode::Input { name: name.clone() })
                    });
                    (node, role)
                }
            };
            graph.add_edge(from, to, RoleEdge { label });
        }
    }

    format!("{}", Dot::new(&graph))
}
