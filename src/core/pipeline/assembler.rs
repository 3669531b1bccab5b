use crate::core::pipeline::channel::{
    external_channel_name, output_channel_name, Channel, ChannelRegistry, ConsumerRef,
};
use crate::core::pipeline::dependency;
use crate::core::pipeline::error::CompileError;
use crate::core::pipeline::forks::{ForkMergeResolver, Scaffold};
use crate::core::pipeline::hooks::{status_report_block, HookConfig};
use crate::core::pipeline::order::DependencyPlan;
use crate::core::pipeline::schema::{
    ChannelRef, InputBinding, PipelineDocument, PipelineInput, StageSpec,
};
use crate::core::pipeline::template::{
    quote_text, RenderedStage, ResolvedChannels, TemplateCatalog, TemplateRenderer,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

const SHEBANG: &str = "#!/usr/bin/env nextflow";

/// Compile with the built-in template catalog.
pub fn compile(
    pipeline: &PipelineDocument,
    hooks: &HookConfig,
) -> Result<WorkflowDocument, CompileError> {
    let catalog = TemplateCatalog::builtin();
    PipelineAssembler::new(&catalog).compile(pipeline, hooks)
}

/// The complete generated workflow plus the tables it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDocument {
    pub name: String,
    pub stages: Vec<RenderedStage>,
    pub scaffolds: Vec<Scaffold>,
    pub channels: Vec<Channel>,
    text: String,
}

impl WorkflowDocument {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Hex SHA-256 of the document text.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.text.as_bytes()))
    }

    pub fn stage(&self, id: &str) -> Option<&RenderedStage> {
        self.stages.iter().find(|stage| stage.stage_id == id)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name == name)
    }
}

impl fmt::Display for WorkflowDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug)]
enum Block {
    Stage(usize),
    Scaffold(usize),
}

#[derive(Debug)]
struct Normalized {
    inputs: Vec<PipelineInput>,
    stages: Vec<StageSpec>,
}

/// Walks a pipeline in dependency order and concatenates the rendered blocks.
pub struct PipelineAssembler<'a> {
    catalog: &'a TemplateCatalog,
    resolver: ForkMergeResolver,
    auto_dependency: bool,
}

impl<'a> PipelineAssembler<'a> {
    pub fn new(catalog: &'a TemplateCatalog) -> Self {
        Self {
            catalog,
            resolver: ForkMergeResolver::new(),
            auto_dependency: false,
        }
    }

    /// Insert stages of the kinds a template `requires` when none feeds the stage.
    pub fn with_auto_dependency(mut self, enabled: bool) -> Self {
        self.auto_dependency = enabled;
        self
    }

    pub fn compile(
        &self,
        pipeline: &PipelineDocument,
        hooks: &HookConfig,
    ) -> Result<WorkflowDocument, CompileError> {
        let normalized = self.normalize(pipeline)?;
        let plan = DependencyPlan::build(&normalized.stages, &normalized.inputs)?;
        let renderer = TemplateRenderer::new(self.catalog);

        let mut registry = ChannelRegistry::new();
        for (consumer, sources) in plan.feeds() {
            registry.expect_feed(consumer.clone(), *sources);
        }

        let mut stages: Vec<RenderedStage> = Vec::with_capacity(normalized.stages.len());
        let mut scaffolds: Vec<Scaffold> = Vec::new();
        let mut blocks: Vec<Block> = Vec::new();
        let mut push_scaffold = |scaffold: Option<Scaffold>, blocks: &mut Vec<Block>| {
            if let Some(scaffold) = scaffold {
                blocks.push(Block::Scaffold(scaffolds.len()));
                scaffolds.push(scaffold);
            }
        };

        for input in &normalized.inputs {
            let name = registry.register_external(&input.name)?.name.clone();
            let planned = plan.consumers_of(&ChannelRef::external(&input.name));
            push_scaffold(self.resolver.fork(&mut registry, &name, planned)?, &mut blocks);
        }

        let mut labels = BTreeSet::new();
        let mut report_channels = Vec::new();
        for &idx in plan.order() {
            let stage = &normalized.stages[idx];

            for binding in stage.inputs.iter().filter(|b| b.is_merge()) {
                let consumer = ConsumerRef::new(&stage.id, &binding.role);
                push_scaffold(self.resolver.merge(&mut registry, &consumer)?, &mut blocks);
            }

            let mut bindings = ResolvedChannels::new();
            for role in &stage.outputs {
                let channel = registry.register(&stage.id, role)?;
                bindings.outputs.insert(role.clone(), channel.name.clone());
            }
            for binding in &stage.inputs {
                let channel = registry.resolve(&stage.id, &binding.role)?;
                bindings.inputs.insert(binding.role.clone(), channel.name.clone());
            }

            let rendered = renderer.render(stage, &bindings, hooks)?;
            if !labels.insert(rendered.label.clone()) {
                return Err(CompileError::InvalidStage {
                    stage: stage.id.clone(),
                    reason: format!("process label '{}' is already in use", rendered.label),
                });
            }
            report_channels.extend(rendered.report_channels.iter().cloned());
            blocks.push(Block::Stage(stages.len()));
            stages.push(rendered);

            for role in &stage.outputs {
                let source = output_channel_name(&stage.id, role);
                let planned = plan.consumers_of(&ChannelRef::stage(&stage.id, role));
                push_scaffold(self.resolver.fork(&mut registry, &source, planned)?, &mut blocks);
            }
        }

        let channels = registry.finalize()?;
        let text = layout(
            &pipeline.name,
            &normalized.inputs,
            &blocks,
            &stages,
            &scaffolds,
            status_report_block(&report_channels),
        );
        tracing::info!(
            pipeline = %pipeline.name,
            stages = stages.len(),
            channels = channels.len(),
            scaffolds = scaffolds.len(),
            "compiled pipeline"
        );

        Ok(WorkflowDocument {
            name: pipeline.name.clone(),
            stages,
            scaffolds,
            channels,
            text,
        })
    }

    /// Apply template defaults: output lists, fallback inputs and implicit external inputs.
    fn normalize(&self, pipeline: &PipelineDocument) -> Result<Normalized, CompileError> {
        pipeline.validate()?;
        let renderer = TemplateRenderer::new(self.catalog);

        let mut inputs = pipeline.inputs.clone();
        let mut stages = Vec::with_capacity(pipeline.stages.len());
        for spec in &pipeline.stages {
            let template = renderer.template_for(spec)?;
            let mut stage = spec.clone();
            if stage.outputs.is_empty() {
                stage.outputs = template.outputs.iter().map(|r| r.name.clone()).collect();
            }
            stages.push(stage);
        }
        if self.auto_dependency {
            let added = dependency::insert_required_stages(&mut stages, self.catalog)?;
            if added > 0 {
                tracing::info!(added, "inserted required upstream stages");
            }
        }

        for stage in stages.iter_mut() {
            let template = renderer.template_for(stage)?;
            for role in &template.inputs {
                if stage.input(&role.name).is_some() {
                    continue;
                }
                let Some(fallback) = &role.fallback else {
                    continue;
                };
                if !inputs.iter().any(|input| &input.name == fallback) {
                    tracing::debug!(input = %fallback, stage = %stage.id, "declaring implicit input");
                    inputs.push(PipelineInput::implicit(fallback.clone()));
                }
                stage
                    .inputs
                    .push(InputBinding::new(&role.name, ChannelRef::external(fallback)));
            }
        }
        Ok(Normalized { inputs, stages })
    }
}

fn layout(
    name: &str,
    inputs: &[PipelineInput],
    blocks: &[Block],
    stages: &[RenderedStage],
    scaffolds: &[Scaffold],
    sink: Option<String>,
) -> String {
    let mut sections: Vec<String> = vec![format!("{}\n\n// Pipeline: {}", SHEBANG, name)];

    let params: Vec<String> = inputs
        .iter()
        .filter_map(|input| {
            input
                .default
                .as_ref()
                .map(|value| format!("params.{} = {}", input.param_name(), quote_text(value)))
        })
        .collect();
    if !params.is_empty() {
        sections.push(params.join("\n"));
    }

    let channels: Vec<String> = inputs
        .iter()
        .map(|input| {
            format!(
                "{} = {}",
                external_channel_name(&input.name),
                input.source.factory(input.param_name())
            )
        })
        .collect();
    if !channels.is_empty() {
        sections.push(channels.join("\n"));
    }

    for block in blocks {
        match block {
            Block::Stage(idx) => sections.push(stages[*idx].text.clone()),
            Block::Scaffold(idx) => sections.push(scaffolds[*idx].render()),
        }
    }
    sections.extend(sink);

    let mut text = sections.join("\n\n");
    text.push('\n');
    text
}
