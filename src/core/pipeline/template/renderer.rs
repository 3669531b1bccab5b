use super::{render, StageTemplate, TemplateCatalog};
use crate::core::pipeline::error::CompileError;
use crate::core::pipeline::hooks::{HookConfig, HookInjector};
use crate::core::pipeline::schema::{ResourceLimits, StageSpec};
use serde::Serialize;
use std::collections::BTreeMap;

/// Channel names bound to a stage's roles, keyed by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedChannels {
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
}

impl ResolvedChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, role: impl Into<String>, channel: impl Into<String>) -> Self {
        self.inputs.insert(role.into(), channel.into());
        self
    }

    pub fn with_output(mut self, role: impl Into<String>, channel: impl Into<String>) -> Self {
        self.outputs.insert(role.into(), channel.into());
        self
    }
}

/// Text block produced for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedStage {
    pub stage_id: String,
    pub kind: String,
    pub label: String,
    pub text: String,
    /// Status channels emitted by this block's reporting hook.
    pub report_channels: Vec<String>,
}

/// Instantiates stage templates from the catalog.
pub struct TemplateRenderer<'a> {
    catalog: &'a TemplateCatalog,
}

impl<'a> TemplateRenderer<'a> {
    pub fn new(catalog: &'a TemplateCatalog) -> Self {
        Self { catalog }
    }

    pub fn template_for(&self, stage: &StageSpec) -> Result<&'a StageTemplate, CompileError> {
        self.catalog
            .lookup(&stage.kind)
            .ok_or_else(|| CompileError::UnknownStageKind {
                stage: stage.id.clone(),
                kind: stage.kind.clone(),
            })
    }

    pub fn render(
        &self,
        stage: &StageSpec,
        bindings: &ResolvedChannels,
        hooks: &HookConfig,
    ) -> Result<RenderedStage, CompileError> {
        let template = self.template_for(stage)?;
        let binding_error = |placeholder: String, reason: String| CompileError::TemplateBinding {
            stage: stage.id.clone(),
            kind: stage.kind.clone(),
            placeholder,
            reason,
        };

        let label = template.label_for(&stage.id);
        let mut values = BTreeMap::new();
        values.insert("label".to_string(), label.clone());
        values.insert("stage_id".to_string(), stage.id.clone());
        values.insert("kind".to_string(), stage.kind.clone());
        values.insert("cpus".to_string(), stage.resources.cpus.to_string());
        values.insert("resources".to_string(), resource_directives(&stage.resources));

        for role in &template.inputs {
            let key = format!("in.{}", role.name);
            match bindings.inputs.get(&role.name) {
                Some(channel) => {
                    values.insert(key, channel.clone());
                }
                None if !role.required => {
                    values.insert(key, "Channel.empty()".to_string());
                }
                None => {
                    return Err(binding_error(
                        key,
                        "required input role is not bound".to_string(),
                    ))
                }
            }
        }
        if let Some(role) = bindings.inputs.keys().find(|r| template.input(r).is_none()) {
            return Err(binding_error(
                format!("in.{}", role),
                "template declares no such input role".to_string(),
            ));
        }

        for role in &template.outputs {
            let key = format!("out.{}", role.name);
            let channel = bindings.outputs.get(&role.name).ok_or_else(|| {
                binding_error(
                    key.clone(),
                    "output role is not declared by the stage".to_string(),
                )
            })?;
            values.insert(key, channel.clone());
        }
        if let Some(role) = bindings.outputs.keys().find(|r| template.output(r).is_none()) {
            return Err(binding_error(
                format!("out.{}", role),
                "template declares no such output role".to_string(),
            ));
        }

        for (name, value) in &stage.options {
            let spec = template.option(name).ok_or_else(|| {
                binding_error(format!("opt.{}", name), "unknown option".to_string())
            })?;
            let literal = spec
                .kind
                .render(value)
                .map_err(|reason| binding_error(format!("opt.{}", name), reason))?;
            values.insert(format!("opt.{}", name), literal);
        }
        for spec in &template.options {
            let key = format!("opt.{}", spec.name);
            if values.contains_key(&key) {
                continue;
            }
            let default = spec.default.as_ref().ok_or_else(|| {
                binding_error(
                    key.clone(),
                    "required option has no value and no default".to_string(),
                )
            })?;
            let literal = spec
                .kind
                .render(default)
                .map_err(|reason| binding_error(key.clone(), reason))?;
            values.insert(key, literal);
        }

        let injection = HookInjector::new(hooks)
            .inject(&stage.kind, &label, &stage.id)
            .map_err(|err| binding_error(err.placeholder, err.reason))?;
        let insertion_points = render::placeholders(&template.body);
        for (point, enabled) in [
            ("hook:notify", !injection.notify.is_empty()),
            ("hook:status", !injection.report_channels.is_empty()),
        ] {
            if enabled && !insertion_points.contains(point) {
                return Err(binding_error(
                    point.to_string(),
                    "hook is enabled for this kind but the template has no insertion point for it"
                        .to_string(),
                ));
            }
        }
        values.insert("hook:notify".to_string(), injection.notify);
        values.insert("hook:status".to_string(), injection.status);

        let mut text = render::substitute(&template.body, &values)
            .map_err(|err| binding_error(err.placeholder, err.reason))?;
        text.truncate(text.trim_end_matches('\n').len());
        tracing::debug!(stage = %stage.id, kind = %stage.kind, label = %label, "rendered stage");

        Ok(RenderedStage {
            stage_id: stage.id.clone(),
            kind: stage.kind.clone(),
            label,
            text,
            report_channels: injection.report_channels,
        })
    }
}

/// `cpus`, `memory` and `time` process directives, one per line.
pub fn resource_directives(resources: &ResourceLimits) -> String {
    let mut lines = vec![format!("cpus {}", resources.cpus)];
    if let Some(memory) = &resources.memory {
        lines.push(format!("memory {}", super::quote_text(memory)));
    }
    if let Some(time) = &resources.time {
        lines.push(format!("time {}", super::quote_text(time)));
    }
    lines.join("\n")
}
