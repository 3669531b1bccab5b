#![allow(clippy::result_large_err)]

pub mod builtin;
pub mod render;
pub mod renderer;

pub use renderer::{RenderedStage, ResolvedChannels, TemplateRenderer};

use crate::core::error::AppError;
use crate::core::pipeline::schema::is_identifier;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholders every template may use besides its own roles and options.
pub const FIXED_PLACEHOLDERS: &[&str] = &[
    "label",
    "stage_id",
    "kind",
    "cpus",
    "resources",
    "hook:notify",
    "hook:status",
];

fn default_required() -> bool {
    true
}

/// Declared input or output role of a stage kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// External input bound to this role when the stage leaves it unbound.
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl RoleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            fallback: None,
            description: String::new(),
        }
    }

    pub fn with_fallback(mut self, input: impl Into<String>) -> Self {
        self.fallback = Some(input.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Integer,
    Float,
    Bool,
    Text,
}

impl OptionKind {
    /// Render `value` as a workflow literal, checking it matches this kind.
    pub fn render(&self, value: &Value) -> Result<String, String> {
        match (self, value) {
            (OptionKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Ok(n.to_string())
            }
            (OptionKind::Float, Value::Number(n)) => Ok(n.to_string()),
            (OptionKind::Bool, Value::Bool(b)) => Ok(b.to_string()),
            (OptionKind::Text, Value::String(s)) => Ok(quote_text(s)),
            (kind, other) => Err(format!("expected {} value, found {}", kind, other)),
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OptionKind::Integer => "integer",
            OptionKind::Float => "float",
            OptionKind::Bool => "bool",
            OptionKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Single-quoted Groovy string literal. Control characters are escaped so the
/// literal stays on one line.
pub fn quote_text(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('\'');
    quoted
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionKind,
    /// Options without a default must be set by every stage of this kind.
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: String,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, kind: OptionKind, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            description: String::new(),
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

/// Stage-kind template: declared roles, option schema and process body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTemplate {
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<RoleSpec>,
    #[serde(default)]
    pub outputs: Vec<RoleSpec>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    /// Stage kinds expected upstream; inserted when auto-dependency is on.
    #[serde(default)]
    pub requires: Vec<String>,
    pub body: String,
}

impl StageTemplate {
    pub fn input(&self, role: &str) -> Option<&RoleSpec> {
        self.inputs.iter().find(|spec| spec.name == role)
    }

    pub fn output(&self, role: &str) -> Option<&RoleSpec> {
        self.outputs.iter().find(|spec| spec.name == role)
    }

    pub fn option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|spec| spec.name == name)
    }

    /// Process label for a stage of this kind, e.g. `spades_A`.
    pub fn label_for(&self, stage_id: &str) -> String {
        let tail = self.kind.rsplit(':').next().unwrap_or(&self.kind);
        let tail: String = tail
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_{}", tail, stage_id)
    }

    /// Check the schema is usable, the body only references known names and
    /// every declared role appears in the body.
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |message: String| {
            AppError::new(
                ErrorCategory::TemplateError,
                format!("template '{}': {}", self.kind, message),
            )
            .with_code("PW-TPL-003")
        };

        if self.kind.trim().is_empty() {
            return Err(invalid("kind must not be empty".to_string()));
        }
        for role in self.inputs.iter().chain(&self.outputs) {
            if !is_identifier(&role.name) {
                return Err(invalid(format!("role '{}' is not an identifier", role.name)));
            }
        }
        for role in &self.inputs {
            if let Some(fallback) = &role.fallback {
                if !is_identifier(fallback) {
                    return Err(invalid(format!(
                        "fallback input '{}' of role '{}' is not an identifier",
                        fallback, role.name
                    )));
                }
            }
        }
        for required in &self.requires {
            if required.trim().is_empty() || *required == self.kind {
                return Err(invalid(format!(
                    "required kind '{}' must name another stage kind",
                    required
                )));
            }
        }
        for option in &self.options {
            if let Some(default) = &option.default {
                option.kind.render(default).map_err(|reason| {
                    invalid(format!("default for option '{}': {}", option.name, reason))
                })?;
            }
        }

        render::check_markers(&self.body).map_err(|err| invalid(err.to_string()))?;
        let used = render::placeholders(&self.body);
        for name in &used {
            let known = if let Some(role) = name.strip_prefix("in.") {
                self.input(role).is_some()
            } else if let Some(role) = name.strip_prefix("out.") {
                self.output(role).is_some()
            } else if let Some(option) = name.strip_prefix("opt.") {
                self.option(option).is_some()
            } else {
                FIXED_PLACEHOLDERS.contains(&name.as_str())
            };
            if !known {
                return Err(invalid(format!(
                    "body references undeclared placeholder '{}'",
                    name
                )));
            }
        }
        let roles = self
            .inputs
            .iter()
            .map(|role| format!("in.{}", role.name))
            .chain(self.outputs.iter().map(|role| format!("out.{}", role.name)));
        for placeholder in roles {
            if !used.contains(&placeholder) {
                return Err(invalid(format!(
                    "declared role '{}' never appears in the body",
                    placeholder
                )));
            }
        }
        Ok(())
    }
}

/// Stage-kind templates addressed by their kind key.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, StageTemplate>,
}

impl TemplateCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog holding the built-in stage kinds.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for template in builtin::templates() {
            catalog.templates.insert(template.kind.clone(), template);
        }
        catalog
    }

    /// Add or replace a template after validating it.
    pub fn insert(&mut self, template: StageTemplate) -> Result<(), AppError> {
        template.validate()?;
        if self.templates.contains_key(&template.kind) {
            tracing::debug!(kind = %template.kind, "overriding stage template");
        }
        self.templates.insert(template.kind.clone(), template);
        Ok(())
    }

    /// Parse one YAML template definition and add it.
    pub fn insert_yaml(&mut self, text: &str) -> Result<String, AppError> {
        let template: StageTemplate = serde_yaml::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse stage template: {}", err),
            )
            .with_code("PW-TPL-004")
        })?;
        let kind = template.kind.clone();
        self.insert(template)?;
        Ok(kind)
    }

    pub fn lookup(&self, kind: &str) -> Option<&StageTemplate> {
        self.templates.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.templates.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
