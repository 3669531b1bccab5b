#![allow(clippy::result_large_err)] // Loading APIs return AppError to keep file/line diagnostics structured.

use crate::core::error::AppError;
use crate::core::pipeline::error::CompileError;
use crate::core::types::ErrorCategory;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

const DEFAULT_PIPELINE_NAME: &str = "pipewright";

fn default_pipeline_name() -> String {
    DEFAULT_PIPELINE_NAME.to_string()
}

fn default_cpus() -> u32 {
    1
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier regex"))
}

/// Returns true when `value` can be spliced into generated channel and process names.
pub fn is_identifier(value: &str) -> bool {
    identifier_pattern().is_match(value)
}

/// Reference to the channel feeding a stage input.
///
/// Written as `stage.role` for an upstream output and `@name` for a
/// pipeline-level external input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelRef {
    Stage { stage: String, role: String },
    External { name: String },
}

impl ChannelRef {
    pub fn stage(stage: impl Into<String>, role: impl Into<String>) -> Self {
        ChannelRef::Stage {
            stage: stage.into(),
            role: role.into(),
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        ChannelRef::External { name: name.into() }
    }

    /// Producing stage id, if the reference points at a stage output.
    pub fn producer(&self) -> Option<&str> {
        match self {
            ChannelRef::Stage { stage, .. } => Some(stage),
            ChannelRef::External { .. } => None,
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Stage { stage, role } => write!(f, "{}.{}", stage, role),
            ChannelRef::External { name } => write!(f, "@{}", name),
        }
    }
}

impl FromStr for ChannelRef {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Some(name) = value.strip_prefix('@') {
            if name.is_empty() {
                return Err("external input reference '@' is missing a name".to_string());
            }
            return Ok(ChannelRef::external(name));
        }
        match value.split_once('.') {
            Some((stage, role)) if !stage.is_empty() && !role.is_empty() => {
                Ok(ChannelRef::stage(stage, role))
            }
            _ => Err(format!(
                "invalid channel reference '{}'; expected 'stage.role' or '@input'",
                value
            )),
        }
    }
}

impl TryFrom<String> for ChannelRef {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelRef> for String {
    fn from(value: ChannelRef) -> Self {
        value.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(ChannelRef),
    Many(Vec<ChannelRef>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<ChannelRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(reference) => vec![reference],
        OneOrMany::Many(references) => references,
    })
}

/// One declared input role and the channel(s) feeding it.
///
/// More than one source makes the role an explicit merge point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    pub role: String,
    #[serde(deserialize_with = "one_or_many")]
    pub from: Vec<ChannelRef>,
}

impl InputBinding {
    pub fn new(role: impl Into<String>, from: ChannelRef) -> Self {
        Self {
            role: role.into(),
            from: vec![from],
        }
    }

    pub fn is_merge(&self) -> bool {
        self.from.len() > 1
    }
}

/// Declared resource constraints, passed through to the rendered stage verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default = "default_cpus")]
    pub cpus: u32,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpus: default_cpus(),
            memory: None,
            time: None,
        }
    }
}

/// One node in the abstract pipeline graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub inputs: Vec<InputBinding>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
    #[serde(default)]
    pub resources: ResourceLimits,
}

impl StageSpec {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            options: BTreeMap::new(),
            resources: ResourceLimits::default(),
        }
    }

    pub fn with_input(mut self, role: impl Into<String>, from: ChannelRef) -> Self {
        self.inputs.push(InputBinding::new(role, from));
        self
    }

    pub fn with_merge_input(mut self, role: impl Into<String>, from: Vec<ChannelRef>) -> Self {
        self.inputs.push(InputBinding {
            role: role.into(),
            from,
        });
        self
    }

    pub fn with_output(mut self, role: impl Into<String>) -> Self {
        self.outputs.push(role.into());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    pub fn with_cpus(mut self, cpus: u32) -> Self {
        self.resources.cpus = cpus;
        self
    }

    pub fn input(&self, role: &str) -> Option<&InputBinding> {
        self.inputs.iter().find(|binding| binding.role == role)
    }
}

/// How an external input channel is created from its parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    #[default]
    FilePairs,
    Files,
    Value,
}

impl InputSource {
    /// Channel factory expression used in the document header.
    pub fn factory(&self, param: &str) -> String {
        match self {
            InputSource::FilePairs => format!("Channel.fromFilePairs(params.{})", param),
            InputSource::Files => format!("Channel.fromPath(params.{})", param),
            InputSource::Value => format!("Channel.value(params.{})", param),
        }
    }
}

/// Pipeline-level external input that stages may read via `@name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInput {
    pub name: String,
    #[serde(default)]
    pub source: InputSource,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

impl PipelineInput {
    /// Input declared on behalf of a template fallback role.
    pub fn implicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: InputSource::FilePairs,
            param: None,
            default: None,
        }
    }

    pub fn param_name(&self) -> &str {
        self.param.as_deref().unwrap_or(&self.name)
    }
}

/// Root of a pipeline description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDocument {
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<PipelineInput>,
    pub stages: Vec<StageSpec>,
}

impl PipelineDocument {
    pub fn from_stages(stages: Vec<StageSpec>) -> Self {
        Self {
            name: default_pipeline_name(),
            inputs: Vec::new(),
            stages,
        }
    }

    pub fn stage(&self, id: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    pub fn external_input(&self, name: &str) -> Option<&PipelineInput> {
        self.inputs.iter().find(|input| input.name == name)
    }

    /// Parse a pipeline description from YAML text without validating it.
    pub fn parse_str(text: &str) -> Result<Self, AppError> {
        serde_yaml::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse pipeline description: {}", err),
            )
            .with_code("PW-PARSE-001")
        })
    }

    /// Load and structurally validate a pipeline description from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
        })?;
        let doc = Self::parse_str(&text).map_err(|err| err.with_context(path.display().to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Structural checks that do not need the template catalog.
    pub fn validate(&self) -> Result<(), CompileError> {
        if self.name.trim().is_empty() || self.name.chars().any(char::is_control) {
            return Err(CompileError::InvalidStage {
                stage: self.name.escape_default().to_string(),
                reason: "pipeline name must be a non-empty single line".to_string(),
            });
        }
        if self.stages.is_empty() {
            return Err(CompileError::InvalidStage {
                stage: self.name.clone(),
                reason: "pipeline must define at least one stage".to_string(),
            });
        }

        let mut input_names = HashSet::new();
        for input in &self.inputs {
            if !is_identifier(&input.name) || !is_identifier(input.param_name()) {
                return Err(CompileError::InvalidStage {
                    stage: format!("@{}", input.name),
                    reason: "external input names and params must be identifiers".to_string(),
                });
            }
            if !input_names.insert(input.name.as_str()) {
                return Err(CompileError::InvalidStage {
                    stage: format!("@{}", input.name),
                    reason: "external input is declared more than once".to_string(),
                });
            }
        }

        for stage in &self.stages {
            stage.validate()?;
        }
        Ok(())
    }
}

impl StageSpec {
    /// Per-stage structural checks: identifiers, role uniqueness and merge sources.
    pub fn validate(&self) -> Result<(), CompileError> {
        let invalid = |reason: String| CompileError::InvalidStage {
            stage: self.id.clone(),
            reason,
        };

        if !is_identifier(&self.id) {
            return Err(invalid(format!(
                "stage id '{}' must match [A-Za-z][A-Za-z0-9_]*",
                self.id
            )));
        }
        if self.kind.trim().is_empty() {
            return Err(invalid("stage kind must not be empty".to_string()));
        }
        if self.resources.cpus == 0 {
            return Err(invalid("resources.cpus must be >= 1".to_string()));
        }

        let mut roles = HashSet::new();
        for binding in &self.inputs {
            if !is_identifier(&binding.role) {
                return Err(invalid(format!(
                    "input role '{}' must be an identifier",
                    binding.role
                )));
            }
            if !roles.insert(binding.role.as_str()) {
                return Err(invalid(format!(
                    "input role '{}' is bound more than once",
                    binding.role
                )));
            }
            if binding.from.is_empty() {
                return Err(invalid(format!(
                    "input role '{}' has no source",
                    binding.role
                )));
            }
            let mut sources = HashSet::new();
            for source in &binding.from {
                if !sources.insert(source) {
                    return Err(invalid(format!(
                        "merge input '{}' lists source '{}' more than once",
                        binding.role, source
                    )));
                }
            }
        }

        for role in &self.outputs {
            if !is_identifier(role) {
                return Err(invalid(format!("output role '{}' must be an identifier", role)));
            }
        }
        Ok(())
    }
}
