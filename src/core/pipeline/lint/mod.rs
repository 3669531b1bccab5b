use crate::core::pipeline::schema::{ChannelRef, PipelineDocument};
use crate::core::pipeline::template::TemplateCatalog;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub mod rules;
pub use rules::*;

/// Diagnostic severity levels emitted by pipeline lint rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
    Info,
}

impl LintSeverity {
    fn rank(&self) -> u8 {
        match self {
            LintSeverity::Error => 3,
            LintSeverity::Warning => 2,
            LintSeverity::Info => 1,
        }
    }
}

impl fmt::Display for LintSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintSeverity::Error => write!(f, "Error"),
            LintSeverity::Warning => write!(f, "Warning"),
            LintSeverity::Info => write!(f, "Info"),
        }
    }
}

/// Individual lint result emitted by a rule.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub code: String,
    pub severity: LintSeverity,
    pub message: String,
    pub location: Option<String>,
    pub suggestion: Option<String>,
}

impl LintResult {
    pub fn new(
        code: impl Into<String>,
        severity: LintSeverity,
        message: impl Into<String>,
        location: Option<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            location,
            suggestion,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == LintSeverity::Error
    }
}

/// Pipeline plus what the catalog implies about it, shared by all rules.
pub struct LintContext<'a> {
    pub pipeline: &'a PipelineDocument,
    pub catalog: &'a TemplateCatalog,
    /// Output roles per stage id: declared, or the template's when none are declared.
    pub outputs: BTreeMap<&'a str, Vec<String>>,
    /// Declared external inputs plus those implied by template fallbacks.
    pub externals: BTreeSet<String>,
    /// Every channel reference a stage reads, explicit or through a fallback.
    pub reads: Vec<(&'a str, String, ChannelRef)>,
}

impl<'a> LintContext<'a> {
    pub fn new(pipeline: &'a PipelineDocument, catalog: &'a TemplateCatalog) -> Self {
        let mut outputs = BTreeMap::new();
        let mut externals: BTreeSet<String> =
            pipeline.inputs.iter().map(|input| input.name.clone()).collect();
        let mut reads = Vec::new();

        for stage in &pipeline.stages {
            let template = catalog.lookup(&stage.kind);
            let roles = match (stage.outputs.is_empty(), template) {
                (true, Some(template)) => template.outputs.iter().map(|r| r.name.clone()).collect(),
                _ => stage.outputs.clone(),
            };
            outputs.entry(stage.id.as_str()).or_insert(roles);

            for binding in &stage.inputs {
                for source in &binding.from {
                    reads.push((stage.id.as_str(), binding.role.clone(), source.clone()));
                }
            }
            if let Some(template) = template {
                for role in &template.inputs {
                    if stage.input(&role.name).is_some() {
                        continue;
                    }
                    if let Some(fallback) = &role.fallback {
                        externals.insert(fallback.clone());
                        reads.push((
                            stage.id.as_str(),
                            role.name.clone(),
                            ChannelRef::external(fallback),
                        ));
                    }
                }
            }
        }

        Self {
            pipeline,
            catalog,
            outputs,
            externals,
            reads,
        }
    }

    pub fn produces(&self, reference: &ChannelRef) -> bool {
        match reference {
            ChannelRef::Stage { stage, role } => self
                .outputs
                .get(stage.as_str())
                .is_some_and(|roles| roles.contains(role)),
            ChannelRef::External { name } => self.externals.contains(name),
        }
    }
}

/// Trait implemented by pipeline lint rules.
pub trait PipelineLintRule {
    fn validate(&self, ctx: &LintContext<'_>) -> Vec<LintResult>;
}

/// Registry that runs all built-in pipeline lint rules.
pub struct LintRegistry {
    catalog: TemplateCatalog,
    rules: Vec<Box<dyn PipelineLintRule>>,
}

impl LintRegistry {
    /// Registry over the built-in template catalog.
    pub fn new() -> Self {
        Self::with_catalog(TemplateCatalog::builtin())
    }

    pub fn with_catalog(catalog: TemplateCatalog) -> Self {
        Self {
            catalog,
            rules: built_in_rules(),
        }
    }

    /// Run all registered lint rules against the pipeline.
    /// The results are already sorted by `(severity desc, code asc, location asc)`.
    pub fn run(&self, pipeline: &PipelineDocument) -> Vec<LintResult> {
        let ctx = LintContext::new(pipeline, &self.catalog);
        let mut results = Vec::new();
        for rule in &self.rules {
            results.extend(rule.validate(&ctx));
        }
        results.sort_by(|a, b| {
            let severity_cmp = b.severity.rank().cmp(&a.severity.rank());
            severity_cmp
                .then(a.code.cmp(&b.code))
                .then(a.location.cmp(&b.location))
        });
        results
    }
}

impl Default for LintRegistry {
    fn default() -> Self {
        Self::new()
    }
}
