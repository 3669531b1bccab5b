use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration loaded from pipewright.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipewrightConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    /// Per-kind hook configuration and the hooks directory probed for snippets
    #[serde(default)]
    pub hooks: HooksConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,
}

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Pipeline name used when the description does not set one
    #[serde(default = "default_pipeline_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HooksConfig {
    /// Directory probed for `<kind>.post` notification snippets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Explicit entries; these win over probed files
    #[serde(default)]
    pub kinds: BTreeMap<String, KindHookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct KindHookConfig {
    /// Enable the notification hook
    #[serde(default)]
    pub notify: bool,

    /// Custom notification snippet; the default snippet is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    /// Emit a status channel for the status report sink
    #[serde(default)]
    pub report: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TemplatesConfig {
    /// Directory of extra `*.yaml` stage templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_pipeline_name() -> String {
    "pipewright".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            name: default_pipeline_name(),
        }
    }
}

pub mod loader;
pub mod validation;

pub use loader::{ConfigLoader, ResolvedConfig};
pub use validation::ConfigValidator;
