#![allow(clippy::result_large_err)]

use super::{ConfigValidator, PipewrightConfig};
use crate::core::error::AppError;
use crate::core::pipeline::hooks::{HookConfig, StageHooks, DEFAULT_NOTIFY_SNIPPET};
use crate::core::pipeline::template::TemplateCatalog;
use crate::core::types::ErrorCategory;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "pipewright.toml";
const HOOK_FILE_EXTENSION: &str = "post";

/// Configuration with hooks and templates resolved against the filesystem.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipewrightConfig,
    pub hooks: HookConfig,
    pub catalog: TemplateCatalog,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from workspace root (workspace/pipewright.toml)
    /// Environment variables override config file values
    pub fn load_from_workspace(workspace_path: &Path) -> Result<PipewrightConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load an explicitly named config file, which must exist.
    pub fn load_explicit(path: &Path) -> Result<PipewrightConfig, AppError> {
        let mut config = Self::load_from_file(path)?.ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("config file {} does not exist", path.display()),
            )
            .with_code("PW-CFG-001")
        })?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<PipewrightConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: PipewrightConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("PW-CFG-002")
        })?;

        Ok(Some(config))
    }

    fn apply_env_overrides(config: &mut PipewrightConfig) {
        if let Ok(name) = env::var("PIPEWRIGHT_PIPELINE_NAME") {
            if !name.trim().is_empty() {
                config.project.name = name;
            }
        }

        if let Ok(dir) = env::var("PIPEWRIGHT_HOOKS_DIR") {
            config.hooks.directory = Some(PathBuf::from(dir));
        }

        if let Ok(dir) = env::var("PIPEWRIGHT_TEMPLATES_DIR") {
            config.templates.directory = Some(PathBuf::from(dir));
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "PIPEWRIGHT_PIPELINE_NAME - Override the default pipeline name (default: pipewright)",
            "PIPEWRIGHT_HOOKS_DIR - Directory probed for <kind>.post notification snippets",
            "PIPEWRIGHT_TEMPLATES_DIR - Directory of extra *.yaml stage templates",
        ]
    }

    /// Validate configuration values that do not need the template catalog
    pub fn validate_config(config: &PipewrightConfig) -> Result<(), AppError> {
        if config.project.name.trim().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "Project name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load templates and hooks once, relative to `base_dir`.
    pub fn resolve(config: PipewrightConfig, base_dir: &Path) -> Result<ResolvedConfig, AppError> {
        Self::validate_config(&config)?;

        let mut catalog = TemplateCatalog::builtin();
        if let Some(dir) = &config.templates.directory {
            let dir = absolutize(base_dir, dir);
            let loaded = load_template_dir(&mut catalog, &dir)?;
            tracing::info!(directory = %dir.display(), templates = loaded, "loaded stage templates");
        }

        ConfigValidator::validate(&config, &catalog)?;

        let mut hooks = HookConfig::disabled();
        if let Some(dir) = &config.hooks.directory {
            let dir = absolutize(base_dir, dir);
            probe_hook_dir(&mut hooks, &catalog, &dir)?;
        }
        for (kind, entry) in &config.hooks.kinds {
            let notify = entry.notify.then(|| {
                entry
                    .snippet
                    .clone()
                    .unwrap_or_else(|| DEFAULT_NOTIFY_SNIPPET.to_string())
            });
            hooks.set(
                kind.clone(),
                StageHooks {
                    notify,
                    report: entry.report,
                },
            );
        }

        Ok(ResolvedConfig {
            config,
            hooks,
            catalog,
        })
    }
}

fn absolutize(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Name of the hook file probed for `kind`, e.g. `assembly_spades.post`.
pub fn hook_file_name(kind: &str) -> String {
    format!("{}.{}", kind.replace(':', "_"), HOOK_FILE_EXTENSION)
}

fn probe_hook_dir(
    hooks: &mut HookConfig,
    catalog: &TemplateCatalog,
    dir: &Path,
) -> Result<(), AppError> {
    if !dir.is_dir() {
        tracing::warn!(directory = %dir.display(), "hooks directory does not exist; no hooks probed");
        return Ok(());
    }
    for kind in catalog.kinds() {
        let path = dir.join(hook_file_name(kind));
        if !path.is_file() {
            continue;
        }
        let snippet = fs::read_to_string(&path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read hook file {}: {}", path.display(), e),
            )
        })?;
        let snippet = snippet.trim_end();
        if snippet.is_empty() {
            tracing::warn!(file = %path.display(), "ignoring empty hook file");
            continue;
        }
        tracing::debug!(kind, file = %path.display(), "enabled notification hook");
        hooks.set(
            kind,
            StageHooks {
                notify: Some(snippet.to_string()),
                report: false,
            },
        );
    }
    Ok(())
}

fn load_template_dir(catalog: &mut TemplateCatalog, dir: &Path) -> Result<usize, AppError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::new(
            ErrorCategory::IoError,
            format!("Failed to read template directory {}: {}", dir.display(), e),
        )
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    for path in &paths {
        let text = fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read template {}: {}", path.display(), e),
            )
        })?;
        let kind = catalog
            .insert_yaml(&text)
            .map_err(|err| err.with_context(path.display().to_string()))?;
        tracing::debug!(kind = %kind, file = %path.display(), "registered stage template");
    }
    Ok(paths.len())
}
