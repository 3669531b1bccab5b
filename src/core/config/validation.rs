#![allow(clippy::result_large_err)]

use super::PipewrightConfig;
use crate::core::error::AppError;
use crate::core::pipeline::template::TemplateCatalog;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate hook entries against the stage kinds the catalog knows.
    pub fn validate(config: &PipewrightConfig, catalog: &TemplateCatalog) -> Result<(), AppError> {
        for (kind, entry) in &config.hooks.kinds {
            if !catalog.contains(kind) {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!("hooks.kinds.\"{}\" does not name a known stage kind", kind),
                )
                .with_code("PW-CFG-003")
                .with_suggestion("run `pipewright list` to see available stage kinds"));
            }

            if let Some(snippet) = &entry.snippet {
                if snippet.trim().is_empty() {
                    return Err(AppError::new(
                        ErrorCategory::ValidationError,
                        format!("hooks.kinds.\"{}\".snippet cannot be empty", kind),
                    )
                    .with_code("PW-CFG-004"));
                }
                if !entry.notify {
                    tracing::warn!(kind = %kind, "hook snippet is set but notify is disabled");
                }
            }
        }

        Ok(())
    }
}
