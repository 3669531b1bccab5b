//! Per-kind notification and status hooks spliced into rendered stages.

use crate::core::pipeline::template::render::{self, SubstitutionError};
use std::collections::BTreeMap;

/// Notification snippet used when a kind enables notify without its own snippet.
pub const DEFAULT_NOTIFY_SNIPPET: &str =
    r#"afterScript "stage_notify.sh {{ label }} ${params.notifyEndpoint}""#;

/// Prefix of per-stage status channels.
pub const STATUS_PREFIX: &str = "STATUS_";

/// Label of the sink process collecting status channels.
pub const STATUS_REPORT_LABEL: &str = "status_report";

/// Hooks active for one stage kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageHooks {
    /// Notification snippet. `{{ label }}`, `{{ stage_id }}` and `{{ kind }}` are substituted.
    pub notify: Option<String>,
    /// Emit a status channel feeding the status report sink.
    pub report: bool,
}

impl StageHooks {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn notify_default() -> Self {
        Self {
            notify: Some(DEFAULT_NOTIFY_SNIPPET.to_string()),
            report: false,
        }
    }

    pub fn with_report(mut self) -> Self {
        self.report = true;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.notify.is_some() || self.report
    }
}

/// Which hooks are enabled, per stage kind. Kinds without an entry get none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookConfig {
    kinds: BTreeMap<String, StageHooks>,
}

impl HookConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: impl Into<String>, hooks: StageHooks) -> Self {
        self.set(kind, hooks);
        self
    }

    pub fn set(&mut self, kind: impl Into<String>, hooks: StageHooks) {
        self.kinds.insert(kind.into(), hooks);
    }

    pub fn for_kind(&self, kind: &str) -> Option<&StageHooks> {
        self.kinds.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = (&str, &StageHooks)> {
        self.kinds.iter().map(|(kind, hooks)| (kind.as_str(), hooks))
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.values().all(|hooks| !hooks.is_enabled())
    }
}

/// Text to splice at a stage's hook insertion points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookInjection {
    pub notify: String,
    pub status: String,
    pub report_channels: Vec<String>,
}

/// Resolves hook insertion text for a stage. Empty text removes the insertion line.
pub struct HookInjector<'a> {
    config: &'a HookConfig,
}

impl<'a> HookInjector<'a> {
    pub fn new(config: &'a HookConfig) -> Self {
        Self { config }
    }

    pub fn inject(
        &self,
        kind: &str,
        label: &str,
        stage_id: &str,
    ) -> Result<HookInjection, SubstitutionError> {
        let Some(hooks) = self.config.for_kind(kind) else {
            return Ok(HookInjection::default());
        };

        let mut injection = HookInjection::default();
        if let Some(snippet) = &hooks.notify {
            let values: BTreeMap<String, String> = [
                ("label", label),
                ("stage_id", stage_id),
                ("kind", kind),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
            injection.notify = render::substitute(snippet, &values).map_err(|err| {
                SubstitutionError {
                    placeholder: format!("hook:notify/{}", err.placeholder),
                    reason: err.reason,
                }
            })?;
        }
        if hooks.report {
            let channel = status_channel_name(label);
            injection.status = status_output_line(label, &channel);
            injection.report_channels.push(channel);
        }
        tracing::trace!(kind, label, "resolved stage hooks");
        Ok(injection)
    }
}

pub fn status_channel_name(label: &str) -> String {
    format!("{}{}", STATUS_PREFIX, label)
}

fn status_output_line(label: &str, channel: &str) -> String {
    format!(
        "set sample_id, val(\"{}\"), file(\".status\") into {}",
        label, channel
    )
}

/// Sink process mixing every status channel, or `None` when there are none.
pub fn status_report_block(channels: &[String]) -> Option<String> {
    let (first, rest) = channels.split_first()?;
    let source = if rest.is_empty() {
        first.clone()
    } else {
        format!("{}.mix({})", first, rest.join(", "))
    };
    Some(format!(
        r#"process {label} {{

    publishDir 'reports/status/', mode: 'copy'

    input:
    set sample_id, stage, file(status) from {source}

    output:
    file('pipeline_status.csv')

    script:
    template "compile_status.py"
}}"#,
        label = STATUS_REPORT_LABEL,
        source = source
    ))
}
