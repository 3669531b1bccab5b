use crate::logging::config::LoggingConfig;
use crate::Result;
use anyhow::{anyhow, Context};
use dirs_next::home_dir;
use std::fs::{create_dir_all, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

const LOG_FILE_NAME: &str = "pipewright.log";
const STATE_DIR: &str = ".pipewright";

/// Layer type produced by the file sink builder.
pub type FileFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

/// Layer stack that already wraps the provided subscriber.
pub type FileLayerStack<S> = tracing_subscriber::layer::Layered<FileFmtLayer<S>, S>;

/// Location of the log file: `<project>/.pipewright/logs/pipewright.log` unless
/// `logging.log_dir` says otherwise.
pub fn log_file_path(config: &LoggingConfig, project_root: Option<&Path>) -> Result<PathBuf> {
    let directory = match (&config.log_dir, project_root) {
        (Some(custom), _) if custom.is_absolute() => custom.clone(),
        (Some(custom), Some(root)) => {
            let candidate = root.join(custom);
            ensure_within(&candidate, root)?;
            candidate
        }
        (Some(custom), None) => home_base()?.join(custom),
        (None, Some(root)) => root.join(STATE_DIR).join("logs"),
        (None, None) => home_base()?.join(STATE_DIR).join("logs"),
    };
    Ok(directory.join(LOG_FILE_NAME))
}

/// File sink; a disabled sink writes to `io::sink` so the layer stack keeps one shape.
pub fn file_layer<S>(
    log_file: &Path,
    enabled: bool,
) -> Result<(FileFmtLayer<S>, Option<WorkerGuard>)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if !enabled {
        return Ok((make_layer(BoxMakeWriter::new(io::sink)), None));
    }

    let directory = log_file
        .parent()
        .ok_or_else(|| anyhow!("log file path {} has no parent directory", log_file.display()))?;
    create_dir_all(directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let writer = BoxMakeWriter::new(move || non_blocking.clone());
    Ok((make_layer(writer), Some(guard)))
}

fn make_layer<S>(writer: BoxMakeWriter) -> FileFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
}

fn home_base() -> Result<PathBuf> {
    home_dir().ok_or_else(|| anyhow!("$HOME directory unavailable"))
}

/// Relative `log_dir` values must not escape the project directory.
fn ensure_within(candidate: &Path, root: &Path) -> Result<()> {
    let escapes = candidate
        .strip_prefix(root)
        .map(|rest| {
            rest.components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        })
        .unwrap_or(true);
    if escapes {
        return Err(anyhow!(
            "logging.log_dir resolves outside project directory {}",
            root.display()
        ));
    }
    Ok(())
}
