pub mod config;
pub mod context;
pub mod layers;

pub use context::{detect_context, ExecutionContext};
pub use layers::console::ConsoleOutput;

use crate::cli::Args;
use crate::core::config::loader::CONFIG_FILE_NAME;
use crate::logging::config::LoggingConfig;
use crate::logging::layers::{console, file};
use crate::Result;
use anyhow::{anyhow, Context};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Keeps the non-blocking file writer alive for the duration of the command.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    console_output: ConsoleOutput,
    log_file_path: PathBuf,
}

impl LoggingGuard {
    pub fn console_output(&self) -> ConsoleOutput {
        self.console_output
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

/// Initialize logging for the parsed command line.
///
/// Filter precedence is `RUST_LOG`, then `--debug`, then `logging.default_level`
/// from the config file. Errors when called twice in one process.
pub fn init(args: &Args) -> Result<LoggingGuard> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let context = detect_context(&args.command);
    let (config_file, project_root) = locate_config(args.config.as_deref());
    let config = LoggingConfig::load(config_file.as_deref(), args.debug)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .context("failed to configure tracing level")?;
    let log_file_path = file::log_file_path(&config, project_root.as_deref())?;

    type FileSubscriber = file::FileLayerStack<Registry>;
    let (file_layer, file_guard) = file::file_layer::<Registry>(&log_file_path, config.enable_file)?;
    let console_output = console::select_console_output(context, config.console_output);
    let console_layer = console::console_layer::<FileSubscriber>(console_output);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(env_filter)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
        console_output,
        log_file_path,
    })
}

/// Config file and the directory it anchors; falls back to the current directory.
fn locate_config(explicit: Option<&Path>) -> (Option<PathBuf>, Option<PathBuf>) {
    match explicit {
        Some(path) => {
            let root = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .or_else(|| env::current_dir().ok());
            (Some(path.to_path_buf()), root)
        }
        None => {
            let cwd = env::current_dir().ok();
            (cwd.as_ref().map(|dir| dir.join(CONFIG_FILE_NAME)), cwd)
        }
    }
}
