pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use config::{ConfigLoader, ConfigValidator, PipewrightConfig, ResolvedConfig};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter};
pub use pipeline::{compile, CompileError, PipelineAssembler, PipelineDocument, WorkflowDocument};
pub use types::*;
