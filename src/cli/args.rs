use crate::core::types::OutputFormat;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Pipeline description (YAML)
    #[arg(value_name = "PIPELINE", required_unless_present = "recipe")]
    pub pipeline: Option<PathBuf>,

    /// Build a named prebuilt pipeline instead of a description file
    #[arg(short = 'r', long, value_name = "NAME", conflicts_with = "pipeline")]
    pub recipe: Option<String>,

    /// Insert upstream stages that a stage kind requires when none feeds it
    #[arg(long)]
    pub auto_deps: bool,

    /// Output file; `.nf` is appended when missing, `-` writes to stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: PathBuf,

    /// Pipeline name written into the document header
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Pipeline description (YAML)
    #[arg(value_name = "PIPELINE")]
    pub pipeline: PathBuf,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show roles, options and descriptions for each stage kind
    #[arg(short = 'd', long)]
    pub detailed: bool,

    /// List prebuilt pipelines instead of stage kinds
    #[arg(long, conflicts_with = "detailed")]
    pub recipes: bool,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Pipeline description (YAML)
    #[arg(value_name = "PIPELINE")]
    pub pipeline: PathBuf,

    /// Write DOT to this file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
