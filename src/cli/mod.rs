pub mod args;
pub mod commands;

pub use args::{BuildArgs, CheckArgs, GraphArgs, ListArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
PIPELINE COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "pipewright")]
#[command(version = crate::VERSION)]
#[command(about = "Assemble stage templates into Nextflow assembly pipelines")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: check a pipeline description, preview its graph, then build the workflow document."
)]
pub struct Args {
    /// Log at debug level (RUST_LOG still wins)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to config file (default: ./pipewright.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Compile a pipeline description into a workflow document",
        long_about = "Build validates the pipeline, orders its stages, renders every stage template and writes the resulting Nextflow document.",
        after_help = "Examples:\n    pipewright build pipeline.yaml -o assembly.nf\n    pipewright build -r innuca --auto-deps -o innuca.nf"
    )]
    Build(BuildArgs),
    #[command(
        about = "Lint a pipeline description and try compiling it",
        long_about = "Check reports every lint finding sorted by severity, then runs a trial compilation. Exits non-zero when any error is found.",
        after_help = "Example:\n    pipewright check pipeline.yaml --format json"
    )]
    Check(CheckArgs),
    #[command(
        about = "List available stage kinds",
        long_about = "List prints every stage kind in the template catalog, including templates loaded from the configured directory.",
        after_help = "Examples:\n    pipewright list --detailed\n    pipewright list --recipes"
    )]
    List(ListArgs),
    #[command(
        about = "Render the stage graph as Graphviz DOT",
        long_about = "Graph draws stages, external inputs and the roles connecting them.",
        after_help = "Example:\n    pipewright graph pipeline.yaml -o pipeline.dot"
    )]
    Graph(GraphArgs),
}

impl Command {
    /// True when the command writes its payload to stdout.
    pub fn writes_stdout(&self) -> bool {
        match self {
            Command::Build(args) => args.output.as_os_str() == "-",
            Command::Check(_) | Command::List(_) => true,
            Command::Graph(args) => args.output.is_none(),
        }
    }
}

pub fn run(args: Args) -> crate::Result<()> {
    let config = args.config;
    match args.command {
        Command::Build(build_args) => commands::build(build_args, config.as_deref()),
        Command::Check(check_args) => commands::check(check_args, config.as_deref()),
        Command::List(list_args) => commands::list(list_args, config.as_deref()),
        Command::Graph(graph_args) => commands::graph(graph_args, config.as_deref()),
    }
}
