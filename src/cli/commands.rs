use crate::{
    cli::args::{BuildArgs, CheckArgs, GraphArgs, ListArgs},
    core::{
        config::{loader::CONFIG_FILE_NAME, ConfigLoader, ResolvedConfig},
        pipeline::{
            dot::pipeline_to_dot,
            lint::{LintRegistry, LintResult, LintSeverity},
            recipe,
            template::StageTemplate,
            PipelineAssembler, PipelineDocument,
        },
        types::OutputFormat,
        AppError, ErrorCategory,
    },
    Result,
};
use serde::Serialize;
use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

const STDOUT_MARKER: &str = "-";
const WORKFLOW_EXTENSION: &str = "nf";
const DEFAULT_PIPELINE_NAME: &str = "pipewright";

/// Compile a pipeline description and write the workflow document.
pub fn build(args: BuildArgs, config_path: Option<&Path>) -> Result<()> {
    let resolved = load_config(config_path)?;
    let mut pipeline = match (&args.recipe, &args.pipeline) {
        (Some(name), _) => recipe::find(name)?.document()?,
        (None, Some(path)) => PipelineDocument::load_from_file(path)?,
        (None, None) => {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "a pipeline description or --recipe is required".to_string(),
            )
            .into())
        }
    };
    pipeline.name = pipeline_name(
        args.name.as_deref(),
        &pipeline.name,
        &resolved.config.project.name,
    );

    let document = PipelineAssembler::new(&resolved.catalog)
        .with_auto_dependency(args.auto_deps)
        .compile(&pipeline, &resolved.hooks)
        .map_err(AppError::from)?;
    tracing::info!(
        pipeline = %document.name,
        stages = document.stages.len(),
        digest = %document.digest(),
        "workflow document built"
    );

    if args.output.as_os_str() == STDOUT_MARKER {
        let mut stdout = io::stdout().lock();
        stdout.write_all(document.text().as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    let path = output_path(&args.output);
    ensure_parent_exists(&path)?;
    fs::write(&path, document.text()).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to write {}: {}", path.display(), err),
        )
    })?;
    println!("Wrote {} ({} stages)", path.display(), document.stages.len());
    Ok(())
}

#[derive(Debug, Serialize)]
struct CheckReport {
    pipeline: String,
    results: Vec<LintResult>,
    compiled: bool,
    digest: Option<String>,
}

/// Lint a pipeline, then try compiling it when lint found no errors.
pub fn check(args: CheckArgs, config_path: Option<&Path>) -> Result<()> {
    let resolved = load_config(config_path)?;
    let text = fs::read_to_string(&args.pipeline).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to read {}: {}", args.pipeline.display(), err),
        )
    })?;
    let pipeline = PipelineDocument::parse_str(&text)?;

    let mut results = LintRegistry::with_catalog(resolved.catalog.clone()).run(&pipeline);
    let mut digest = None;
    if !results.iter().any(LintResult::is_error) {
        match PipelineAssembler::new(&resolved.catalog).compile(&pipeline, &resolved.hooks) {
            Ok(document) => digest = Some(document.digest()),
            Err(err) => results.push(LintResult::new(
                err.code(),
                LintSeverity::Error,
                err.to_string(),
                err.stage_ids().first().cloned(),
                None,
            )),
        }
    }

    let report = CheckReport {
        pipeline: args.pipeline.display().to_string(),
        compiled: digest.is_some(),
        digest,
        results,
    };
    match args.format {
        OutputFormat::Text => print_check_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    let errors = report.results.iter().filter(|r| r.is_error()).count();
    if errors > 0 {
        return Err(AppError::new(
            ErrorCategory::ValidationError,
            format!("{} error(s) found in {}", errors, report.pipeline),
        )
        .with_code("PW-CHECK")
        .into());
    }
    Ok(())
}

fn print_check_text(report: &CheckReport) {
    for result in &report.results {
        match &result.location {
            Some(location) => println!(
                "{} {} [{}]: {}",
                result.severity, result.code, location, result.message
            ),
            None => println!("{} {}: {}", result.severity, result.code, result.message),
        }
        if let Some(suggestion) = &result.suggestion {
            println!("  hint: {}", suggestion);
        }
    }

    let count = |severity: LintSeverity| {
        report
            .results
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    };
    println!(
        "{}: {} error(s), {} warning(s), {} info",
        report.pipeline,
        count(LintSeverity::Error),
        count(LintSeverity::Warning),
        count(LintSeverity::Info)
    );
    if let Some(digest) = &report.digest {
        println!("compiled ok, digest {}", digest);
    }
}

/// Print the stage kinds in the catalog, or the prebuilt pipelines.
pub fn list(args: ListArgs, config_path: Option<&Path>) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if args.recipes {
        for recipe in recipe::recipes() {
            writeln!(stdout, "{:<28} {}", recipe.name, recipe.description)?;
        }
        return Ok(());
    }

    let resolved = load_config(config_path)?;
    for template in resolved.catalog.iter() {
        if args.detailed {
            write_template_details(&mut stdout, template)?;
        } else {
            writeln!(stdout, "{:<28} {}", template.kind, template.description)?;
        }
    }
    Ok(())
}

fn write_template_details(out: &mut impl Write, template: &StageTemplate) -> io::Result<()> {
    writeln!(out, "{}", template.kind)?;
    if !template.description.is_empty() {
        writeln!(out, "  {}", template.description)?;
    }
    writeln!(out, "  label: {}", template.label_for("<id>"))?;

    writeln!(out, "  inputs:")?;
    for role in &template.inputs {
        let mut line = format!("    {}", role.name);
        if let Some(fallback) = &role.fallback {
            line.push_str(&format!(" (default @{})", fallback));
        } else if !role.required {
            line.push_str(" (optional)");
        }
        writeln!(out, "{}", line)?;
    }

    writeln!(out, "  outputs:")?;
    for role in &template.outputs {
        writeln!(out, "    {}", role.name)?;
    }
    if !template.requires.is_empty() {
        writeln!(out, "  requires: {}", template.requires.join(", "))?;
    }

    if !template.options.is_empty() {
        writeln!(out, "  options:")?;
        for option in &template.options {
            match &option.default {
                Some(default) => writeln!(
                    out,
                    "    {}: {} = {}",
                    option.name, option.kind, default
                )?,
                None => writeln!(out, "    {}: {} (required)", option.name, option.kind)?,
            }
        }
    }
    writeln!(out)
}

/// Render the stage graph as DOT.
pub fn graph(args: GraphArgs, config_path: Option<&Path>) -> Result<()> {
    let resolved = load_config(config_path)?;
    let pipeline = PipelineDocument::load_from_file(&args.pipeline)?;
    let dot = pipeline_to_dot(&pipeline, &resolved.catalog);

    match args.output {
        Some(path) => {
            ensure_parent_exists(&path)?;
            fs::write(&path, dot)?;
            tracing::info!(path = %path.display(), "graph written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(dot.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Load `--config` when given, otherwise `pipewright.toml` in the current directory.
fn load_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, base_dir) = match config_path {
        Some(path) => {
            let config = ConfigLoader::load_explicit(path)?;
            let base_dir = path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (config, base_dir)
        }
        None => {
            let cwd = env::current_dir()?;
            tracing::debug!(path = %cwd.join(CONFIG_FILE_NAME).display(), "looking for config");
            (ConfigLoader::load_from_workspace(&cwd)?, cwd)
        }
    };
    Ok(ConfigLoader::resolve(config, &base_dir)?)
}

/// `-n` wins, then a name set in the description, then the configured project name.
fn pipeline_name(flag: Option<&str>, document: &str, configured: &str) -> String {
    match flag {
        Some(name) => name.to_string(),
        None if document != DEFAULT_PIPELINE_NAME => document.to_string(),
        None => configured.to_string(),
    }
}

fn output_path(output: &Path) -> PathBuf {
    match output.extension() {
        Some(ext) if ext == WORKFLOW_EXTENSION => output.to_path_buf(),
        _ => {
            let mut name = output.as_os_str().to_os_string();
            name.push(".");
            name.push(WORKFLOW_EXTENSION);
            PathBuf::from(name)
        }
    }
}

fn ensure_parent_exists(path: &Path) -> std::result::Result<(), AppError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(AppError::new(
            ErrorCategory::IoError,
            format!("output directory {} does not exist", parent.display()),
        )
        .with_suggestion("create the directory first")),
        _ => Ok(()),
    }
}
