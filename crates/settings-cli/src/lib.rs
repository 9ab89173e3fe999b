use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use settings_config::{Config, LoadOptions};
use settings_core::SettingsEngine;
use settings_format::{Renderer, ReportFormat, ValidationReport};
use settings_import::MergePlanResult;
use settings_io::{parse_candidate, DeclaredFormat, FileStore, SettingsStore};
use settings_model::{Document, FieldPath, MergeMode};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SETTINGS_ENGINE_LOG";

/// Install the stderr subscriber. `SETTINGS_ENGINE_LOG` takes `EnvFilter`
/// directives and defaults to `warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut options = LoadOptions::default();
    if let Some(path) = cli.config {
        options = options.with_override_path(path);
    }
    let config = Config::load(options)?;
    let engine = SettingsEngine::bootstrap(config)?;

    match cli.command {
        Command::Validate(args) => handle_validate(&engine, args),
        Command::CheckField(args) => handle_check_field(&engine, args),
        Command::Diff(args) => handle_diff(&engine, args),
        Command::Import(args) => handle_import(&engine, args),
    }
}

fn handle_validate(engine: &SettingsEngine, args: ValidateArgs) -> Result<i32> {
    let ValidateArgs {
        files,
        format,
        input_format,
    } = args;

    let reports = files
        .par_iter()
        .map(|path| {
            let document = read_document(path, input_format)?;
            let issues = engine.validate_document(&document);
            Ok(ValidationReport::new(path.display().to_string(), issues))
        })
        .collect::<Result<Vec<_>>>()?;

    let blocking = reports.iter().any(ValidationReport::is_blocking);
    emit(&renderer(format).validation(&reports))?;
    Ok(exit_code(blocking))
}

fn handle_check_field(engine: &SettingsEngine, args: CheckFieldArgs) -> Result<i32> {
    let CheckFieldArgs {
        file,
        field,
        format,
        input_format,
    } = args;

    let path = FieldPath::parse(&field)?;
    let (Some(category), Some(name)) = (path.category_name(), path.field_name()) else {
        bail!("field path '{field}' must name a category and a field");
    };

    let document = read_document(&file, input_format)?;
    let issues = engine.validate_field(&document, category, name);
    let report = ValidationReport::new(file.display().to_string(), issues);
    let blocking = report.is_blocking();
    emit(&renderer(format).validation(&[report]))?;
    Ok(exit_code(blocking))
}

fn handle_diff(engine: &SettingsEngine, args: DiffArgs) -> Result<i32> {
    let DiffArgs {
        live,
        candidate,
        format,
    } = args;

    let live_document = load_live(&live)?;
    let candidate_document = read_document(&candidate, None)?;
    let records = engine.analyze(&live_document, &candidate_document);
    emit(&renderer(format).changes(&candidate.display().to_string(), &records))?;
    Ok(0)
}

fn handle_import(engine: &SettingsEngine, args: ImportArgs) -> Result<i32> {
    let ImportArgs {
        live,
        candidate,
        select,
        all,
        mode,
        dry_run,
        write,
        format,
    } = args;

    let live_document = load_live(&live)?;
    let candidate_document = read_document(&candidate, None)?;

    let selection: Vec<String> = if all {
        engine
            .analyze(&live_document, &candidate_document)
            .into_iter()
            .filter(|record| !record.is_noop() || record.has_structural_errors)
            .map(|record| record.category_id)
            .collect()
    } else {
        select
    };
    let renderer = renderer(format);
    if all && selection.is_empty() {
        emit(&renderer.up_to_date(&candidate.display().to_string()))?;
        return Ok(0);
    }

    let mode = mode.map(MergeMode::from).unwrap_or_else(|| engine.default_mode());
    let result = engine.build_plan(&live_document, &candidate_document, selection.as_slice(), mode)?;
    let previews = match &result {
        MergePlanResult::Ready { plan, .. } => engine.previews(&live_document, plan),
        MergePlanResult::Rejected { .. } => Vec::new(),
    };
    emit(&renderer.plan(&result, &previews))?;

    let plan = match result {
        MergePlanResult::Ready { plan, .. } => plan,
        MergePlanResult::Rejected { .. } => return Ok(1),
    };

    // Explicit --dry-run maps to the default.
    let _ = dry_run;
    if !write {
        return Ok(0);
    }

    engine
        .commit(&FileStore::new(&live), &live_document, plan)
        .with_context(|| format!("failed to write {}", live.display()))?;
    debug!(path = %live.display(), "import committed");
    if renderer.format() == ReportFormat::Plain {
        emit(&format!("Wrote {}", live.display()))?;
    }
    Ok(0)
}

fn read_document(path: &Path, format: Option<InputFormatValue>) -> Result<Document> {
    let format = format
        .map(DeclaredFormat::from)
        .or_else(|| DeclaredFormat::from_path(path))
        .unwrap_or_default();
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let document = parse_candidate(&bytes, format)
        .and_then(|raw| raw.into_document())
        .with_context(|| format!("failed to parse {} as {format}", path.display()))?;
    Ok(document)
}

fn load_live(path: &Path) -> Result<Document> {
    FileStore::new(path)
        .load()
        .with_context(|| format!("failed to load live settings {}", path.display()))
}

fn renderer(format: Option<FormatValue>) -> Renderer {
    Renderer::new(match format.unwrap_or(FormatValue::Plain) {
        FormatValue::Plain => ReportFormat::Plain,
        FormatValue::Json => ReportFormat::Json,
    })
}

fn exit_code(blocking: bool) -> i32 {
    i32::from(blocking)
}

fn emit(content: &str) -> Result<()> {
    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Validate settings documents and import them selectively",
    propagate_version = true
)]
struct Cli {
    /// Use this config file on top of the discovered ones
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate whole settings documents
    Validate(ValidateArgs),
    /// Validate a single field in place
    CheckField(CheckFieldArgs),
    /// Count per-category changes between live settings and a candidate
    Diff(DiffArgs),
    /// Plan (and optionally write) a selective import
    Import(ImportArgs),
}

#[derive(Args)]
struct ValidateArgs {
    /// Documents to validate
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
    /// Select output format
    #[arg(long, value_enum)]
    format: Option<FormatValue>,
    /// Parse inputs as this format instead of inferring from the extension
    #[arg(long = "input-format", value_enum)]
    input_format: Option<InputFormatValue>,
}

#[derive(Args)]
struct CheckFieldArgs {
    /// Document holding the field
    #[arg(value_name = "FILE")]
    file: PathBuf,
    /// Field path, e.g. `editor.tabSize`
    #[arg(value_name = "FIELD")]
    field: String,
    /// Select output format
    #[arg(long, value_enum)]
    format: Option<FormatValue>,
    /// Parse the input as this format instead of inferring from the extension
    #[arg(long = "input-format", value_enum)]
    input_format: Option<InputFormatValue>,
}

#[derive(Args)]
struct DiffArgs {
    /// Current settings document
    #[arg(value_name = "LIVE")]
    live: PathBuf,
    /// Document to import
    #[arg(value_name = "CANDIDATE")]
    candidate: PathBuf,
    /// Select output format
    #[arg(long, value_enum)]
    format: Option<FormatValue>,
}

#[derive(Args)]
struct ImportArgs {
    /// Current settings document
    #[arg(value_name = "LIVE")]
    live: PathBuf,
    /// Document to import
    #[arg(value_name = "CANDIDATE")]
    candidate: PathBuf,
    /// Category to import (repeatable)
    #[arg(
        long = "select",
        value_name = "CATEGORY",
        action = ArgAction::Append,
        required_unless_present = "all",
        conflicts_with = "all"
    )]
    select: Vec<String>,
    /// Import every changed category
    #[arg(long)]
    all: bool,
    /// Merge fields into live categories or replace them wholesale
    #[arg(long, value_enum)]
    mode: Option<ModeValue>,
    /// Print the plan without writing (default)
    #[arg(long = "dry-run", conflicts_with = "write")]
    dry_run: bool,
    /// Write the imported settings back to LIVE
    #[arg(long, conflicts_with = "dry_run")]
    write: bool,
    /// Select output format
    #[arg(long, value_enum)]
    format: Option<FormatValue>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatValue {
    Plain,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormatValue {
    Json,
    Yaml,
}

impl From<InputFormatValue> for DeclaredFormat {
    fn from(value: InputFormatValue) -> Self {
        match value {
            InputFormatValue::Json => DeclaredFormat::Json,
            InputFormatValue::Yaml => DeclaredFormat::Yaml,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeValue {
    Merge,
    Replace,
}

impl From<ModeValue> for MergeMode {
    fn from(value: ModeValue) -> Self {
        match value {
            ModeValue::Merge => MergeMode::Merge,
            ModeValue::Replace => MergeMode::Replace,
        }
    }
}
