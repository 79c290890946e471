use crate::{
    cli::args::{PlanArgs, RunArgs, RunsArgs, RunsCommand, SuggestArgs, ValidateArgs},
    core::{
        config::{AedConfig, ConfigLoader, RecorderBackend},
        connectors::{Connectors, TableReader},
        error::AppError,
        pipeline::{
            load_document, load_pipeline, node_config::NodeConfig, schedule, validate_document,
            NodeSubtype, PipelineEngine, ValidationSettings,
        },
        profile::{profile_table, suggest as suggest_transforms, ColumnProfile, Suggestion},
    },
    Result,
};
use aed_backend::{MemoryRunRecorder, RunRecorder, SqliteRunRecorder};
use aed_types::RunStatus;
use anyhow::{anyhow, Context};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{}", text);
    Ok(())
}

pub fn validate(args: ValidateArgs, workspace: &Path) -> Result<ExitCode> {
    let config = ConfigLoader::load_from_workspace(workspace)?;
    let settings = ValidationSettings {
        large_graph_threshold: args
            .large_graph_threshold
            .unwrap_or(config.engine.large_graph_threshold),
    };

    let document = load_document(&args.pipeline)?;
    let report = validate_document(&document, &settings);
    tracing::info!(
        pipeline = %args.pipeline.display(),
        valid = report.valid,
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "pipeline validated"
    );
    print_json(&report)?;

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn plan(args: PlanArgs) -> Result<ExitCode> {
    let graph = load_pipeline(&args.pipeline)?;
    let order = schedule(&graph)?;

    for (position, node_id) in order.iter().enumerate() {
        match graph.node(node_id) {
            Some(node) => println!(
                "{:>3}. {} ({} {})",
                position + 1,
                node.display_name(),
                node.kind,
                node.subtype
            ),
            None => println!("{:>3}. {}", position + 1, node_id),
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Create the parent directory of a file-backed SQLite URL.
fn prepare_sqlite_path(url: &str) -> Result<()> {
    let Some(rest) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

async fn open_sqlite(config: &AedConfig, workspace: &Path) -> Result<SqliteRunRecorder> {
    let url = config.recorder_url(workspace);
    prepare_sqlite_path(&url)?;
    SqliteRunRecorder::connect(&url)
        .await
        .with_context(|| format!("failed to open run recorder at {}", url))
}

async fn open_recorder(config: &AedConfig, workspace: &Path) -> Result<Arc<dyn RunRecorder>> {
    Ok(match config.recorder.backend {
        RecorderBackend::Memory => Arc::new(MemoryRunRecorder::new()),
        RecorderBackend::Sqlite => Arc::new(open_sqlite(config, workspace).await?),
    })
}

pub async fn run(args: RunArgs, workspace: &Path) -> Result<ExitCode> {
    let config = ConfigLoader::load_from_workspace(workspace)?;
    let mut settings = config.engine_settings();
    if let Some(timeout) = args.timeout {
        let timeout: Duration = timeout.into();
        if timeout.is_zero() {
            return Err(anyhow!("--timeout must be greater than zero"));
        }
        settings.timeout = timeout;
    }
    if args.skip_validation {
        settings.validate = false;
    }

    let graph = load_pipeline(&args.pipeline)?;
    let recorder = open_recorder(&config, workspace).await?;
    let connectors = Connectors::new(config.storage_settings(workspace));
    let engine = PipelineEngine::with_connectors(connectors, recorder, settings);

    let record = engine.run(&graph).await?;
    tracing::info!(run_id = %record.id, status = %record.status, "run finished");
    print_json(&record)?;

    Ok(if record.status == RunStatus::Success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn runs(args: RunsArgs, workspace: &Path) -> Result<ExitCode> {
    let config = ConfigLoader::load_from_workspace(workspace)?;
    let recorder = open_sqlite(&config, workspace).await?;

    match args.command {
        RunsCommand::Show { run_id } => {
            let record = recorder
                .load(run_id)
                .await?
                .ok_or_else(|| anyhow!("run {} not found", run_id))?;
            print_json(&record)?;
        }
        RunsCommand::List { limit } => {
            let records = recorder.list(limit).await?;
            print_json(&records)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Source subtype for a sample file, chosen by extension.
fn sample_subtype(file: &Path) -> Result<NodeSubtype> {
    let extension = file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => Ok(NodeSubtype::CsvSource),
        "json" => Ok(NodeSubtype::JsonSource),
        "xlsx" | "xls" | "xlsm" | "ods" => Ok(NodeSubtype::ExcelSource),
        _ => Err(anyhow!(
            "cannot tell the format of {} (expected .csv, .json, .xlsx, .xls, .xlsm or .ods)",
            file.display()
        )),
    }
}

#[derive(Serialize)]
struct SuggestReport<'a> {
    file: String,
    total_rows: usize,
    total_columns: usize,
    profile: &'a IndexMap<String, ColumnProfile>,
    suggestions: Vec<Suggestion>,
}

pub async fn suggest(args: SuggestArgs, workspace: &Path) -> Result<ExitCode> {
    let config = ConfigLoader::load_from_workspace(workspace)?;
    let subtype = sample_subtype(&args.file)?;
    let sheet_name = args
        .sheet_name
        .map(|sheet| sheet.parse::<u64>().map_or_else(|_| json!(sheet), |idx| json!(idx)));
    let raw = json!({
        "file_path": args.file.display().to_string(),
        "sheet_name": sheet_name,
    });
    let NodeConfig::Source(source) = NodeConfig::parse(subtype, &raw)? else {
        return Err(anyhow!("{} is not a source subtype", subtype));
    };

    let connectors = Connectors::new(config.storage_settings(workspace));
    let table = connectors.read(&source).await.map_err(AppError::from)?;
    let profile = profile_table(&table);
    let suggestions = suggest_transforms(&profile, args.limit);
    tracing::info!(
        file = %args.file.display(),
        rows = profile.total_rows,
        suggestions = suggestions.len(),
        "sample profiled"
    );

    print_json(&SuggestReport {
        file: args.file.display().to_string(),
        total_rows: profile.total_rows,
        total_columns: profile.total_columns,
        profile: &profile.columns,
        suggestions,
    })?;
    Ok(ExitCode::SUCCESS)
}
