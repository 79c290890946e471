pub mod args;
pub mod commands;

pub use args::{PlanArgs, RunArgs, RunsArgs, RunsCommand, SuggestArgs, ValidateArgs};
use crate::logging::ConsoleOutput;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
PIPELINE COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "aed")]
#[command(version = crate::VERSION)]
#[command(about = "Validate, plan and execute visually designed ETL pipelines")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate a pipeline, inspect its plan, run it, then review the recorded run."
)]
pub struct Args {
    /// Workspace holding aed.toml, .aed/ and the input/output directories (default: current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub workspace: Option<PathBuf>,

    /// Tracing level or directive (overrides AED_LOG_LEVEL and logging.toml)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Where console logs go: stdout, stderr or none
    #[arg(long, global = true, value_name = "SINK")]
    pub log_output: Option<ConsoleOutput>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Check a pipeline graph without running it",
        long_about = "Validate reports structural and configuration problems as JSON {valid, errors, warnings}. Exits with status 1 when the pipeline is invalid.",
        after_help = "Example:\n    aed validate ./pipelines/sales.json"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Print the execution order of a pipeline",
        after_help = "Example:\n    aed plan ./pipelines/sales.json"
    )]
    Plan(PlanArgs),
    #[command(
        about = "Execute a pipeline and print the run record",
        long_about = "Run validates, schedules and executes the pipeline synchronously, then prints the run record as JSON. Exits with status 1 when the run fails.",
        after_help = "Example:\n    aed run ./pipelines/sales.json --timeout 30m"
    )]
    Run(RunArgs),
    #[command(
        about = "Inspect recorded runs",
        after_help = "Examples:\n    aed runs list --limit 5\n    aed runs show 6f1c0d7e-2a8e-4a39-9d55-3b7f0f3c9a10"
    )]
    Runs(RunsArgs),
    #[command(
        about = "Profile a sample file and suggest transforms",
        long_about = "Suggest reads a sample file the way a source node would, profiles every column and prints JSON {file, total_rows, total_columns, profile, suggestions}. Each suggestion carries a node subtype and a configuration for it.",
        after_help = "Examples:\n    aed suggest sales.csv\n    aed suggest ledger.xlsx --sheet-name Q3 --limit 5"
    )]
    Suggest(SuggestArgs),
}

pub async fn run(args: Args, workspace: PathBuf) -> crate::Result<ExitCode> {
    match args.command {
        Command::Validate(validate_args) => commands::validate(validate_args, &workspace),
        Command::Plan(plan_args) => commands::plan(plan_args),
        Command::Run(run_args) => commands::run(run_args, &workspace).await,
        Command::Runs(runs_args) => commands::runs(runs_args, &workspace).await,
        Command::Suggest(suggest_args) => commands::suggest(suggest_args, &workspace).await,
    }
}
