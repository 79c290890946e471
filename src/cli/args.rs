use crate::core::profile::DEFAULT_SUGGESTION_LIMIT;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Pipeline document (JSON, or YAML with a .yaml/.yml extension)
    #[arg(value_name = "PIPELINE")]
    pub pipeline: PathBuf,

    /// Node count above which a performance warning is reported
    #[arg(long, value_name = "N")]
    pub large_graph_threshold: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Pipeline document to order
    #[arg(value_name = "PIPELINE")]
    pub pipeline: PathBuf,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Pipeline document to execute
    #[arg(value_name = "PIPELINE")]
    pub pipeline: PathBuf,

    /// Abort the run after this wall-clock budget, e.g. 90s or 30m (default: engine.timeout_seconds)
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<humantime::Duration>,

    /// Execute without validating the graph first
    #[arg(long)]
    pub skip_validation: bool,
}

#[derive(Args, Debug)]
pub struct SuggestArgs {
    /// Sample data file; the format follows the extension (.csv, .json, .xlsx, .xls, .xlsm, .ods)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Worksheet to profile, by name or zero-based index (workbooks only)
    #[arg(long, value_name = "SHEET")]
    pub sheet_name: Option<String>,

    /// Maximum number of suggestions to print
    #[arg(long, default_value_t = DEFAULT_SUGGESTION_LIMIT, value_name = "N")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct RunsArgs {
    #[command(subcommand)]
    pub command: RunsCommand,
}

#[derive(Subcommand, Debug)]
pub enum RunsCommand {
    /// Print one recorded run as JSON
    Show {
        #[arg(value_name = "RUN_ID")]
        run_id: Uuid,
    },
    /// Print the most recent runs as JSON
    List {
        #[arg(long, default_value = "20", value_name = "N")]
        limit: usize,
    },
}
