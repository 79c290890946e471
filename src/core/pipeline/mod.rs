#![allow(clippy::result_large_err)]

//! Pipeline graphs: catalog, validation, scheduling, transforms and execution.

pub mod catalog;
pub mod context;
pub mod executor;
pub mod node_config;
pub mod scheduler;
pub mod transforms;
pub mod validation;

pub use catalog::NodeSubtype;
pub use context::ExecutionContext;
pub use executor::{EngineSettings, PipelineEngine, RunHandle};
pub use scheduler::{schedule, CycleError, ScheduleError};
pub use validation::{validate_document, validate_graph, ValidationSettings};

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use aed_types::PipelineGraph;
use serde_json::Value;
use std::path::Path;

fn document_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::new(
        ErrorCategory::ConfigError,
        format!("cannot parse pipeline document {}: {}", path.display(), err),
    )
    .with_code("ETL-CFG-010")
    .with_context("path", path.display().to_string())
}

/// Read a pipeline document as raw JSON. `.yaml`/`.yml` files are parsed as YAML.
pub fn load_document(path: &Path) -> Result<Value, AppError> {
    let text = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|err| document_error(path, err))
    } else {
        serde_json::from_str(&text).map_err(|err| document_error(path, err))
    }
}

pub fn load_pipeline(path: &Path) -> Result<PipelineGraph, AppError> {
    let document = load_document(path)?;
    serde_json::from_value(document).map_err(|err| document_error(path, err))
}
