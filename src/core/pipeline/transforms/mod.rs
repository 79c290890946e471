#![allow(clippy::result_large_err)]

//! Pure table transforms. Each takes its upstream tables plus a typed config
//! and returns a new table; inputs are never mutated.

mod aggregate;
mod binning;
mod cleaning;
mod columns;
mod dates;
mod filter;
mod join;
mod normalize;
mod sort;
pub(crate) mod stats;
mod strings;

pub use aggregate::aggregate;
pub use binning::binning;
pub use cleaning::{fill_missing, filter_outliers};
pub use columns::{cast, rename, select};
pub use dates::extract_date_parts;
pub use filter::filter;
pub use join::join;
pub use normalize::normalize;
pub use sort::{drop_duplicates, sort};
pub use strings::{merge_columns, split_column, string_transform};

use crate::core::error::AppError;
use crate::core::pipeline::node_config::TransformConfig;
use crate::core::table::{Table, Value};
use crate::core::types::ErrorCategory;
use std::sync::Arc;

/// Result of a transform: the new table plus a human-readable summary for the run log.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub table: Table,
    pub message: String,
}

impl TransformOutput {
    pub fn new(table: Table, message: impl Into<String>) -> Self {
        Self {
            table,
            message: message.into(),
        }
    }
}

/// Dispatch a transform by its typed config.
pub fn apply(
    config: &TransformConfig,
    inputs: &[Arc<Table>],
) -> Result<TransformOutput, AppError> {
    let single = || match inputs {
        [input] => Ok(input.as_ref()),
        _ => Err(arity_error("transform", 1, inputs.len())),
    };
    match config {
        TransformConfig::Join(cfg) => match inputs {
            [left, right] => join(left, right, cfg),
            _ => Err(arity_error("JOIN", 2, inputs.len())),
        },
        TransformConfig::Select(cfg) => select(single()?, cfg),
        TransformConfig::Filter(cfg) => filter(single()?, cfg),
        TransformConfig::Rename(cfg) => rename(single()?, cfg),
        TransformConfig::Cast(cfg) => cast(single()?, cfg),
        TransformConfig::Aggregate(cfg) => aggregate(single()?, cfg),
        TransformConfig::Sort(cfg) => sort(single()?, cfg),
        TransformConfig::FillMissing(cfg) => fill_missing(single()?, cfg),
        TransformConfig::DropDuplicates(cfg) => drop_duplicates(single()?, cfg),
        TransformConfig::Normalize(cfg) => normalize(single()?, cfg),
        TransformConfig::StringTransform(cfg) => string_transform(single()?, cfg),
        TransformConfig::FilterOutliers(cfg) => filter_outliers(single()?, cfg),
        TransformConfig::SplitColumn(cfg) => split_column(single()?, cfg),
        TransformConfig::MergeColumns(cfg) => merge_columns(single()?, cfg),
        TransformConfig::ExtractDateParts(cfg) => extract_date_parts(single()?, cfg),
        TransformConfig::Binning(cfg) => binning(single()?, cfg),
    }
}

fn arity_error(what: &str, expected: usize, actual: usize) -> AppError {
    AppError::new(
        ErrorCategory::StructuralError,
        format!(
            "{} expects {} input table(s) but received {}",
            what, expected, actual
        ),
    )
    .with_code("ETL-RUN-003")
}

pub(crate) fn config_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::ConfigError, message).with_code("ETL-CFG-004")
}

pub(crate) fn data_error(code: &str, message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::DataError, message).with_code(code)
}

/// Numeric view of a column; nulls become `None`, anything non-numeric is a DataError.
pub(crate) fn numeric_column(table: &Table, column: &str) -> Result<Vec<Option<f64>>, AppError> {
    let idx = table.require_column(column)?;
    table
        .column_values(idx)
        .enumerate()
        .map(|(row, value)| {
            if value.is_null() {
                return Ok(None);
            }
            value.as_f64().map(Some).ok_or_else(|| non_numeric(column, row, value))
        })
        .collect()
}

pub(crate) fn non_numeric(column: &str, row: usize, value: &Value) -> AppError {
    data_error(
        "ETL-DATA-005",
        format!(
            "column '{}' contains non-numeric value {} at row {}",
            column, value, row
        ),
    )
    .with_context("column", column)
}
