use super::{data_error, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{CastConfig, CastTarget, RenameConfig, SelectConfig};
use crate::core::table::{parse_datetime, Table, Value};

pub fn select(input: &Table, config: &SelectConfig) -> Result<TransformOutput, AppError> {
    let indices = input.require_columns(&config.columns)?;
    let rows = input
        .rows()
        .iter()
        .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
        .collect();
    let table = Table::new(config.columns.clone(), rows)?;
    let message = format!(
        "Selected {} of {} columns",
        table.column_count(),
        input.column_count()
    );
    Ok(TransformOutput::new(table, message))
}

pub fn rename(input: &Table, config: &RenameConfig) -> Result<TransformOutput, AppError> {
    for source in config.mapping.keys() {
        input.require_column(source)?;
    }
    let columns = input
        .columns()
        .iter()
        .map(|column| {
            config
                .mapping
                .get(column)
                .cloned()
                .unwrap_or_else(|| column.clone())
        })
        .collect();
    let table = Table::new(columns, input.rows().to_vec())?;
    let message = format!("Renamed {} columns", config.mapping.len());
    Ok(TransformOutput::new(table, message))
}

pub fn cast(input: &Table, config: &CastConfig) -> Result<TransformOutput, AppError> {
    let mut rows = input.rows().to_vec();
    for spec in &config.casts {
        let idx = input.require_column(&spec.column)?;
        for (row_idx, row) in rows.iter_mut().enumerate() {
            let cell = &row[idx];
            if cell.is_null() {
                row[idx] = Value::Null;
                continue;
            }
            let converted = convert(cell, spec.to, spec.format.as_deref()).ok_or_else(|| {
                data_error(
                    "ETL-DATA-004",
                    format!(
                        "cannot cast value {} in column '{}' (row {}) to {:?}",
                        cell, spec.column, row_idx, spec.to
                    ),
                )
                .with_context("column", spec.column.as_str())
            })?;
            row[idx] = converted;
        }
    }
    let table = Table::new(input.columns().to_vec(), rows)?;
    let message = format!("Cast {} columns", config.casts.len());
    Ok(TransformOutput::new(table, message))
}

/// Strict conversion of one non-null cell; `None` means the value cannot be represented.
fn convert(value: &Value, target: CastTarget, format: Option<&str>) -> Option<Value> {
    match target {
        CastTarget::Int => match value {
            Value::Int(i) => Some(Value::Int(*i)),
            Value::Bool(b) => Some(Value::Int(i64::from(*b))),
            Value::Float(f) => integral(*f),
            Value::Str(s) => {
                let text = s.trim();
                text.parse::<i64>()
                    .ok()
                    .map(Value::Int)
                    .or_else(|| text.parse::<f64>().ok().and_then(integral))
            }
            Value::DateTime(_) | Value::Null => None,
        },
        CastTarget::Float => match value {
            Value::Bool(b) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
            other => other.as_f64().map(Value::Float),
        },
        CastTarget::String => Some(Value::Str(value.render())),
        CastTarget::Datetime => match value {
            Value::DateTime(dt) => Some(Value::DateTime(*dt)),
            Value::Str(s) => parse_datetime(s, format).map(Value::DateTime),
            _ => None,
        },
        CastTarget::Bool => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Int(i) => Some(Value::Bool(*i != 0)),
            Value::Float(f) => Some(Value::Bool(*f != 0.0)),
            Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "t" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "n" | "f" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
    }
}

fn integral(f: f64) -> Option<Value> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.2e18 {
        Some(Value::Int(f as i64))
    } else {
        None
    }
}
