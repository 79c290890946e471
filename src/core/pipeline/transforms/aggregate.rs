use super::{config_error, non_numeric, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{AggFunc, AggregateConfig, AggregationSpec};
use crate::core::table::{Table, Value, ValueKey};
use indexmap::IndexMap;
use std::cmp::Ordering;

/// Group rows by the key columns (first-seen order) and fold each aggregation.
/// Rows with a null key are dropped.
pub fn aggregate(input: &Table, config: &AggregateConfig) -> Result<TransformOutput, AppError> {
    if config.group_by.is_empty() || config.aggregations.is_empty() {
        return Err(config_error(
            "AGGREGATE needs at least one group_by column and one aggregation",
        ));
    }
    let key_indices = input.require_columns(&config.group_by)?;
    let value_indices = config
        .aggregations
        .iter()
        .map(|spec| input.require_column(&spec.column))
        .collect::<Result<Vec<_>, _>>()?;

    let mut groups: IndexMap<Vec<ValueKey>, (Vec<Value>, Vec<usize>)> = IndexMap::new();
    for (row_idx, row) in input.rows().iter().enumerate() {
        let Some(key) = key_indices
            .iter()
            .map(|&idx| row[idx].key())
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };
        groups
            .entry(key)
            .or_insert_with(|| {
                (
                    key_indices.iter().map(|&idx| row[idx].clone()).collect(),
                    Vec::new(),
                )
            })
            .1
            .push(row_idx);
    }

    let mut rows = Vec::with_capacity(groups.len());
    for (key_values, members) in groups.into_values() {
        let mut row = key_values;
        for (spec, &value_idx) in config.aggregations.iter().zip(&value_indices) {
            let cells: Vec<(usize, &Value)> = members
                .iter()
                .map(|&row_idx| (row_idx, &input.rows()[row_idx][value_idx]))
                .filter(|(_, value)| !value.is_null())
                .collect();
            row.push(fold(spec, &cells)?);
        }
        rows.push(row);
    }

    let mut columns = config.group_by.clone();
    columns.extend(config.aggregations.iter().map(AggregationSpec::output_name));
    let table = Table::new(columns, rows)?;
    let message = format!(
        "Aggregated {} rows into {} groups",
        input.row_count(),
        table.row_count()
    );
    Ok(TransformOutput::new(table, message))
}

fn fold(spec: &AggregationSpec, cells: &[(usize, &Value)]) -> Result<Value, AppError> {
    match spec.agg {
        AggFunc::Count => Ok(Value::Int(cells.len() as i64)),
        AggFunc::Sum => {
            if cells.iter().all(|(_, value)| matches!(value, Value::Int(_))) {
                let total = cells.iter().try_fold(0i64, |acc, (_, value)| match value {
                    Value::Int(i) => acc.checked_add(*i),
                    _ => None,
                });
                if let Some(total) = total {
                    return Ok(Value::Int(total));
                }
            }
            let numbers = numbers(spec, cells)?;
            Ok(Value::Float(numbers.iter().sum()))
        }
        AggFunc::Mean => {
            let numbers = numbers(spec, cells)?;
            if numbers.is_empty() {
                return Ok(Value::Null);
            }
            Ok(Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64))
        }
        AggFunc::Min => Ok(extreme(cells, Ordering::Less)),
        AggFunc::Max => Ok(extreme(cells, Ordering::Greater)),
    }
}

fn numbers(spec: &AggregationSpec, cells: &[(usize, &Value)]) -> Result<Vec<f64>, AppError> {
    cells
        .iter()
        .map(|(row, value)| {
            value
                .as_f64()
                .ok_or_else(|| non_numeric(&spec.column, *row, value))
        })
        .collect()
}

fn extreme(cells: &[(usize, &Value)], wanted: Ordering) -> Value {
    cells
        .iter()
        .map(|(_, value)| *value)
        .reduce(|best, value| {
            if value.sort_cmp(best) == wanted {
                value
            } else {
                best
            }
        })
        .cloned()
        .unwrap_or(Value::Null)
}
