use super::TransformOutput;
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{FilterConfig, FilterOperator};
use crate::core::table::{Table, Value};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Comparison operand resolved from the configured JSON value.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f64),
    Text(String),
}

impl Operand {
    fn from_config(value: &JsonValue, operator: FilterOperator) -> Operand {
        let text = match value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        if is_text_operator(operator) {
            return Operand::Text(text);
        }
        match value {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| !n.is_nan())
        .map(Operand::Number)
        .unwrap_or(Operand::Text(text))
    }
}

fn is_text_operator(operator: FilterOperator) -> bool {
    matches!(
        operator,
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith
    )
}

fn ordering_matches(operator: FilterOperator, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return operator == FilterOperator::Ne;
    };
    match operator {
        FilterOperator::Eq => ordering == Ordering::Equal,
        FilterOperator::Ne => ordering != Ordering::Equal,
        FilterOperator::Gt => ordering == Ordering::Greater,
        FilterOperator::Lt => ordering == Ordering::Less,
        FilterOperator::Ge => ordering != Ordering::Less,
        FilterOperator::Le => ordering != Ordering::Greater,
        FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => false,
    }
}

fn matches(cell: &Value, operator: FilterOperator, operand: &Operand) -> bool {
    if cell.is_null() {
        return operator == FilterOperator::Ne;
    }
    match operand {
        Operand::Number(expected) => {
            let ordering = cell.as_f64().and_then(|actual| actual.partial_cmp(expected));
            ordering_matches(operator, ordering)
        }
        Operand::Text(expected) => {
            let actual = cell.render();
            match operator {
                FilterOperator::Contains => actual.contains(expected.as_str()),
                FilterOperator::StartsWith => actual.starts_with(expected.as_str()),
                FilterOperator::EndsWith => actual.ends_with(expected.as_str()),
                other => ordering_matches(other, Some(actual.as_str().cmp(expected.as_str()))),
            }
        }
    }
}

/// Keep rows whose `column` satisfies the comparison; row order is preserved.
pub fn filter(input: &Table, config: &FilterConfig) -> Result<TransformOutput, AppError> {
    let idx = input.require_column(&config.column)?;
    let operand = Operand::from_config(&config.value, config.operator);
    let rows: Vec<Vec<Value>> = input
        .rows()
        .iter()
        .filter(|row| matches(&row[idx], config.operator, &operand))
        .cloned()
        .collect();
    let message = format!(
        "Filtered on '{}': {} -> {} rows",
        config.column,
        input.row_count(),
        rows.len()
    );
    let table = Table::new(input.columns().to_vec(), rows)?;
    Ok(TransformOutput::new(table, message))
}
