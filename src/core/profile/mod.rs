//! Column profiling for sample tables, and rule-based transform suggestions
//! derived from those profiles.

mod suggest;

pub use suggest::{suggest, Suggestion, SuggestionKind, DEFAULT_SUGGESTION_LIMIT};

use crate::core::pipeline::transforms::stats;
use crate::core::table::{Table, Value};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::collections::HashSet;

/// Non-null values kept per column as examples.
pub const SAMPLE_SIZE: usize = 5;

/// Inferred type of a column from its non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
    Datetime,
    /// Values of more than one type.
    Mixed,
    /// No non-null values.
    Empty,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Free-form values: text, or a mix that did not settle on one type.
    pub fn is_textual(self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::Mixed)
    }

    fn of(value: &Value) -> Self {
        match value {
            Value::Null => ColumnType::Empty,
            Value::Bool(_) => ColumnType::Boolean,
            Value::Int(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Str(_) => ColumnType::Text,
            Value::DateTime(_) => ColumnType::Datetime,
        }
    }

    fn merge(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (ColumnType::Empty, next) => next,
            (current, next) if current == next => current,
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::Mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; absent with fewer than two values.
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub dtype: ColumnType,
    pub null_count: usize,
    pub null_percent: f64,
    pub unique_count: usize,
    pub total_rows: usize,
    #[serde(serialize_with = "values_as_json")]
    pub sample_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
}

impl ColumnProfile {
    /// Distinct non-null values as a share of all rows (0 for an empty table).
    pub fn uniqueness(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.unique_count as f64 / self.total_rows as f64
        }
    }

    /// Text samples only.
    pub fn text_samples(&self) -> impl Iterator<Item = &str> + '_ {
        self.sample_values.iter().filter_map(|value| match value {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Whether more than `share` of the samples satisfy `predicate`.
    pub fn samples_share(&self, share: f64, predicate: impl Fn(&str) -> bool) -> bool {
        let hits = self.text_samples().filter(|s| predicate(s)).count();
        hits as f64 > self.sample_values.len() as f64 * share
    }
}

fn values_as_json<S: Serializer>(values: &[Value], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(Value::to_json))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableProfile {
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: IndexMap<String, ColumnProfile>,
}

pub fn profile_column(table: &Table, idx: usize) -> ColumnProfile {
    let total_rows = table.row_count();
    let mut dtype = ColumnType::Empty;
    let mut null_count = 0;
    let mut distinct = HashSet::new();
    let mut sample_values = Vec::new();
    let mut numbers = Vec::new();

    for value in table.column_values(idx) {
        if value.is_null() {
            null_count += 1;
            continue;
        }
        dtype = dtype.merge(ColumnType::of(value));
        if let Some(key) = value.key() {
            distinct.insert(key);
        }
        if sample_values.len() < SAMPLE_SIZE {
            sample_values.push(value.clone());
        }
        if let Value::Int(_) | Value::Float(_) = value {
            numbers.extend(value.as_f64());
        }
    }

    let numeric = if dtype.is_numeric() {
        numeric_summary(&numbers)
    } else {
        None
    };
    let null_percent = if total_rows == 0 {
        0.0
    } else {
        null_count as f64 / total_rows as f64 * 100.0
    };

    ColumnProfile {
        dtype,
        null_count,
        null_percent,
        unique_count: distinct.len(),
        total_rows,
        sample_values,
        numeric,
    }
}

fn numeric_summary(numbers: &[f64]) -> Option<NumericSummary> {
    let min = numbers.iter().copied().reduce(f64::min)?;
    let max = numbers.iter().copied().reduce(f64::max)?;
    Some(NumericSummary {
        min,
        max,
        mean: stats::mean(numbers)?,
        median: stats::median(numbers)?,
        std: stats::sample_std(numbers),
    })
}

pub fn profile_table(table: &Table) -> TableProfile {
    let columns = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.clone(), profile_column(table, idx)))
        .collect();
    TableProfile {
        total_rows: table.row_count(),
        total_columns: table.column_count(),
        columns,
    }
}
