#![allow(clippy::result_large_err)]

//! In-memory tabular data passed between pipeline nodes.

mod value;

pub use value::{parse_datetime, Value, ValueKey};

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Row-major table with ordered, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, rejecting duplicate column names and ragged rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, AppError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(AppError::new(
                    ErrorCategory::DataError,
                    format!("duplicate column name '{}'", column),
                )
                .with_code("ETL-DATA-002"));
            }
        }
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(AppError::new(
                ErrorCategory::DataError,
                format!(
                    "row {} has {} values but the table has {} columns",
                    idx,
                    row.len(),
                    columns.len()
                ),
            )
            .with_code("ETL-DATA-003"));
        }
        Ok(Self { columns, rows })
    }

    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Convenience constructor from literal column names and JSON cells.
    pub fn from_json_rows(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> Result<Self, AppError> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(Value::from_json).collect())
                .collect(),
        )
    }

    /// Build from JSON records; columns appear in first-seen order and absent keys become null.
    pub fn from_records(records: &[IndexMap<String, JsonValue>]) -> Self {
        let mut columns: IndexMap<String, ()> = IndexMap::new();
        for record in records {
            for key in record.keys() {
                columns.entry(key.clone()).or_insert(());
            }
        }
        let columns: Vec<String> = columns.into_keys().collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).map(Value::from_json).unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn to_records(&self) -> Vec<IndexMap<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect()
            })
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Value>>) {
        (self.columns, self.rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Index of `name`, or a DataError listing the available columns.
    pub fn require_column(&self, name: &str) -> Result<usize, AppError> {
        self.column_index(name).ok_or_else(|| {
            AppError::new(
                ErrorCategory::DataError,
                format!(
                    "column '{}' not found; available columns: {}",
                    name,
                    self.columns.join(", ")
                ),
            )
            .with_code("ETL-DATA-001")
            .with_context("column", name)
        })
    }

    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, AppError> {
        names
            .iter()
            .map(|name| self.require_column(name.as_ref()))
            .collect()
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|values| &values[idx])
    }

    /// Copy of the table with `values` written into column `name`, appended when new.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Table {
        let mut columns = self.columns.clone();
        let mut rows = self.rows.clone();
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                columns.push(name.to_string());
                for (row, value) in rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Table { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = Table::new(vec!["a".into(), "a".into()], vec![]).unwrap_err();
        assert_eq!(err.category, ErrorCategory::DataError);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        assert!(Table::new(vec!["a".into()], vec![vec![Value::Int(1), Value::Int(2)]]).is_err());
    }

    #[test]
    fn test_records_keep_first_seen_column_order() {
        let records: Vec<IndexMap<String, JsonValue>> =
            serde_json::from_str(r#"[{"b": 1, "a": "x"}, {"a": "y", "c": true}]"#).unwrap();
        let table = Table::from_records(&records);
        assert_eq!(table.columns(), &["b", "a", "c"]);
        assert_eq!(table.rows()[1], vec![Value::Null, Value::from("y"), Value::Bool(true)]);
    }

    #[test]
    fn test_missing_column_lists_available() {
        let table = Table::from_json_rows(&["id", "name"], vec![vec![json!(1), json!("a")]]).unwrap();
        let err = table.require_column("email").unwrap_err();
        assert_eq!(err.code, "ETL-DATA-001");
        assert!(err.message.contains("available columns: id, name"));
    }

    #[test]
    fn test_with_column_appends_or_replaces() {
        let table = Table::from_json_rows(&["a"], vec![vec![json!(1)], vec![json!(2)]]).unwrap();
        let added = table.with_column("b", vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(added.columns(), &["a", "b"]);
        let replaced = added.with_column("a", vec![Value::Null, Value::Null]);
        assert_eq!(replaced.cell(0, "a"), Some(&Value::Null));
        assert_eq!(replaced.cell(1, "b"), Some(&Value::Int(20)));
    }
}
