use super::TransformOutput;
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{JoinConfig, JoinType};
use crate::core::table::{Table, Value, ValueKey};
use std::collections::HashMap;

struct JoinLayout {
    left_key: usize,
    right_key: usize,
    /// Key columns share a name and appear once in the output.
    coalesce: bool,
    columns: Vec<String>,
}

impl JoinLayout {
    fn new(left: &Table, right: &Table, config: &JoinConfig) -> Result<Self, AppError> {
        let left_key = left.require_column(&config.left_on)?;
        let right_key = right.require_column(&config.right_on)?;
        let coalesce = config.left_on == config.right_on;
        let (left_suffix, right_suffix) = &config.suffixes;

        let mut columns = Vec::with_capacity(left.column_count() + right.column_count());
        for (idx, column) in left.columns().iter().enumerate() {
            let shared_key = coalesce && idx == left_key;
            let clashes = right
                .column_index(column)
                .is_some_and(|other| !(coalesce && other == right_key));
            if !shared_key && clashes {
                columns.push(format!("{}{}", column, left_suffix));
            } else {
                columns.push(column.clone());
            }
        }
        for (idx, column) in right.columns().iter().enumerate() {
            if coalesce && idx == right_key {
                continue;
            }
            if left.column_index(column).is_some() {
                columns.push(format!("{}{}", column, right_suffix));
            } else {
                columns.push(column.clone());
            }
        }

        Ok(Self {
            left_key,
            right_key,
            coalesce,
            columns,
        })
    }

    fn combine(
        &self,
        left: Option<&[Value]>,
        right: Option<&[Value]>,
        left_width: usize,
        right_width: usize,
    ) -> Vec<Value> {
        let mut row = Vec::with_capacity(self.columns.len());
        match left {
            Some(values) => row.extend(values.iter().cloned()),
            None => row.extend(std::iter::repeat(Value::Null).take(left_width)),
        }
        if self.coalesce && left.is_none() {
            if let Some(values) = right {
                row[self.left_key] = values[self.right_key].clone();
            }
        }
        for idx in 0..right_width {
            if self.coalesce && idx == self.right_key {
                continue;
            }
            row.push(right.map(|values| values[idx].clone()).unwrap_or_default());
        }
        row
    }
}

fn index_by_key(table: &Table, key: usize) -> HashMap<ValueKey, Vec<usize>> {
    let mut index: HashMap<ValueKey, Vec<usize>> = HashMap::new();
    for (row_idx, row) in table.rows().iter().enumerate() {
        if let Some(value) = row[key].key() {
            index.entry(value).or_default().push(row_idx);
        }
    }
    index
}

/// Equality join of two tables. Null keys never match.
pub fn join(left: &Table, right: &Table, config: &JoinConfig) -> Result<TransformOutput, AppError> {
    let layout = JoinLayout::new(left, right, config)?;
    let (lw, rw) = (left.column_count(), right.column_count());
    let right_index = index_by_key(right, layout.right_key);
    let no_matches: Vec<usize> = Vec::new();

    let mut rows = Vec::new();
    match config.join_type {
        JoinType::Inner | JoinType::Left | JoinType::Outer => {
            let mut matched_right = vec![false; right.row_count()];
            for left_row in left.rows() {
                let matches = left_row[layout.left_key]
                    .key()
                    .and_then(|key| right_index.get(&key))
                    .unwrap_or(&no_matches);
                for &right_idx in matches {
                    matched_right[right_idx] = true;
                    let right_row = &right.rows()[right_idx];
                    rows.push(layout.combine(
                        Some(left_row.as_slice()),
                        Some(right_row.as_slice()),
                        lw,
                        rw,
                    ));
                }
                if matches.is_empty() && config.join_type != JoinType::Inner {
                    rows.push(layout.combine(Some(left_row.as_slice()), None, lw, rw));
                }
            }
            if config.join_type == JoinType::Outer {
                for (right_idx, right_row) in right.rows().iter().enumerate() {
                    if !matched_right[right_idx] {
                        rows.push(layout.combine(None, Some(right_row.as_slice()), lw, rw));
                    }
                }
            }
        }
        JoinType::Right => {
            let left_index = index_by_key(left, layout.left_key);
            for right_row in right.rows() {
                let matches = right_row[layout.right_key]
                    .key()
                    .and_then(|key| left_index.get(&key))
                    .unwrap_or(&no_matches);
                for &left_idx in matches {
                    let left_row = &left.rows()[left_idx];
                    rows.push(layout.combine(
                        Some(left_row.as_slice()),
                        Some(right_row.as_slice()),
                        lw,
                        rw,
                    ));
                }
                if matches.is_empty() {
                    rows.push(layout.combine(None, Some(right_row.as_slice()), lw, rw));
                }
            }
        }
    }

    let table = Table::new(layout.columns, rows)?;
    let message = format!(
        "Joined {} left rows with {} right rows into {} rows",
        left.row_count(),
        right.row_count(),
        table.row_count()
    );
    Ok(TransformOutput::new(table, message))
}
