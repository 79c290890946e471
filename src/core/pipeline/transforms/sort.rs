use super::{config_error, TransformOutput};
use crate::core::error::AppError;
use crate::core::pipeline::node_config::{DropDuplicatesConfig, SortConfig};
use crate::core::table::{Table, Value, ValueKey};
use std::cmp::Ordering;
use std::collections::HashSet;

fn compare_cells(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        // nulls sort last in both directions
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = a.sort_cmp(b);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        }
    }
}

/// Stable multi-column sort.
pub fn sort(input: &Table, config: &SortConfig) -> Result<TransformOutput, AppError> {
    if config.columns.is_empty() {
        return Err(config_error("SORT needs at least one column"));
    }
    let keys: Vec<(usize, bool)> = input
        .require_columns(&config.columns)?
        .into_iter()
        .enumerate()
        .map(|(position, idx)| (idx, config.ascending.for_column(position)))
        .collect();

    let mut rows = input.rows().to_vec();
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|&(idx, ascending)| compare_cells(&a[idx], &b[idx], ascending))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let table = Table::new(input.columns().to_vec(), rows)?;
    let message = format!(
        "Sorted {} rows by {}",
        table.row_count(),
        config.columns.join(", ")
    );
    Ok(TransformOutput::new(table, message))
}

/// Keep the first row of every duplicate group over `columns` (all columns when empty).
pub fn drop_duplicates(
    input: &Table,
    config: &DropDuplicatesConfig,
) -> Result<TransformOutput, AppError> {
    let indices = if config.columns.is_empty() {
        (0..input.column_count()).collect()
    } else {
        input.require_columns(&config.columns)?
    };

    let mut seen: HashSet<Vec<Option<ValueKey>>> = HashSet::new();
    let rows: Vec<Vec<Value>> = input
        .rows()
        .iter()
        .filter(|row| seen.insert(indices.iter().map(|&idx| row[idx].key()).collect()))
        .cloned()
        .collect();

    let removed = input.row_count() - rows.len();
    let table = Table::new(input.columns().to_vec(), rows)?;
    Ok(TransformOutput::new(
        table,
        format!("Removed {} duplicate rows", removed),
    ))
}
