use crate::core::error::AppError;
use crate::core::table::Table;
use crate::core::types::ErrorCategory;
use std::collections::HashMap;
use std::sync::Arc;

/// Tables produced so far in one run, keyed by node id.
///
/// Owned by a single execution and dropped when the run finishes.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    tables: HashMap<String, Arc<Table>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node_id: impl Into<String>, table: impl Into<Arc<Table>>) -> Arc<Table> {
        let table = table.into();
        self.tables.insert(node_id.into(), Arc::clone(&table));
        table
    }

    pub fn get(&self, node_id: &str) -> Option<Arc<Table>> {
        self.tables.get(node_id).cloned()
    }

    /// Upstream table for `node_id`, failing when the upstream produced nothing.
    pub fn require(&self, upstream: &str, node_id: &str) -> Result<Arc<Table>, AppError> {
        self.get(upstream).ok_or_else(|| {
            AppError::new(
                ErrorCategory::StructuralError,
                format!(
                    "upstream node '{}' produced no table for '{}'",
                    upstream, node_id
                ),
            )
            .with_code("ETL-RUN-004")
            .with_node(node_id)
        })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
