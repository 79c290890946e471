use crate::core::types::{ErrorCategory, ErrorSeverity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Engine-level diagnostic carried through validation, scheduling and execution.
#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    /// Node that raised the error, when known.
    pub node_id: Option<String>,
    pub context: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
    pub source: Option<anyhow::Error>,
}

impl AppError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        AppError {
            category,
            severity: ErrorSeverity::Error,
            code: format!("ERR-{}", uuid::Uuid::new_v4()),
            message: message.into(),
            node_id: None,
            context: BTreeMap::new(),
            occurred_at: Utc::now(),
            source: None,
        }
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_node<T: Into<String>>(mut self, node_id: T) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(anyhow::Error::new(source));
        self
    }

    pub fn add_context(&mut self, key: &str, value: &str) {
        self.context.insert(key.to_string(), value.to_string());
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    /// Single-paragraph description suitable for `RunRecord::error_message`.
    pub fn user_message(&self) -> String {
        self.message.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        if let Some(node_id) = &self.node_id {
            write!(f, " (node: {})", node_id)?;
        }
        if !self.context.is_empty() {
            write!(f, " (Context: {:?})", self.context)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| {
            let inner: &(dyn std::error::Error + 'static) = err.as_ref();
            inner
        })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        let mut error = AppError::new(ErrorCategory::InternalError, e.to_string())
            .with_code("ETL-INTERNAL-001");
        error.source = Some(e);
        error
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::new(ErrorCategory::IoError, e.to_string())
            .with_code("ETL-IO-000")
            .with_source(e)
    }
}

impl From<aed_backend::RecorderError> for AppError {
    fn from(e: aed_backend::RecorderError) -> Self {
        AppError::new(ErrorCategory::RecorderError, e.to_string())
            .with_code("ETL-REC-001")
            .with_source(e)
    }
}
