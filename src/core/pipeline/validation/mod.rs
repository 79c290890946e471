//! Advisory validation of pipeline graphs.
//!
//! Validation never mutates the graph and never auto-fixes it. Every rule
//! contributes diagnostics and the registry folds them into a
//! [`ValidationReport`] in rule order.

use aed_types::{PipelineGraph, ValidationReport};
use serde_json::Value;
use std::fmt;

pub mod rules;
pub use rules::*;

pub const DEFAULT_LARGE_GRAPH_THRESHOLD: usize = 50;

/// Tunables for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSettings {
    /// Node count above which a performance warning is emitted.
    pub large_graph_threshold: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            large_graph_threshold: DEFAULT_LARGE_GRAPH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Error => write!(f, "error"),
            DiagnosticLevel::Warning => write!(f, "warning"),
        }
    }
}

/// One finding produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
        }
    }
}

/// Trait implemented by graph validation rules.
pub trait GraphRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, graph: &PipelineGraph, settings: &ValidationSettings) -> Vec<Diagnostic>;
}

/// Registry that runs the built-in rules in their reporting order.
pub struct ValidatorRegistry {
    rules: Vec<Box<dyn GraphRule>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self {
            rules: built_in_rules(),
        }
    }

    /// Validate `graph`. An empty graph short-circuits with a single error.
    pub fn run(&self, graph: &PipelineGraph, settings: &ValidationSettings) -> ValidationReport {
        if graph.nodes.is_empty() {
            return ValidationReport::new(
                vec!["Pipeline must contain at least one node".to_string()],
                Vec::new(),
            );
        }

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for rule in &self.rules {
            let diagnostics = rule.check(graph, settings);
            if !diagnostics.is_empty() {
                tracing::debug!(
                    rule = rule.name(),
                    count = diagnostics.len(),
                    "validation rule reported findings"
                );
            }
            for diagnostic in diagnostics {
                match diagnostic.level {
                    DiagnosticLevel::Error => errors.push(diagnostic.message),
                    DiagnosticLevel::Warning => warnings.push(diagnostic.message),
                }
            }
        }
        ValidationReport::new(errors, warnings)
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_graph(graph: &PipelineGraph, settings: &ValidationSettings) -> ValidationReport {
    ValidatorRegistry::new().run(graph, settings)
}

/// Validate a raw pipeline document, reporting shape errors instead of failing.
pub fn validate_document(document: &Value, settings: &ValidationSettings) -> ValidationReport {
    match serde_json::from_value::<PipelineGraph>(document.clone()) {
        Ok(graph) => validate_graph(&graph, settings),
        Err(err) => ValidationReport::new(
            vec![format!("Invalid pipeline document: {}", err)],
            Vec::new(),
        ),
    }
}
