//! Shared data model for AED pipelines: graph documents, run records and validation reports.

pub mod graph;
pub mod run;
pub mod validation;

pub use graph::{Edge, Node, NodeKind, PipelineGraph};
pub use run::{LogLevel, RunLogEntry, RunRecord, RunStatus, StatusUpdate, TransitionError};
pub use validation::ValidationReport;
