use crate::graph::PipelineGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Success)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(RunStatus::Pending),
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// One append-only provenance entry of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_out: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl RunLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            node_id: None,
            level,
            message: message.into(),
            rows_in: None,
            rows_out: None,
            timestamp: Utc::now(),
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn for_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_rows(mut self, rows_in: Option<u64>, rows_out: Option<u64>) -> Self {
        self.rows_in = rows_in;
        self.rows_out = rows_out;
        self
    }
}

/// Requested status change for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Running,
    Succeeded {
        result_location: Option<String>,
        outputs: Vec<String>,
    },
    Failed {
        error_message: String,
    },
}

impl StatusUpdate {
    pub fn status(&self) -> RunStatus {
        match self {
            StatusUpdate::Running => RunStatus::Running,
            StatusUpdate::Succeeded { .. } => RunStatus::Success,
            StatusUpdate::Failed { .. } => RunStatus::Failed,
        }
    }
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("run {run_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub run_id: Uuid,
    pub from: RunStatus,
    pub to: RunStatus,
}

/// Persistent record of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_name: Option<String>,
    pub pipeline_hash: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logs: Vec<RunLogEntry>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub result_location: Option<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl RunRecord {
    /// Fresh PENDING record for `graph`.
    pub fn pending(graph: &PipelineGraph) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_name: graph.name.clone(),
            pipeline_hash: graph.fingerprint(),
            status: RunStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            logs: Vec::new(),
            error_message: None,
            result_location: None,
            outputs: Vec::new(),
        }
    }

    /// Log entries are accepted until the run reaches a terminal status.
    pub fn accepts_logs(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Apply a status change, stamping `started_at`/`finished_at` exactly once.
    pub fn apply_status(
        &mut self,
        update: StatusUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let next = update.status();
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                run_id: self.id,
                from: self.status,
                to: next,
            });
        }

        match update {
            StatusUpdate::Running => {
                self.started_at.get_or_insert(at);
            }
            StatusUpdate::Succeeded {
                result_location,
                outputs,
            } => {
                self.finished_at.get_or_insert(at);
                self.result_location = result_location;
                self.outputs = outputs;
            }
            StatusUpdate::Failed { error_message } => {
                self.finished_at.get_or_insert(at);
                self.error_message = Some(error_message);
            }
        }
        self.status = next;
        Ok(())
    }
}
