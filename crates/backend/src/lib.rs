//! Run recorders: append-only storage for pipeline run status and provenance logs.

mod memory;
mod sqlite;

pub use memory::MemoryRunRecorder;
pub use sqlite::SqliteRunRecorder;

use aed_types::{RunLogEntry, RunRecord, StatusUpdate, TransitionError};
use async_trait::async_trait;
use uuid::Uuid;

/// Errors raised by run recorders.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("run {0} not found")]
    NotFound(Uuid),
    #[error("run {0} already exists")]
    Duplicate(Uuid),
    #[error("run {0} is finished and no longer accepts log entries")]
    Closed(Uuid),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("recorder storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RecorderError {
    fn from(err: sqlx::Error) -> Self {
        RecorderError::Storage(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for RecorderError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        RecorderError::Storage(err.to_string())
    }
}

/// Append-only writer for run records.
///
/// Implementations partition state by run id; concurrent runs never observe
/// each other's log entries. Status changes follow the lifecycle enforced by
/// [`RunRecord::apply_status`], and terminal runs reject further appends.
#[async_trait]
pub trait RunRecorder: Send + Sync {
    /// Persist a new run record (normally PENDING).
    async fn create(&self, record: &RunRecord) -> Result<(), RecorderError>;

    /// Append one log entry to a non-terminal run.
    async fn append(&self, run_id: Uuid, entry: RunLogEntry) -> Result<(), RecorderError>;

    /// Move a run through its lifecycle and return the updated record.
    async fn set_status(
        &self,
        run_id: Uuid,
        update: StatusUpdate,
    ) -> Result<RunRecord, RecorderError>;

    async fn load(&self, run_id: Uuid) -> Result<Option<RunRecord>, RecorderError>;

    /// Most recently created runs first.
    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>, RecorderError>;
}
