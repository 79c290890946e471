use crate::{RecorderError, RunRecorder};
use aed_types::{RunLogEntry, RunRecord, StatusUpdate};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Process-local recorder keyed by run id.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunRecorder {
    runs: Arc<DashMap<Uuid, RunRecord>>,
}

impl MemoryRunRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRecorder for MemoryRunRecorder {
    async fn create(&self, record: &RunRecord) -> Result<(), RecorderError> {
        match self.runs.entry(record.id) {
            Entry::Occupied(_) => Err(RecorderError::Duplicate(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn append(&self, run_id: Uuid, entry: RunLogEntry) -> Result<(), RecorderError> {
        let mut run = self
            .runs
            .get_mut(&run_id)
            .ok_or(RecorderError::NotFound(run_id))?;
        if !run.accepts_logs() {
            return Err(RecorderError::Closed(run_id));
        }
        run.logs.push(entry);
        Ok(())
    }

    async fn set_status(
        &self,
        run_id: Uuid,
        update: StatusUpdate,
    ) -> Result<RunRecord, RecorderError> {
        let mut run = self
            .runs
            .get_mut(&run_id)
            .ok_or(RecorderError::NotFound(run_id))?;
        run.apply_status(update, Utc::now())?;
        Ok(run.clone())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunRecord>, RecorderError> {
        Ok(self.runs.get(&run_id).map(|run| run.clone()))
    }

    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>, RecorderError> {
        let mut runs: Vec<RunRecord> = self.runs.iter().map(|run| run.clone()).collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit);
        Ok(runs)
    }
}
