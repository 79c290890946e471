use crate::{RecorderError, RunRecorder};
use aed_types::{LogLevel, RunLogEntry, RunRecord, RunStatus, StatusUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const RUN_COLUMNS: &str = "id, pipeline_name, pipeline_hash, status, created_at, started_at, \
     finished_at, error_message, result_location, outputs";

/// SQLite-backed recorder. Each log entry is its own row keyed by
/// `(run_id, seq)`, so appends never rewrite earlier entries.
#[derive(Debug, Clone)]
pub struct SqliteRunRecorder {
    pool: SqlitePool,
}

impl SqliteRunRecorder {
    /// Open (creating if needed) the database at `database_url` and apply migrations.
    pub async fn connect(database_url: &str) -> Result<Self, RecorderError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            // every connection to :memory: is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, RecorderError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("run recorder migrations applied");
        Ok(Self { pool })
    }

    async fn current_status(&self, run_id: Uuid) -> Result<RunStatus, RecorderError> {
        let row = sqlx::query("SELECT status FROM pipeline_runs WHERE id = ?")
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RecorderError::NotFound(run_id))?;
        let status: String = row.try_get("status")?;
        RunStatus::from_str(&status).map_err(RecorderError::Storage)
    }

    async fn load_logs(&self, run_id: Uuid) -> Result<Vec<RunLogEntry>, RecorderError> {
        let rows = sqlx::query(
            "SELECT node_id, level, message, rows_in, rows_out, timestamp \
             FROM pipeline_run_logs WHERE run_id = ? ORDER BY seq ASC",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(log_from_row).collect()
    }

    async fn insert_log(&self, run_id: Uuid, entry: &RunLogEntry) -> Result<(), RecorderError> {
        // sequence number computed inside the insert so concurrent appends stay ordered
        sqlx::query(
            "INSERT INTO pipeline_run_logs \
             (run_id, seq, node_id, level, message, rows_in, rows_out, timestamp) \
             SELECT ?, COALESCE(MAX(seq), -1) + 1, ?, ?, ?, ?, ?, ? \
             FROM pipeline_run_logs WHERE run_id = ?",
        )
        .bind(run_id.to_string())
        .bind(entry.node_id.as_deref())
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(entry.rows_in.map(|rows| rows as i64))
        .bind(entry.rows_out.map(|rows| rows as i64))
        .bind(entry.timestamp)
        .bind(run_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn storage<E: std::fmt::Display>(err: E) -> RecorderError {
    RecorderError::Storage(err.to_string())
}

fn record_from_row(row: &SqliteRow) -> Result<RunRecord, RecorderError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let outputs: String = row.try_get("outputs")?;
    Ok(RunRecord {
        id: Uuid::parse_str(&id).map_err(storage)?,
        pipeline_name: row.try_get("pipeline_name")?,
        pipeline_hash: row.try_get("pipeline_hash")?,
        status: RunStatus::from_str(&status).map_err(RecorderError::Storage)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        started_at: row.try_get::<Option<DateTime<Utc>>, _>("started_at")?,
        finished_at: row.try_get::<Option<DateTime<Utc>>, _>("finished_at")?,
        logs: Vec::new(),
        error_message: row.try_get("error_message")?,
        result_location: row.try_get("result_location")?,
        outputs: serde_json::from_str(&outputs).map_err(storage)?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<RunLogEntry, RecorderError> {
    let level: String = row.try_get("level")?;
    let rows_in: Option<i64> = row.try_get("rows_in")?;
    let rows_out: Option<i64> = row.try_get("rows_out")?;
    Ok(RunLogEntry {
        node_id: row.try_get("node_id")?,
        level: LogLevel::from_str(&level).map_err(RecorderError::Storage)?,
        message: row.try_get("message")?,
        rows_in: rows_in.map(|rows| rows as u64),
        rows_out: rows_out.map(|rows| rows as u64),
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
    })
}

#[async_trait]
impl RunRecorder for SqliteRunRecorder {
    async fn create(&self, record: &RunRecord) -> Result<(), RecorderError> {
        let outputs = serde_json::to_string(&record.outputs).map_err(storage)?;
        let inserted = sqlx::query(&format!(
            "INSERT INTO pipeline_runs ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RUN_COLUMNS
        ))
        .bind(record.id.to_string())
        .bind(record.pipeline_name.as_deref())
        .bind(&record.pipeline_hash)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(record.error_message.as_deref())
        .bind(record.result_location.as_deref())
        .bind(outputs)
        .execute(&self.pool)
        .await;

        if let Err(err) = inserted {
            let duplicate = err
                .as_database_error()
                .map(|db| db.is_unique_violation())
                .unwrap_or(false);
            return Err(if duplicate {
                RecorderError::Duplicate(record.id)
            } else {
                err.into()
            });
        }

        for entry in &record.logs {
            self.insert_log(record.id, entry).await?;
        }
        Ok(())
    }

    async fn append(&self, run_id: Uuid, entry: RunLogEntry) -> Result<(), RecorderError> {
        if self.current_status(run_id).await?.is_terminal() {
            return Err(RecorderError::Closed(run_id));
        }
        self.insert_log(run_id, &entry).await
    }

    async fn set_status(
        &self,
        run_id: Uuid,
        update: StatusUpdate,
    ) -> Result<RunRecord, RecorderError> {
        let mut record = self
            .load(run_id)
            .await?
            .ok_or(RecorderError::NotFound(run_id))?;
        let previous = record.status;
        record.apply_status(update, Utc::now())?;

        let outputs = serde_json::to_string(&record.outputs).map_err(storage)?;
        let result = sqlx::query(
            "UPDATE pipeline_runs SET status = ?, started_at = ?, finished_at = ?, \
             error_message = ?, result_location = ?, outputs = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(record.status.as_str())
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(record.error_message.as_deref())
        .bind(record.result_location.as_deref())
        .bind(outputs)
        .bind(run_id.to_string())
        .bind(previous.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.current_status(run_id).await?;
            return Err(aed_types::TransitionError {
                run_id,
                from: current,
                to: record.status,
            }
            .into());
        }
        Ok(record)
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunRecord>, RecorderError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pipeline_runs WHERE id = ?",
            RUN_COLUMNS
        ))
        .bind(run_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut record = record_from_row(&row)?;
        record.logs = self.load_logs(run_id).await?;
        Ok(Some(record))
    }

    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>, RecorderError> {
        let rows = sqlx::query("SELECT id FROM pipeline_runs ORDER BY created_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let id = Uuid::parse_str(&id).map_err(storage)?;
            if let Some(run) = self.load(id).await? {
                runs.push(run);
            }
        }
        Ok(runs)
    }
}
