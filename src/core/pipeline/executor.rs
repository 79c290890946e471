#![allow(clippy::result_large_err)]

//! Drives a pipeline run from PENDING to a terminal status.
//!
//! The engine validates, schedules and then executes nodes strictly in
//! topological order, threading tables through a per-run
//! [`ExecutionContext`]. Every step is appended to the [`RunRecorder`];
//! earlier entries are never rewritten.

use crate::core::connectors::{Connectors, TableReader, TableWriter};
use crate::core::error::AppError;
use crate::core::pipeline::catalog::NodeSubtype;
use crate::core::pipeline::context::ExecutionContext;
use crate::core::pipeline::node_config::{NodeConfig, SinkConfig, TransformConfig};
use crate::core::pipeline::scheduler::schedule;
use crate::core::pipeline::transforms;
use crate::core::pipeline::validation::{
    validate_graph, ValidationSettings, DEFAULT_LARGE_GRAPH_THRESHOLD,
};
use crate::core::table::Table;
use crate::core::types::ErrorCategory;
use aed_backend::RunRecorder;
use aed_types::{Node, PipelineGraph, RunLogEntry, RunRecord, RunStatus, StatusUpdate};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Upper bound for the node loop of a single run.
    pub timeout: Duration,
    /// Validate the graph before any node runs.
    pub validate: bool,
    pub large_graph_threshold: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            validate: true,
            large_graph_threshold: DEFAULT_LARGE_GRAPH_THRESHOLD,
        }
    }
}

struct EngineInner {
    reader: Arc<dyn TableReader>,
    writer: Arc<dyn TableWriter>,
    recorder: Arc<dyn RunRecorder>,
    settings: EngineSettings,
    active: DashMap<Uuid, DateTime<Utc>>,
}

/// Pipeline execution engine. Cloning is cheap and clones share active-run tracking.
#[derive(Clone)]
pub struct PipelineEngine {
    inner: Arc<EngineInner>,
}

/// Why the node loop stopped early.
enum Halt {
    /// The pipeline failed; the message becomes the run's `error_message`.
    Failed(String),
    /// The recorder or a worker failed underneath the run.
    Infra(AppError),
}

impl From<AppError> for Halt {
    fn from(err: AppError) -> Self {
        Halt::Infra(err)
    }
}

/// What a single node produced.
struct NodeOutcome {
    table: Arc<Table>,
    message: String,
    rows_in: Option<u64>,
    location: Option<String>,
}

/// Removes the run id from the active set when execution ends, however it ends.
struct ActiveRun<'a> {
    active: &'a DashMap<Uuid, DateTime<Utc>>,
    run_id: Uuid,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.run_id);
    }
}

fn run_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::StructuralError, message)
}

impl PipelineEngine {
    pub fn new(
        reader: Arc<dyn TableReader>,
        writer: Arc<dyn TableWriter>,
        recorder: Arc<dyn RunRecorder>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                reader,
                writer,
                recorder,
                settings,
                active: DashMap::new(),
            }),
        }
    }

    /// Engine backed by the default file, database and HTTP connectors.
    pub fn with_connectors(
        connectors: Connectors,
        recorder: Arc<dyn RunRecorder>,
        settings: EngineSettings,
    ) -> Self {
        let connectors = Arc::new(connectors);
        Self::new(connectors.clone(), connectors, recorder, settings)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn recorder(&self) -> Arc<dyn RunRecorder> {
        Arc::clone(&self.inner.recorder)
    }

    pub fn is_active(&self, run_id: Uuid) -> bool {
        self.inner.active.contains_key(&run_id)
    }

    /// Create a PENDING run record for `graph`.
    pub async fn trigger(&self, graph: &PipelineGraph) -> Result<RunRecord, AppError> {
        let record = RunRecord::pending(graph);
        self.inner.recorder.create(&record).await?;
        tracing::info!(run_id = %record.id, pipeline = ?graph.name, "pipeline run triggered");
        Ok(record)
    }

    /// Trigger and execute in one call.
    pub async fn run(&self, graph: &PipelineGraph) -> Result<RunRecord, AppError> {
        let record = self.trigger(graph).await?;
        self.execute(record.id, graph).await
    }

    /// Trigger, then execute on a background task.
    pub async fn spawn(&self, graph: PipelineGraph) -> Result<RunHandle, AppError> {
        let record = self.trigger(&graph).await?;
        let engine = self.clone();
        let run_id = record.id;
        let task = tokio::spawn(async move { engine.execute(run_id, &graph).await });
        Ok(RunHandle {
            record,
            recorder: self.recorder(),
            task,
        })
    }

    /// Drive a PENDING run to SUCCESS or FAILED.
    ///
    /// Pipeline failures come back as `Ok` with a FAILED record. `Err` means the
    /// run could not be driven at all: recorder failure, unknown run, a run that
    /// is not PENDING, or one that is already executing in this engine. A run
    /// whose recorder fails mid-way is still marked FAILED when the recorder
    /// accepts that update.
    pub async fn execute(&self, run_id: Uuid, graph: &PipelineGraph) -> Result<RunRecord, AppError> {
        let _guard = self.claim(run_id)?;

        let record = self.inner.recorder.load(run_id).await?.ok_or_else(|| {
            run_error(format!("run {} does not exist", run_id)).with_code("ETL-RUN-001")
        })?;
        if record.status != RunStatus::Pending {
            return Err(run_error(format!(
                "run {} is {} and cannot be executed again",
                run_id, record.status
            ))
            .with_code("ETL-RUN-002"));
        }

        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        self.drive(run_id, graph).instrument(span).await
    }

    fn claim(&self, run_id: Uuid) -> Result<ActiveRun<'_>, AppError> {
        match self.inner.active.entry(run_id) {
            Entry::Occupied(_) => Err(run_error(format!("run {} is already executing", run_id))
                .with_code("ETL-RUN-002")),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Ok(ActiveRun {
                    active: &self.inner.active,
                    run_id,
                })
            }
        }
    }

    async fn append(&self, run_id: Uuid, entry: RunLogEntry) -> Result<(), AppError> {
        self.inner.recorder.append(run_id, entry).await?;
        Ok(())
    }

    async fn fail(&self, run_id: Uuid, message: String) -> Result<RunRecord, AppError> {
        tracing::error!(%run_id, error = %message, "pipeline run failed");
        let record = self
            .inner
            .recorder
            .set_status(
                run_id,
                StatusUpdate::Failed {
                    error_message: message,
                },
            )
            .await?;
        Ok(record)
    }

    /// Runs the pipeline steps. When they stop with an error, the record is still
    /// moved to FAILED (best effort) so no run is left RUNNING.
    async fn drive(&self, run_id: Uuid, graph: &PipelineGraph) -> Result<RunRecord, AppError> {
        match self.drive_steps(run_id, graph).await {
            Ok(record) => Ok(record),
            Err(err) => {
                self.abandon(run_id, &err).await;
                Err(err)
            }
        }
    }

    async fn abandon(&self, run_id: Uuid, err: &AppError) {
        tracing::error!(%run_id, code = %err.code, error = %err, "pipeline run aborted");
        let update = StatusUpdate::Failed {
            error_message: err.user_message(),
        };
        if let Err(status_err) = self.inner.recorder.set_status(run_id, update).await {
            tracing::warn!(%run_id, error = %status_err, "could not mark aborted run as failed");
        }
    }

    async fn drive_steps(&self, run_id: Uuid, graph: &PipelineGraph) -> Result<RunRecord, AppError> {
        let settings = &self.inner.settings;
        self.inner
            .recorder
            .set_status(run_id, StatusUpdate::Running)
            .await?;
        self.append(run_id, RunLogEntry::info("Starting pipeline execution"))
            .await?;

        if settings.validate {
            let report = validate_graph(
                graph,
                &ValidationSettings {
                    large_graph_threshold: settings.large_graph_threshold,
                },
            );
            for warning in &report.warnings {
                self.append(run_id, RunLogEntry::warning(warning.clone()))
                    .await?;
            }
            if !report.valid {
                for error in &report.errors {
                    self.append(run_id, RunLogEntry::error(error.clone())).await?;
                }
                let message = format!("Pipeline validation failed: {}", report.errors.join("; "));
                return self.fail(run_id, message).await;
            }
        }

        match tokio::time::timeout(settings.timeout, self.run_nodes(run_id, graph)).await {
            Ok(Ok(outputs)) => {
                let result_location = outputs.last().cloned();
                self.append(
                    run_id,
                    RunLogEntry::info(format!(
                        "Pipeline completed successfully. Output: {}",
                        result_location.as_deref().unwrap_or("none")
                    )),
                )
                .await?;
                tracing::info!(%run_id, outputs = outputs.len(), "pipeline run succeeded");
                let record = self
                    .inner
                    .recorder
                    .set_status(
                        run_id,
                        StatusUpdate::Succeeded {
                            result_location,
                            outputs,
                        },
                    )
                    .await?;
                Ok(record)
            }
            Ok(Err(Halt::Failed(message))) => self.fail(run_id, message).await,
            Ok(Err(Halt::Infra(err))) => Err(err),
            Err(_) => {
                let err = AppError::new(
                    ErrorCategory::TimeoutError,
                    format!(
                        "Pipeline exceeded timeout of {}",
                        humantime::format_duration(settings.timeout)
                    ),
                )
                .with_code("ETL-TIME-001");
                self.append(run_id, RunLogEntry::error(err.message.clone()))
                    .await?;
                self.fail(run_id, err.user_message()).await
            }
        }
    }

    /// Execute every node in order. Returns the LOAD locations in execution order.
    async fn run_nodes(&self, run_id: Uuid, graph: &PipelineGraph) -> Result<Vec<String>, Halt> {
        let order = match schedule(graph) {
            Ok(order) => order,
            Err(err) => {
                let err = AppError::from(err);
                self.append(run_id, RunLogEntry::error(err.message.clone()))
                    .await?;
                return Err(Halt::Failed(err.user_message()));
            }
        };
        tracing::debug!(order = ?order, "execution order");

        let mut context = ExecutionContext::new();
        let mut outputs = Vec::new();
        for node_id in &order {
            let Some(node) = graph.node(node_id) else {
                continue;
            };
            let span = tracing::info_span!("node", node_id = %node.id, subtype = %node.subtype);
            let result = self
                .run_node(node, graph, &context)
                .instrument(span)
                .await;

            match result {
                Ok(outcome) => {
                    let entry = RunLogEntry::info(outcome.message)
                        .for_node(&node.id)
                        .with_rows(outcome.rows_in, Some(outcome.table.row_count() as u64));
                    self.append(run_id, entry).await?;
                    // only LOAD outcomes carry a location; sinks store no table
                    match outcome.location {
                        Some(location) => outputs.push(location),
                        None => {
                            context.insert(node.id.clone(), outcome.table);
                        }
                    }
                }
                Err(err) if err.category == ErrorCategory::RecorderError => {
                    return Err(Halt::Infra(err));
                }
                Err(err) => {
                    let cause = err.user_message();
                    tracing::error!(node_id = %node.id, code = %err.code, error = %cause, "Node execution failed");
                    self.append(
                        run_id,
                        RunLogEntry::error(format!("Node execution failed: {}", cause))
                            .for_node(&node.id),
                    )
                    .await?;
                    return Err(Halt::Failed(format!(
                        "Node '{}' ({}) failed: {}",
                        node.id,
                        node.subtype.to_ascii_uppercase(),
                        cause
                    )));
                }
            }
        }
        Ok(outputs)
    }

    async fn run_node(
        &self,
        node: &Node,
        graph: &PipelineGraph,
        context: &ExecutionContext,
    ) -> Result<NodeOutcome, AppError> {
        let subtype = NodeSubtype::parse(&node.subtype).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("unknown node subtype '{}'", node.subtype),
            )
            .with_code("ETL-CFG-005")
        })?;
        if subtype.kind() != node.kind {
            return Err(run_error(format!(
                "{} is a {} subtype but the node is declared as {}",
                subtype,
                subtype.kind(),
                node.kind
            ))
            .with_code("ETL-RUN-003"));
        }
        let config = NodeConfig::parse(subtype, &node.config)?;
        let inputs = resolve_inputs(node, subtype, &config, graph, context)?;
        let rows_in: u64 = inputs.iter().map(|table| table.row_count() as u64).sum();

        let outcome = match config {
            NodeConfig::Source(cfg) => {
                let table = self.inner.reader.read(&cfg).await?;
                NodeOutcome {
                    message: format!("Loaded {} rows", table.row_count()),
                    table: Arc::new(table),
                    rows_in: None,
                    location: None,
                }
            }
            NodeConfig::Transform(cfg) => {
                let worker_inputs = inputs.clone();
                let output =
                    tokio::task::spawn_blocking(move || transforms::apply(&cfg, &worker_inputs))
                        .await
                        .map_err(|err| {
                            AppError::new(
                                ErrorCategory::InternalError,
                                format!("transform worker stopped: {}", err),
                            )
                            .with_code("ETL-RUN-005")
                        })??;
                NodeOutcome {
                    table: Arc::new(output.table),
                    message: output.message,
                    rows_in: Some(rows_in),
                    location: None,
                }
            }
            NodeConfig::Load(cfg) => {
                let table = inputs.into_iter().next().ok_or_else(|| {
                    run_error("LOAD node has no input table").with_code("ETL-RUN-003")
                })?;
                let location = self.inner.writer.write(&table, &cfg).await?;
                NodeOutcome {
                    message: load_message(&cfg, table.row_count()),
                    table,
                    rows_in: Some(rows_in),
                    location: Some(location),
                }
            }
        };
        tracing::debug!(rows_in, rows_out = outcome.table.row_count(), "node finished");
        Ok(outcome)
    }
}

fn load_message(config: &SinkConfig, rows: usize) -> String {
    match config {
        SinkConfig::Csv(_) => format!("Wrote {} rows to CSV", rows),
        SinkConfig::Excel(_) => format!("Wrote {} rows to Excel", rows),
        SinkConfig::Json(_) => format!("Wrote {} rows to JSON", rows),
        SinkConfig::Database(cfg) => {
            format!("Wrote {} rows to database table '{}'", rows, cfg.table_name)
        }
        SinkConfig::Api(_) => format!("Sent {} rows to API endpoint", rows),
    }
}

/// Upstream tables in incoming-edge declaration order. A JOIN with
/// `right_node_id` takes that upstream as its right-hand input.
fn resolve_inputs(
    node: &Node,
    subtype: NodeSubtype,
    config: &NodeConfig,
    graph: &PipelineGraph,
    context: &ExecutionContext,
) -> Result<Vec<Arc<Table>>, AppError> {
    let mut upstream: Vec<&str> = graph.incoming(&node.id).map(|edge| edge.from.as_str()).collect();
    if let NodeConfig::Transform(TransformConfig::Join(join)) = config {
        if let Some(right) = join.right_node_id.as_deref() {
            if let Some(pos) = upstream.iter().position(|id| *id == right) {
                let id = upstream.remove(pos);
                upstream.push(id);
            }
        }
    }

    let expected = subtype.arity().count();
    if upstream.len() != expected {
        return Err(run_error(format!(
            "{} expects {} input(s) but has {} incoming edge(s)",
            subtype,
            expected,
            upstream.len()
        ))
        .with_code("ETL-RUN-003")
        .with_node(&node.id));
    }
    upstream
        .into_iter()
        .map(|id| context.require(id, &node.id))
        .collect()
}

/// A run executing on a background task.
pub struct RunHandle {
    record: RunRecord,
    recorder: Arc<dyn RunRecorder>,
    task: JoinHandle<Result<RunRecord, AppError>>,
}

impl RunHandle {
    /// The record as it was when the run was triggered (PENDING).
    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn run_id(&self) -> Uuid {
        self.record.id
    }

    /// Current status as seen by the recorder.
    pub async fn status(&self) -> Result<RunStatus, AppError> {
        let record = self.recorder.load(self.record.id).await?;
        Ok(record.map_or(self.record.status, |record| record.status))
    }

    pub async fn wait(self) -> Result<RunRecord, AppError> {
        self.task.await.map_err(|err| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("run task stopped: {}", err),
            )
            .with_code("ETL-RUN-006")
        })?
    }
}
