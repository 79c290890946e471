use aed::core::connectors::{
    Connectors, ReadError, StorageSettings, TableReader, TableWriter, WriteError,
};
use aed::core::pipeline::node_config::{SinkConfig, SourceConfig};
use aed::core::pipeline::{EngineSettings, PipelineEngine};
use aed::core::table::Table;
use aed::core::types::ErrorCategory;
use aed_backend::{MemoryRunRecorder, RecorderError, RunRecorder, SqliteRunRecorder};
use aed_types::{
    Edge, LogLevel, Node, NodeKind, PipelineGraph, RunLogEntry, RunRecord, RunStatus,
    StatusUpdate,
};
use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

/// Serves a fixed table for every CSV source; any other source is missing.
struct StaticReader;

#[async_trait]
impl TableReader for StaticReader {
    async fn read(&self, config: &SourceConfig) -> Result<Table, ReadError> {
        match config {
            SourceConfig::Csv(_) => Ok(Table::from_json_rows(
                &["region", "units"],
                vec![
                    vec![json!("north"), json!(3)],
                    vec![json!("south"), json!(4)],
                    vec![json!("north"), json!(5)],
                ],
            )
            .unwrap()),
            _ => Err(ReadError::NotFound("no such source".to_string())),
        }
    }
}

#[derive(Default)]
struct RecordingWriter {
    writes: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl TableWriter for RecordingWriter {
    async fn write(&self, table: &Table, config: &SinkConfig) -> Result<String, WriteError> {
        let target = match config {
            SinkConfig::Csv(cfg) | SinkConfig::Json(cfg) => cfg.output_path.clone(),
            _ => "elsewhere".to_string(),
        };
        self.writes
            .lock()
            .unwrap()
            .push((target.clone(), table.row_count()));
        Ok(target)
    }
}

/// Memory recorder whose `append` starts failing from the given call onwards.
struct FailingAppends {
    inner: MemoryRunRecorder,
    appends: AtomicUsize,
    fail_from: usize,
}

impl FailingAppends {
    fn new(fail_from: usize) -> Self {
        Self {
            inner: MemoryRunRecorder::new(),
            appends: AtomicUsize::new(0),
            fail_from,
        }
    }
}

#[async_trait]
impl RunRecorder for FailingAppends {
    async fn create(&self, record: &RunRecord) -> Result<(), RecorderError> {
        self.inner.create(record).await
    }

    async fn append(&self, run_id: Uuid, entry: RunLogEntry) -> Result<(), RecorderError> {
        let call = self.appends.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from {
            return Err(RecorderError::Storage("disk full".to_string()));
        }
        self.inner.append(run_id, entry).await
    }

    async fn set_status(
        &self,
        run_id: Uuid,
        update: StatusUpdate,
    ) -> Result<RunRecord, RecorderError> {
        self.inner.set_status(run_id, update).await
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<RunRecord>, RecorderError> {
        self.inner.load(run_id).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<RunRecord>, RecorderError> {
        self.inner.list(limit).await
    }
}

fn totals_graph(output: &str) -> PipelineGraph {
    PipelineGraph::new(
        vec![
            Node::new("src", NodeKind::Source, "CSV_SOURCE", json!({"file_path": "units.csv"})),
            Node::new(
                "totals",
                NodeKind::Transform,
                "AGGREGATE",
                json!({
                    "group_by": "region",
                    "aggregations": [{"column": "units", "agg": "sum"}]
                }),
            ),
            Node::new("out", NodeKind::Load, "CSV_LOAD", json!({"output_path": output})),
        ],
        vec![Edge::new("src", "totals"), Edge::new("totals", "out")],
    )
}

fn engine() -> (PipelineEngine, Arc<RecordingWriter>) {
    let writer = Arc::new(RecordingWriter::default());
    let engine = PipelineEngine::new(
        Arc::new(StaticReader),
        writer.clone(),
        Arc::new(MemoryRunRecorder::new()),
        EngineSettings::default(),
    );
    (engine, writer)
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let (engine, writer) = engine();
    let first = engine.spawn(totals_graph("a.csv")).await.unwrap();
    let second = engine.spawn(totals_graph("b.csv")).await.unwrap();
    assert_ne!(first.run_id(), second.run_id());

    let first = first.wait().await.unwrap();
    let second = second.wait().await.unwrap();
    assert_eq!(first.status, RunStatus::Success);
    assert_eq!(second.status, RunStatus::Success);
    assert_eq!(first.result_location.as_deref(), Some("a.csv"));
    assert_eq!(second.result_location.as_deref(), Some("b.csv"));

    let mut writes = writer.writes.lock().unwrap().clone();
    writes.sort();
    assert_eq!(
        writes,
        vec![("a.csv".to_string(), 2), ("b.csv".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_failing_node_stops_downstream_loads() {
    let (engine, writer) = engine();
    let mut graph = totals_graph("never.csv");
    graph.nodes[1] = Node::new(
        "totals",
        NodeKind::Transform,
        "AGGREGATE",
        json!({
            "group_by": "region",
            "aggregations": [{"column": "region", "agg": "sum"}]
        }),
    );

    let record = engine.run(&graph).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    assert!(writer.writes.lock().unwrap().is_empty());
    let message = record.error_message.as_deref().unwrap();
    assert!(
        message.starts_with("Node 'totals' (AGGREGATE) failed: "),
        "unexpected message: {}",
        message
    );
    let failure = record
        .logs
        .iter()
        .find(|entry| entry.level == LogLevel::Error)
        .unwrap();
    assert_eq!(failure.node_id.as_deref(), Some("totals"));
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn test_invalid_graph_fails_before_any_node_runs() {
    let (engine, writer) = engine();
    let mut graph = totals_graph("out.csv");
    graph.nodes[2].config = json!({});

    let record = engine.run(&graph).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(
        record.error_message.as_deref(),
        Some("Pipeline validation failed: Node 'out': CSV_LOAD requires 'output_path'")
    );
    assert!(writer.writes.lock().unwrap().is_empty());
    assert!(record.logs.iter().all(|entry| entry.rows_out.is_none()));
}

#[tokio::test]
async fn test_join_reads_right_input_by_node_id() {
    let (engine, writer) = engine();
    let graph = PipelineGraph::new(
        vec![
            Node::new("left", NodeKind::Source, "CSV_SOURCE", json!({"file_path": "l.csv"})),
            Node::new(
                "regions",
                NodeKind::Transform,
                "AGGREGATE",
                json!({
                    "group_by": "region",
                    "aggregations": [{"column": "units", "agg": "count", "as": "orders"}]
                }),
            ),
            Node::new(
                "joined",
                NodeKind::Transform,
                "JOIN",
                json!({
                    "join_type": "inner",
                    "left_on": "region",
                    "right_on": "region",
                    "right_node_id": "regions"
                }),
            ),
            Node::new("out", NodeKind::Load, "JSON_LOAD", json!({"output_path": "joined.json"})),
        ],
        vec![
            Edge::new("regions", "joined"),
            Edge::new("left", "regions"),
            Edge::new("left", "joined"),
            Edge::new("joined", "out"),
        ],
    );

    let record = engine.run(&graph).await.unwrap();

    assert_eq!(record.status, RunStatus::Success, "{:?}", record.error_message);
    assert_eq!(
        *writer.writes.lock().unwrap(),
        vec![("joined.json".to_string(), 3)]
    );
}

#[tokio::test]
async fn test_end_to_end_with_files_and_sqlite_history() {
    let temp = TempDir::new().unwrap();
    let storage = StorageSettings {
        input_dir: temp.path().join("uploads"),
        output_dir: temp.path().join("outputs"),
        restrict_inputs: true,
    };
    fs::create_dir_all(&storage.input_dir).unwrap();
    fs::write(
        storage.input_dir.join("units.csv"),
        "region,units\nnorth,3\nsouth,4\nnorth,5\n",
    )
    .unwrap();

    let url = format!("sqlite://{}", temp.path().join("runs.db").display());
    let recorder = SqliteRunRecorder::connect(&url).await.unwrap();
    let engine = PipelineEngine::with_connectors(
        Connectors::new(storage),
        Arc::new(recorder),
        EngineSettings::default(),
    );

    let record = engine.run(&totals_graph("totals.csv")).await.unwrap();
    assert_eq!(record.status, RunStatus::Success, "{:?}", record.error_message);

    let written = fs::read_to_string(temp.path().join("outputs/totals.csv")).unwrap();
    assert_eq!(written, "region,units_sum\nnorth,8\nsouth,4\n");

    let stored = engine.recorder().load(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Success);
    assert_eq!(stored.logs.len(), record.logs.len());
    assert_eq!(stored.result_location, record.result_location);
    assert!(stored
        .logs
        .last()
        .unwrap()
        .message
        .starts_with("Pipeline completed successfully. Output: "));
}

#[tokio::test]
async fn test_recorder_failure_still_finishes_the_run() {
    let recorder = Arc::new(FailingAppends::new(2));
    let engine = PipelineEngine::new(
        Arc::new(StaticReader),
        Arc::new(RecordingWriter::default()),
        recorder.clone(),
        EngineSettings::default(),
    );
    let graph = totals_graph("totals.csv");
    let pending = engine.trigger(&graph).await.unwrap();

    let err = engine.execute(pending.id, &graph).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::RecorderError);

    let stored = recorder.load(pending.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(stored.finished_at.is_some());
    assert_eq!(
        stored.error_message.as_deref(),
        Some("recorder storage failure: disk full")
    );
}

#[tokio::test]
async fn test_load_output_is_not_an_upstream_table() {
    let writer = Arc::new(RecordingWriter::default());
    let engine = PipelineEngine::new(
        Arc::new(StaticReader),
        writer.clone(),
        Arc::new(MemoryRunRecorder::new()),
        EngineSettings {
            validate: false,
            ..EngineSettings::default()
        },
    );
    let graph = PipelineGraph::new(
        vec![
            Node::new("src", NodeKind::Source, "CSV_SOURCE", json!({"file_path": "units.csv"})),
            Node::new("first", NodeKind::Load, "CSV_LOAD", json!({"output_path": "first.csv"})),
            Node::new("regions", NodeKind::Transform, "SELECT", json!({"columns": ["region"]})),
            Node::new("second", NodeKind::Load, "CSV_LOAD", json!({"output_path": "second.csv"})),
        ],
        vec![
            Edge::new("src", "first"),
            Edge::new("first", "regions"),
            Edge::new("regions", "second"),
        ],
    );

    let record = engine.run(&graph).await.unwrap();

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(
        record.error_message.as_deref(),
        Some("Node 'regions' (SELECT) failed: upstream node 'first' produced no table for 'regions'")
    );
    assert_eq!(
        *writer.writes.lock().unwrap(),
        vec![("first.csv".to_string(), 3)]
    );
}
