use aed::core::connectors::{Connectors, ReadError, StorageSettings, TableReader, TableWriter};
use aed::core::pipeline::node_config::{NodeConfig, SinkConfig, SourceConfig};
use aed::core::pipeline::NodeSubtype;
use aed::core::table::{Table, Value};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn source(subtype: &str, raw: serde_json::Value) -> SourceConfig {
    match NodeConfig::parse(NodeSubtype::parse(subtype).unwrap(), &raw).unwrap() {
        NodeConfig::Source(config) => config,
        other => panic!("not a source config: {:?}", other),
    }
}

fn sink(subtype: &str, raw: serde_json::Value) -> SinkConfig {
    match NodeConfig::parse(NodeSubtype::parse(subtype).unwrap(), &raw).unwrap() {
        NodeConfig::Load(config) => config,
        other => panic!("not a load config: {:?}", other),
    }
}

fn connectors(temp: &TempDir, restrict_inputs: bool) -> Connectors {
    let storage = StorageSettings {
        input_dir: temp.path().join("uploads"),
        output_dir: temp.path().join("outputs"),
        restrict_inputs,
    };
    fs::create_dir_all(&storage.input_dir).unwrap();
    Connectors::new(storage)
}

#[tokio::test]
async fn test_csv_source_infers_column_types() {
    let temp = TempDir::new().unwrap();
    let connectors = connectors(&temp, false);
    fs::write(
        temp.path().join("uploads/people.csv"),
        "name,age,score\nann,36,1.5\nbob,,2\n",
    )
    .unwrap();

    let table = connectors
        .read(&source("CSV_SOURCE", json!({"file_path": "people.csv"})))
        .await
        .unwrap();

    assert_eq!(table.columns(), &["name", "age", "score"]);
    assert_eq!(
        table.rows(),
        &[
            vec![Value::from("ann"), Value::Int(36), Value::Float(1.5)],
            vec![Value::from("bob"), Value::Null, Value::Float(2.0)],
        ]
    );
}

#[tokio::test]
async fn test_csv_and_json_outputs_read_back() {
    let temp = TempDir::new().unwrap();
    let connectors = connectors(&temp, false);
    let table = Table::from_json_rows(
        &["id", "city"],
        vec![
            vec![json!(1), json!("Oslo")],
            vec![json!(2), serde_json::Value::Null],
        ],
    )
    .unwrap();

    let csv_location = connectors
        .write(&table, &sink("CSV_LOAD", json!({"output_path": "cities.csv"})))
        .await
        .unwrap();
    assert!(csv_location.ends_with("cities.csv"));
    let from_csv = connectors
        .read(&source("CSV_SOURCE", json!({"file_path": csv_location})))
        .await
        .unwrap();
    assert_eq!(from_csv, table);

    let json_location = connectors
        .write(&table, &sink("JSON_LOAD", json!({"output_path": "cities.json"})))
        .await
        .unwrap();
    let from_json = connectors
        .read(&source("JSON_SOURCE", json!({"file_path": json_location})))
        .await
        .unwrap();
    assert_eq!(from_json, table);
}

#[tokio::test]
async fn test_output_path_cannot_escape_output_dir() {
    let temp = TempDir::new().unwrap();
    let connectors = connectors(&temp, false);
    let table = Table::from_json_rows(&["a"], vec![vec![json!(1)]]).unwrap();

    let location = connectors
        .write(&table, &sink("CSV_LOAD", json!({"output_path": "../../escape.csv"})))
        .await
        .unwrap();

    assert!(temp.path().join("outputs/escape.csv").exists());
    assert!(location.ends_with("escape.csv"));
    assert!(!temp.path().join("escape.csv").exists());
}

#[tokio::test]
async fn test_restricted_inputs_are_forbidden_outside_uploads() {
    let temp = TempDir::new().unwrap();
    let connectors = connectors(&temp, true);
    fs::write(temp.path().join("secret.csv"), "a\n1\n").unwrap();

    let err = connectors
        .read(&source("CSV_SOURCE", json!({"file_path": "../secret.csv"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::Forbidden(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_missing_files_are_not_found() {
    let temp = TempDir::new().unwrap();
    let connectors = connectors(&temp, false);

    let err = connectors
        .read(&source("JSON_SOURCE", json!({"file_path": "absent.json"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::NotFound(_)));

    let err = connectors
        .read(&source("EXCEL_SOURCE", json!({"file_path": "book.xlsx"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::NotFound(_)));
}

#[tokio::test]
async fn test_excel_written_output_reads_back() {
    let temp = TempDir::new().unwrap();
    let connectors = connectors(&temp, false);
    let table = Table::new(
        vec!["name".into(), "qty".into(), "price".into(), "active".into()],
        vec![
            vec![Value::from("ann"), Value::Int(3), Value::Float(2.5), Value::Bool(true)],
            vec![Value::from("bob"), Value::Null, Value::Float(4.0), Value::Bool(false)],
        ],
    )
    .unwrap();

    let location = connectors
        .write(&table, &sink("EXCEL_LOAD", json!({"output_path": "report.xlsx"})))
        .await
        .unwrap();
    assert!(location.ends_with("report.xlsx"));
    fs::copy(&location, temp.path().join("uploads/report.xlsx")).unwrap();

    for sheet in [json!(null), json!(0), json!("Sheet1")] {
        let read = connectors
            .read(&source(
                "EXCEL_SOURCE",
                json!({"file_path": "report.xlsx", "sheet_name": sheet}),
            ))
            .await
            .unwrap();
        assert_eq!(read, table, "sheet_name {}", sheet);
    }

    let err = connectors
        .read(&source(
            "EXCEL_SOURCE",
            json!({"file_path": "report.xlsx", "sheet_name": "Totals"}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_json_envelope_source() {
    let temp = TempDir::new().unwrap();
    let connectors = connectors(&temp, false);
    fs::write(
        temp.path().join("uploads/wrapped.json"),
        r#"{"data": [{"id": 1, "tag": "a"}, {"id": 2}]}"#,
    )
    .unwrap();

    let table = connectors
        .read(&source("JSON_SOURCE", json!({"file_path": "wrapped.json"})))
        .await
        .unwrap();
    assert_eq!(table.columns(), &["id", "tag"]);
    assert_eq!(table.cell(1, "tag"), Some(&Value::Null));
}
