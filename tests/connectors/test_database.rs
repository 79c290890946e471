use aed::core::connectors::{Connectors, ReadError, StorageSettings, TableReader, TableWriter, WriteError};
use aed::core::pipeline::node_config::{NodeConfig, SinkConfig, SourceConfig};
use aed::core::pipeline::NodeSubtype;
use aed::core::table::{Table, Value};
use serde_json::json;
use tempfile::TempDir;

fn parse(subtype: &str, raw: serde_json::Value) -> NodeConfig {
    NodeConfig::parse(NodeSubtype::parse(subtype).unwrap(), &raw).unwrap()
}

fn db_source(url: &str, raw: serde_json::Value) -> SourceConfig {
    let mut raw = raw;
    raw["connection_string"] = json!(url);
    match parse("DB_SOURCE", raw) {
        NodeConfig::Source(config) => config,
        other => panic!("not a source config: {:?}", other),
    }
}

fn db_sink(url: &str, table: &str, if_exists: &str) -> SinkConfig {
    let raw = json!({
        "connection_string": url,
        "table_name": table,
        "if_exists": if_exists,
    });
    match parse("DB_LOAD", raw) {
        NodeConfig::Load(config) => config,
        other => panic!("not a load config: {:?}", other),
    }
}

fn orders() -> Table {
    Table::from_json_rows(
        &["id", "item", "price"],
        vec![
            vec![json!(1), json!("tea"), json!(2.5)],
            vec![json!(2), json!("cake"), serde_json::Value::Null],
        ],
    )
    .unwrap()
}

fn database_url(temp: &TempDir) -> String {
    format!("sqlite://{}", temp.path().join("shop.db").display())
}

#[tokio::test]
async fn test_write_then_read_table() {
    let temp = TempDir::new().unwrap();
    let url = database_url(&temp);
    let connectors = Connectors::new(StorageSettings::default());

    let location = connectors
        .write(&orders(), &db_sink(&url, "orders", "replace"))
        .await
        .unwrap();
    assert_eq!(location, "database://orders");

    let table = connectors
        .read(&db_source(&url, json!({"table_name": "orders"})))
        .await
        .unwrap();
    assert_eq!(table, orders());
}

#[tokio::test]
async fn test_if_exists_modes() {
    let temp = TempDir::new().unwrap();
    let url = database_url(&temp);
    let connectors = Connectors::new(StorageSettings::default());

    connectors
        .write(&orders(), &db_sink(&url, "orders", "replace"))
        .await
        .unwrap();
    connectors
        .write(&orders(), &db_sink(&url, "orders", "append"))
        .await
        .unwrap();
    let count = connectors
        .read(&db_source(
            &url,
            json!({"query": "SELECT COUNT(*) AS n FROM orders"}),
        ))
        .await
        .unwrap();
    assert_eq!(count.cell(0, "n"), Some(&Value::Int(4)));

    connectors
        .write(&orders(), &db_sink(&url, "orders", "replace"))
        .await
        .unwrap();
    let replaced = connectors
        .read(&db_source(&url, json!({"table_name": "orders"})))
        .await
        .unwrap();
    assert_eq!(replaced.row_count(), 2);

    let err = connectors
        .write(&orders(), &db_sink(&url, "orders", "fail"))
        .await
        .unwrap_err();
    assert!(matches!(err, WriteError::AlreadyExists(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_query_projection_and_missing_table() {
    let temp = TempDir::new().unwrap();
    let url = database_url(&temp);
    let connectors = Connectors::new(StorageSettings::default());
    connectors
        .write(&orders(), &db_sink(&url, "orders", "replace"))
        .await
        .unwrap();

    let table = connectors
        .read(&db_source(
            &url,
            json!({"query": "SELECT item FROM orders WHERE id = 2"}),
        ))
        .await
        .unwrap();
    assert_eq!(table.columns(), &["item"]);
    assert_eq!(table.rows(), &[vec![Value::from("cake")]]);

    let err = connectors
        .read(&db_source(&url, json!({"table_name": "missing"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unknown_scheme_is_unsupported() {
    let connectors = Connectors::new(StorageSettings::default());
    let err = connectors
        .read(&db_source("mssql://localhost/shop", json!({"table_name": "orders"})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::UnsupportedFormat(_)), "got {:?}", err);

    let err = connectors
        .write(&orders(), &db_sink("oracle://localhost/shop", "orders", "replace"))
        .await
        .unwrap_err();
    assert!(matches!(err, WriteError::UnsupportedFormat(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_server_is_transport_failure() {
    let connectors = Connectors::new(StorageSettings::default());
    let err = connectors
        .read(&db_source(
            "postgres://aed@127.0.0.1:1/shop",
            json!({"table_name": "orders"}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::Transport(_)), "got {:?}", err);

    let err = connectors
        .write(&orders(), &db_sink("mysql://aed@127.0.0.1:1/shop", "orders", "append"))
        .await
        .unwrap_err();
    assert!(matches!(err, WriteError::Transport(_)), "got {:?}", err);
}
