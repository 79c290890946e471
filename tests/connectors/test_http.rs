use aed::core::connectors::{Connectors, ReadError, StorageSettings, TableReader, TableWriter, WriteError};
use aed::core::pipeline::node_config::{NodeConfig, SinkConfig, SourceConfig};
use aed::core::pipeline::NodeSubtype;
use aed::core::table::{Table, Value};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_source(raw: serde_json::Value) -> SourceConfig {
    match NodeConfig::parse(NodeSubtype::ApiSource, &raw).unwrap() {
        NodeConfig::Source(config) => config,
        other => panic!("not a source config: {:?}", other),
    }
}

fn api_sink(raw: serde_json::Value) -> SinkConfig {
    match NodeConfig::parse(NodeSubtype::ApiLoad, &raw).unwrap() {
        NodeConfig::Load(config) => config,
        other => panic!("not a load config: {:?}", other),
    }
}

#[tokio::test]
async fn test_get_with_params_headers_and_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("active", "true"))
        .and(query_param("limit", "2"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 1, "name": "ann"},
                {"id": 2, "name": "bob"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connectors = Connectors::new(StorageSettings::default());
    let table = connectors
        .read(&api_source(json!({
            "endpoint": format!("{}/users", server.uri()),
            "headers": {"x-api-key": "secret"},
            "params": {"active": true, "limit": 2}
        })))
        .await
        .unwrap();

    assert_eq!(table.columns(), &["id", "name"]);
    assert_eq!(table.cell(1, "name"), Some(&Value::from("bob")));
}

#[tokio::test]
async fn test_post_sink_sends_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .and(body_json(json!([{"id": 1, "ok": true}])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = format!("{}/ingest", server.uri());
    let table = Table::from_json_rows(&["id", "ok"], vec![vec![json!(1), json!(true)]]).unwrap();
    let connectors = Connectors::new(StorageSettings::default());
    let location = connectors
        .write(&table, &api_sink(json!({"endpoint": endpoint})))
        .await
        .unwrap();

    assert_eq!(location, format!("api://{}", endpoint));
}

#[tokio::test]
async fn test_server_errors_are_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let connectors = Connectors::new(StorageSettings::default());
    let err = connectors
        .read(&api_source(json!({"endpoint": server.uri()})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::Transport(_)), "got {:?}", err);

    let table = Table::empty(vec!["id".to_string()]);
    let err = connectors
        .write(
            &table,
            &api_sink(json!({"endpoint": server.uri(), "method": "put"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WriteError::Transport(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let connectors = Connectors::new(StorageSettings::default());
    let err = connectors
        .read(&api_source(json!({"endpoint": server.uri()})))
        .await
        .unwrap_err();
    assert!(matches!(err, ReadError::Malformed(_)), "got {:?}", err);
}
