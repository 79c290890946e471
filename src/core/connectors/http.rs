use super::files::records_table;
use super::{ReadError, WriteError};
use crate::core::pipeline::node_config::{ApiSinkConfig, ApiSourceConfig};
use crate::core::table::Table;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

fn method(name: &str) -> Result<Method, String> {
    Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method '{}'", name))
}

fn with_headers(mut request: RequestBuilder, headers: &BTreeMap<String, String>) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn query_pairs(params: &BTreeMap<String, JsonValue>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let text = match value {
                JsonValue::String(s) => s.clone(),
                JsonValue::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

pub(super) async fn fetch_table(client: &Client, config: &ApiSourceConfig) -> Result<Table, ReadError> {
    let method = method(&config.method).map_err(ReadError::Malformed)?;
    let request = client
        .request(method, config.endpoint.as_str())
        .query(&query_pairs(&config.params));
    let response = with_headers(request, &config.headers)
        .send()
        .await
        .map_err(|err| ReadError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ReadError::Transport(format!(
            "{} returned HTTP {}",
            config.endpoint, status
        )));
    }
    let body: JsonValue = response
        .json()
        .await
        .map_err(|err| ReadError::Malformed(err.to_string()))?;
    let table = records_table(body)?;
    tracing::debug!(endpoint = %config.endpoint, rows = table.row_count(), "read api source");
    Ok(table)
}

pub(super) async fn send_table(
    client: &Client,
    table: &Table,
    config: &ApiSinkConfig,
) -> Result<String, WriteError> {
    let method = method(&config.method).map_err(WriteError::Unwritable)?;
    let request = client
        .request(method, config.endpoint.as_str())
        .json(&table.to_records());
    let response = with_headers(request, &config.headers)
        .send()
        .await
        .map_err(|err| WriteError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(WriteError::Transport(format!(
            "{} returned HTTP {}",
            config.endpoint, status
        )));
    }
    tracing::debug!(endpoint = %config.endpoint, rows = table.row_count(), "sent records to api");
    Ok(format!("api://{}", config.endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_render_scalars_plainly() {
        let mut params = BTreeMap::new();
        params.insert("q".to_string(), json!("rust"));
        params.insert("limit".to_string(), json!(10));
        assert_eq!(
            query_pairs(&params),
            vec![
                ("limit".to_string(), "10".to_string()),
                ("q".to_string(), "rust".to_string())
            ]
        );
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(method("post").unwrap(), Method::POST);
        assert!(method("GE T").is_err());
    }
}
