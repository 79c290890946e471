use super::{ReadError, WriteError};
use crate::core::pipeline::node_config::FileSourceConfig;
use crate::core::table::{Table, Value};
use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::path::Path;

/// Keep only the final path segment and replace anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("");
    if base == "." || base == ".." {
        return String::new();
    }
    base.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn delimiter_byte(config: &FileSourceConfig) -> Result<u8, ReadError> {
    match config.delimiter.as_deref() {
        None | Some("") => Ok(b','),
        Some("\\t") | Some("\t") => Ok(b'\t'),
        Some(d) if d.len() == 1 && d.is_ascii() => Ok(d.as_bytes()[0]),
        Some(d) => Err(ReadError::Malformed(format!(
            "delimiter must be a single ASCII character, got '{}'",
            d
        ))),
    }
}

fn check_encoding(config: &FileSourceConfig) -> Result<(), ReadError> {
    match config.encoding.as_deref().map(str::to_ascii_lowercase) {
        None => Ok(()),
        Some(enc) if enc == "utf-8" || enc == "utf8" || enc == "utf-8-sig" => Ok(()),
        Some(enc) => Err(ReadError::UnsupportedFormat(format!(
            "encoding '{}' (only utf-8 is supported)",
            enc
        ))),
    }
}

/// Typed column from raw CSV cells: int, then float, then bool, else text.
/// Empty cells are null and do not influence the chosen type.
fn infer_column(cells: Vec<String>) -> Vec<Value> {
    let present = || cells.iter().filter(|cell| !cell.trim().is_empty());
    let parse_bool = |cell: &str| match cell.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    };

    let convert: Box<dyn Fn(&str) -> Value> =
        if present().all(|cell| cell.trim().parse::<i64>().is_ok()) {
            Box::new(|cell: &str| cell.trim().parse::<i64>().map(Value::Int).unwrap_or_default())
        } else if present().all(|cell| cell.trim().parse::<f64>().is_ok()) {
            Box::new(|cell: &str| cell.trim().parse::<f64>().map(Value::Float).unwrap_or_default())
        } else if present().all(|cell| parse_bool(cell).is_some()) {
            Box::new(move |cell: &str| parse_bool(cell).map(Value::Bool).unwrap_or_default())
        } else {
            Box::new(|cell: &str| Value::Str(cell.to_string()))
        };

    cells
        .iter()
        .map(|cell| {
            if cell.trim().is_empty() {
                Value::Null
            } else {
                convert(cell)
            }
        })
        .collect()
}

pub(super) fn parse_csv(bytes: &[u8], config: &FileSourceConfig) -> Result<Table, ReadError> {
    check_encoding(config)?;
    let text = std::str::from_utf8(bytes)
        .map_err(|err| ReadError::Malformed(format!("input is not valid utf-8: {}", err)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter_byte(config)?)
        .from_reader(text.as_bytes());
    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| ReadError::Malformed(err.to_string()))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); columns.len()];
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| ReadError::Malformed(err.to_string()))?;
        if record.len() != columns.len() {
            return Err(ReadError::Malformed(format!(
                "row {} has {} fields, expected {}",
                line + 1,
                record.len(),
                columns.len()
            )));
        }
        for (column, field) in raw_columns.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let row_count = raw_columns.first().map_or(0, Vec::len);
    let typed: Vec<Vec<Value>> = raw_columns.into_iter().map(infer_column).collect();
    let rows = (0..row_count)
        .map(|row| typed.iter().map(|column| column[row].clone()).collect())
        .collect();
    Table::new(columns, rows).map_err(|err| ReadError::Malformed(err.message))
}

pub(super) async fn read_csv(path: &Path, config: &FileSourceConfig) -> Result<Table, ReadError> {
    let bytes = read_bytes(path).await?;
    let table = parse_csv(&bytes, config)?;
    tracing::debug!(path = %path.display(), rows = table.row_count(), "read csv source");
    Ok(table)
}

pub(super) fn parse_json(bytes: &[u8]) -> Result<Table, ReadError> {
    let document: JsonValue =
        serde_json::from_slice(bytes).map_err(|err| ReadError::Malformed(err.to_string()))?;
    records_table(document)
}

/// Table from a list of JSON records, a `{"data": [...]}` envelope or a single object.
pub(super) fn records_table(document: JsonValue) -> Result<Table, ReadError> {
    let items = match document {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut map) => match map.remove("data") {
            Some(JsonValue::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![JsonValue::Object(map)],
        },
        other => {
            return Err(ReadError::Malformed(format!(
                "expected a list of records, found {}",
                json_kind(&other)
            )))
        }
    };

    let records = items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            JsonValue::Object(map) => Ok(map.into_iter().collect::<IndexMap<_, _>>()),
            other => Err(ReadError::Malformed(format!(
                "record {} is {}, expected an object",
                idx,
                json_kind(&other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::from_records(&records))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}

pub(super) async fn read_json(path: &Path) -> Result<Table, ReadError> {
    let bytes = read_bytes(path).await?;
    let table = parse_json(&bytes)?;
    tracing::debug!(path = %path.display(), rows = table.row_count(), "read json source");
    Ok(table)
}

pub(super) async fn read_bytes(path: &Path) -> Result<Vec<u8>, ReadError> {
    tokio::fs::read(path).await.map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => ReadError::NotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => {
            ReadError::Forbidden(format!("{}: {}", path.display(), err))
        }
        _ => ReadError::Malformed(format!("{}: {}", path.display(), err)),
    })
}

pub(super) fn render_csv(table: &Table) -> Result<Vec<u8>, WriteError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    let unwritable = |err: csv::Error| WriteError::Unwritable(err.to_string());
    writer.write_record(table.columns()).map_err(unwritable)?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(Value::render))
            .map_err(unwritable)?;
    }
    writer
        .into_inner()
        .map_err(|err| WriteError::Unwritable(err.to_string()))
}

pub(super) async fn write_csv(table: &Table, path: &Path) -> Result<String, WriteError> {
    let bytes = render_csv(table)?;
    write_bytes(path, &bytes).await
}

pub(super) async fn write_json(table: &Table, path: &Path) -> Result<String, WriteError> {
    let bytes = serde_json::to_vec_pretty(&table.to_records())
        .map_err(|err| WriteError::Unwritable(err.to_string()))?;
    write_bytes(path, &bytes).await
}

pub(super) async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<String, WriteError> {
    let unwritable =
        |err: std::io::Error| WriteError::Unwritable(format!("{}: {}", path.display(), err));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(unwritable)?;
    }
    tokio::fs::write(path, bytes).await.map_err(unwritable)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote output file");
    Ok(path.display().to_string())
}
