use super::files::{read_bytes, write_bytes};
use super::{ReadError, WriteError};
use crate::core::pipeline::node_config::FileSourceConfig;
use crate::core::table::{parse_datetime, Table, Value};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::Value as JsonValue;
use std::io::Cursor;
use std::path::Path;

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Sheet to read: `sheet_name` may be a zero-based index or a sheet name.
/// Without one the first sheet is used.
fn pick_sheet(names: &[String], requested: Option<&JsonValue>) -> Result<String, ReadError> {
    let by_index = |idx: usize| {
        names.get(idx).cloned().ok_or_else(|| {
            ReadError::NotFound(format!(
                "sheet index {} (workbook has {} sheet(s))",
                idx,
                names.len()
            ))
        })
    };
    match requested {
        None | Some(JsonValue::Null) => by_index(0),
        Some(JsonValue::Number(n)) => match n.as_u64() {
            Some(idx) => by_index(idx as usize),
            None => Err(ReadError::Malformed(format!("invalid sheet index {}", n))),
        },
        Some(JsonValue::String(name)) => names
            .iter()
            .find(|candidate| *candidate == name)
            .cloned()
            .ok_or_else(|| ReadError::NotFound(format!("worksheet named '{}'", name))),
        Some(other) => Err(ReadError::Malformed(format!(
            "sheet_name must be a name or an index, got {}",
            other
        ))),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Str(s.clone()),
        Data::DateTime(dt) => dt.as_datetime().map_or(Value::Null, Value::DateTime),
        Data::DateTimeIso(text) => {
            parse_datetime(text, None).map_or_else(|| Value::Str(text.clone()), Value::DateTime)
        }
        Data::DurationIso(text) => Value::Str(text.clone()),
    }
}

/// Workbooks store every number as a double; a column whose numbers are all
/// integral reads back as integers, as CSV columns do.
fn narrow_integral_columns(rows: &mut [Vec<Value>], width: usize) {
    for col in 0..width {
        let integral = rows.iter().all(|row| match &row[col] {
            Value::Null | Value::Int(_) => true,
            Value::Float(f) => f.fract() == 0.0 && f.abs() < i64::MAX as f64,
            _ => false,
        });
        if !integral {
            continue;
        }
        for row in rows.iter_mut() {
            if let Value::Float(f) = row[col] {
                row[col] = Value::Int(f as i64);
            }
        }
    }
}

pub(super) fn parse_workbook(bytes: Vec<u8>, config: &FileSourceConfig) -> Result<Table, ReadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| ReadError::Malformed(err.to_string()))?;
    let sheet = pick_sheet(&workbook.sheet_names(), config.sheet_name.as_ref())?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|err| ReadError::Malformed(err.to_string()))?;

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Table::empty(Vec::new()));
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell {
            Data::Empty => format!("Unnamed: {}", idx),
            other => other.to_string().trim().to_string(),
        })
        .collect();

    let mut rows: Vec<Vec<Value>> = lines
        .map(|line| {
            let mut row: Vec<Value> = line.iter().map(cell_value).collect();
            row.resize(columns.len(), Value::Null);
            row
        })
        .collect();
    narrow_integral_columns(&mut rows, columns.len());
    Table::new(columns, rows).map_err(|err| ReadError::Malformed(err.message))
}

pub(super) async fn read_excel(path: &Path, config: &FileSourceConfig) -> Result<Table, ReadError> {
    let bytes = read_bytes(path).await?;
    let table = parse_workbook(bytes, config)?;
    tracing::debug!(path = %path.display(), rows = table.row_count(), "read excel source");
    Ok(table)
}

/// Single-sheet workbook with a header row. Nulls become blank cells.
pub(super) fn render_workbook(table: &Table) -> Result<Vec<u8>, WriteError> {
    let unwritable = |err: XlsxError| WriteError::Unwritable(err.to_string());
    let mut workbook = Workbook::new();
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);
    let sheet = workbook.add_worksheet();

    for (col, name) in table.columns().iter().enumerate() {
        sheet
            .write_string(0, column_index(col)?, name)
            .map_err(unwritable)?;
    }
    for (idx, row) in table.rows().iter().enumerate() {
        let line = u32::try_from(idx + 1)
            .map_err(|_| WriteError::Unwritable("too many rows for a worksheet".to_string()))?;
        for (col, value) in row.iter().enumerate() {
            let col = column_index(col)?;
            match value {
                Value::Null => {}
                Value::Float(f) if f.is_nan() => {}
                Value::Bool(b) => {
                    sheet.write_boolean(line, col, *b).map_err(unwritable)?;
                }
                Value::Int(i) => {
                    sheet.write_number(line, col, *i as f64).map_err(unwritable)?;
                }
                Value::Float(f) => {
                    sheet.write_number(line, col, *f).map_err(unwritable)?;
                }
                Value::Str(s) => {
                    sheet.write_string(line, col, s).map_err(unwritable)?;
                }
                Value::DateTime(dt) => {
                    sheet
                        .write_datetime_with_format(line, col, dt, &datetime_format)
                        .map_err(unwritable)?;
                }
            }
        }
    }
    workbook.save_to_buffer().map_err(unwritable)
}

fn column_index(col: usize) -> Result<u16, WriteError> {
    u16::try_from(col)
        .map_err(|_| WriteError::Unwritable("too many columns for a worksheet".to_string()))
}

pub(super) async fn write_excel(table: &Table, path: &Path) -> Result<String, WriteError> {
    let bytes = render_workbook(table)?;
    write_bytes(path, &bytes).await
}
