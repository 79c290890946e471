//! Row cell decoding per database driver, keyed by the column's reported type name.

use crate::core::table::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};
use uuid::Uuid;

fn hex(bytes: Vec<u8>) -> Value {
    Value::Str(bytes.iter().map(|byte| format!("{:02x}", byte)).collect())
}

fn midnight(date: NaiveDate) -> Value {
    Value::DateTime(date.and_time(NaiveTime::MIN))
}

fn unsupported(type_name: &str, idx: usize) -> sqlx::Error {
    sqlx::Error::Decode(
        format!(
            "column {} has unsupported type {}; cast it to text or a number in the query",
            idx, type_name
        )
        .into(),
    )
}

/// SQLite decodes by storage class.
pub(super) fn sqlite_cell(row: &SqliteRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let value = match storage.as_str() {
        "INTEGER" => Value::Int(row.try_get::<i64, _>(idx)?),
        "REAL" => Value::Float(row.try_get::<f64, _>(idx)?),
        "BLOB" => hex(row.try_get::<Vec<u8>, _>(idx)?),
        _ => Value::Str(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}

pub(super) fn postgres_cell(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "INT2" => Value::Int(row.try_get::<i16, _>(idx)?.into()),
        "INT4" => Value::Int(row.try_get::<i32, _>(idx)?.into()),
        "INT8" => Value::Int(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => Value::Float(row.try_get::<f32, _>(idx)?.into()),
        "FLOAT8" => Value::Float(row.try_get::<f64, _>(idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            Value::Str(row.try_get::<String, _>(idx)?)
        }
        "TIMESTAMP" => Value::DateTime(row.try_get::<NaiveDateTime, _>(idx)?),
        "TIMESTAMPTZ" => Value::DateTime(row.try_get::<DateTime<Utc>, _>(idx)?.naive_utc()),
        "DATE" => midnight(row.try_get::<NaiveDate, _>(idx)?),
        "UUID" => Value::Str(row.try_get::<Uuid, _>(idx)?.to_string()),
        "JSON" | "JSONB" => Value::Str(row.try_get::<serde_json::Value, _>(idx)?.to_string()),
        "BYTEA" => hex(row.try_get::<Vec<u8>, _>(idx)?),
        other => return Err(unsupported(other, idx)),
    };
    Ok(value)
}

pub(super) fn mysql_cell(row: &MySqlRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();
    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::Int(row.try_get::<i64, _>(idx)?)
        }
        name if name.ends_with(" UNSIGNED") => {
            let wide = row.try_get::<u64, _>(idx)?;
            i64::try_from(wide).map_or(Value::Float(wide as f64), Value::Int)
        }
        "FLOAT" => Value::Float(row.try_get::<f32, _>(idx)?.into()),
        "DOUBLE" => Value::Float(row.try_get::<f64, _>(idx)?),
        "DATETIME" | "TIMESTAMP" => Value::DateTime(row.try_get::<NaiveDateTime, _>(idx)?),
        "DATE" => midnight(row.try_get::<NaiveDate, _>(idx)?),
        "JSON" => Value::Str(row.try_get::<serde_json::Value, _>(idx)?.to_string()),
        name if name.contains("BLOB") || name.ends_with("BINARY") => {
            hex(row.try_get::<Vec<u8>, _>(idx)?)
        }
        "VARCHAR" | "CHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            Value::Str(row.try_get::<String, _>(idx)?)
        }
        other => return Err(unsupported(other, idx)),
    };
    Ok(value)
}
