//! DB_SOURCE and DB_LOAD over SQLite, PostgreSQL and MySQL, chosen by URL scheme.

mod decode;

use super::{ReadError, WriteError};
use crate::core::pipeline::node_config::{DbSinkConfig, DbSourceConfig, IfExists};
use crate::core::table::{Table, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Sqlite,
    Postgres,
    MySql,
}

impl Backend {
    fn from_url(url: &str) -> Result<Self, String> {
        let scheme = url.split(':').next().unwrap_or(url).to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "mysql" => Ok(Backend::MySql),
            other => Err(format!(
                "database scheme '{}' (supported: sqlite, postgres, mysql)",
                other
            )),
        }
    }

    fn quote(self, name: &str) -> String {
        match self {
            Backend::MySql => format!("`{}`", name.replace('`', "``")),
            Backend::Sqlite | Backend::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Bind placeholder for the 1-based parameter `n`.
    fn placeholder(self, n: usize) -> String {
        match self {
            Backend::Postgres => format!("${}", n),
            Backend::Sqlite | Backend::MySql => "?".to_string(),
        }
    }

    fn table_exists_sql(self) -> &'static str {
        match self {
            Backend::Sqlite => "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
            Backend::Postgres => {
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
            }
            Backend::MySql => {
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
        }
    }

    fn column_type(self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            (Backend::Sqlite, ColumnKind::Integer | ColumnKind::Boolean) => "INTEGER",
            (Backend::Sqlite, ColumnKind::Real) => "REAL",
            (_, ColumnKind::Integer) => "BIGINT",
            (Backend::Postgres, ColumnKind::Real) => "DOUBLE PRECISION",
            (Backend::MySql, ColumnKind::Real) => "DOUBLE",
            (_, ColumnKind::Boolean) => "BOOLEAN",
            (_, ColumnKind::Text) => "TEXT",
        }
    }
}

/// Storage kind for one output column, from its non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Real,
    Boolean,
    Text,
}

impl ColumnKind {
    fn of(table: &Table, idx: usize) -> Self {
        let mut kind: Option<ColumnKind> = None;
        for value in table.column_values(idx).filter(|v| !v.is_null()) {
            let next = match value {
                Value::Bool(_) => ColumnKind::Boolean,
                Value::Int(_) => ColumnKind::Integer,
                Value::Float(_) => ColumnKind::Real,
                _ => return ColumnKind::Text,
            };
            kind = Some(match (kind, next) {
                (None, next) => next,
                (Some(current), next) if current == next => current,
                (Some(ColumnKind::Real), _) | (Some(_), ColumnKind::Real) => ColumnKind::Real,
                _ => ColumnKind::Integer,
            });
        }
        kind.unwrap_or(ColumnKind::Text)
    }

    fn bind(self, value: &Value) -> Bind {
        if value.is_null() {
            return match self {
                ColumnKind::Integer => Bind::Int(None),
                ColumnKind::Real => Bind::Real(None),
                ColumnKind::Boolean => Bind::Bool(None),
                ColumnKind::Text => Bind::Text(None),
            };
        }
        match (self, value) {
            (ColumnKind::Integer, Value::Int(i)) => Bind::Int(Some(*i)),
            (ColumnKind::Integer, Value::Bool(b)) => Bind::Int(Some(i64::from(*b))),
            (ColumnKind::Real, Value::Float(f)) => Bind::Real(Some(*f)),
            (ColumnKind::Real, Value::Int(i)) => Bind::Real(Some(*i as f64)),
            (ColumnKind::Real, Value::Bool(b)) => Bind::Real(Some(f64::from(u8::from(*b)))),
            (ColumnKind::Boolean, Value::Bool(b)) => Bind::Bool(Some(*b)),
            (_, other) => Bind::Text(Some(other.render())),
        }
    }
}

/// A cell ready to bind, typed to match its column.
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Int(Option<i64>),
    Real(Option<f64>),
    Bool(Option<bool>),
    Text(Option<String>),
}

/// DDL and DML for writing one table.
struct WritePlan {
    kinds: Vec<ColumnKind>,
    exists: &'static str,
    drop: String,
    create: String,
    insert: String,
}

impl WritePlan {
    fn new(backend: Backend, table: &Table, table_name: &str) -> Self {
        let target = backend.quote(table_name);
        let kinds: Vec<ColumnKind> = (0..table.column_count())
            .map(|idx| ColumnKind::of(table, idx))
            .collect();
        let definitions: Vec<String> = table
            .columns()
            .iter()
            .zip(&kinds)
            .map(|(column, kind)| format!("{} {}", backend.quote(column), backend.column_type(*kind)))
            .collect();
        let names: Vec<String> = table.columns().iter().map(|c| backend.quote(c)).collect();
        let placeholders: Vec<String> = (1..=names.len()).map(|n| backend.placeholder(n)).collect();
        Self {
            kinds,
            exists: backend.table_exists_sql(),
            drop: format!("DROP TABLE {}", target),
            create: format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                target,
                definitions.join(", ")
            ),
            insert: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                target,
                names.join(", "),
                placeholders.join(", ")
            ),
        }
    }
}

fn query_error(err: sqlx::Error) -> ReadError {
    let message = err.to_string();
    let missing = ["no such table", "does not exist", "doesn't exist"];
    if missing.iter().any(|needle| message.contains(needle)) {
        ReadError::NotFound(message)
    } else {
        ReadError::Malformed(message)
    }
}

/// Fetch every row of `$sql`, taking column names from the first row or,
/// for an empty result, from the prepared statement.
macro_rules! fetch_table {
    ($conn:ident, $sql:expr, $decode:path) => {{
        let rows = sqlx::query($sql)
            .fetch_all(&mut $conn)
            .await
            .map_err(query_error)?;
        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => $conn
                .describe($sql)
                .await
                .map_err(query_error)?
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
        };
        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            let values = (0..columns.len())
                .map(|idx| $decode(row, idx))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ReadError::Malformed(err.to_string()))?;
            data.push(values);
        }
        let _ = $conn.close().await;
        (columns, data)
    }};
}

/// Create (or replace) the target table and insert every row in one transaction.
macro_rules! store_table {
    ($conn:ident, $plan:expr, $table:expr, $config:expr) => {{
        let plan = $plan;
        let unwritable = |err: sqlx::Error| WriteError::Unwritable(err.to_string());
        let mut tx = $conn.begin().await.map_err(unwritable)?;
        let exists = sqlx::query(plan.exists)
            .bind($config.table_name.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(unwritable)?
            .is_some();

        match ($config.if_exists, exists) {
            (IfExists::Fail, true) => {
                return Err(WriteError::AlreadyExists(format!(
                    "table '{}'",
                    $config.table_name
                )))
            }
            (IfExists::Replace, true) => {
                sqlx::query(&plan.drop)
                    .execute(&mut *tx)
                    .await
                    .map_err(unwritable)?;
            }
            _ => {}
        }
        sqlx::query(&plan.create)
            .execute(&mut *tx)
            .await
            .map_err(unwritable)?;

        for row in $table.rows() {
            let mut query = sqlx::query(&plan.insert);
            for (value, kind) in row.iter().zip(&plan.kinds) {
                query = match kind.bind(value) {
                    Bind::Int(v) => query.bind(v),
                    Bind::Real(v) => query.bind(v),
                    Bind::Bool(v) => query.bind(v),
                    Bind::Text(v) => query.bind(v),
                };
            }
            query.execute(&mut *tx).await.map_err(unwritable)?;
        }
        tx.commit().await.map_err(unwritable)?;
    }};
}

fn source_sql(config: &DbSourceConfig, backend: Backend) -> Result<String, ReadError> {
    match (&config.query, &config.table_name) {
        (Some(query), _) if !query.trim().is_empty() => Ok(query.clone()),
        (_, Some(table)) if !table.trim().is_empty() => {
            Ok(format!("SELECT * FROM {}", backend.quote(table)))
        }
        _ => Err(ReadError::Malformed(
            "DB_SOURCE needs a query or a table_name".to_string(),
        )),
    }
}

pub(super) async fn read_table(config: &DbSourceConfig) -> Result<Table, ReadError> {
    let url = config.connection_string.as_str();
    let backend = Backend::from_url(url).map_err(ReadError::UnsupportedFormat)?;
    let sql = source_sql(config, backend)?;
    let transport = |err: sqlx::Error| ReadError::Transport(err.to_string());
    let unsupported = |err: sqlx::Error| ReadError::UnsupportedFormat(err.to_string());

    let (columns, data) = match backend {
        Backend::Sqlite => {
            let options = SqliteConnectOptions::from_str(url).map_err(unsupported)?;
            let mut conn: SqliteConnection = options.connect().await.map_err(transport)?;
            fetch_table!(conn, sql.as_str(), decode::sqlite_cell)
        }
        Backend::Postgres => {
            let options = PgConnectOptions::from_str(url).map_err(unsupported)?;
            let mut conn: PgConnection = options.connect().await.map_err(transport)?;
            fetch_table!(conn, sql.as_str(), decode::postgres_cell)
        }
        Backend::MySql => {
            let options = MySqlConnectOptions::from_str(url).map_err(unsupported)?;
            let mut conn: MySqlConnection = options.connect().await.map_err(transport)?;
            fetch_table!(conn, sql.as_str(), decode::mysql_cell)
        }
    };

    tracing::debug!(?backend, rows = data.len(), "read database source");
    Table::new(columns, data).map_err(|err| ReadError::Malformed(err.message))
}

pub(super) async fn write_table(table: &Table, config: &DbSinkConfig) -> Result<String, WriteError> {
    let url = config.connection_string.as_str();
    let backend = Backend::from_url(url).map_err(WriteError::UnsupportedFormat)?;
    let plan = WritePlan::new(backend, table, &config.table_name);
    let transport = |err: sqlx::Error| WriteError::Transport(err.to_string());
    let unsupported = |err: sqlx::Error| WriteError::UnsupportedFormat(err.to_string());

    match backend {
        Backend::Sqlite => {
            let options = SqliteConnectOptions::from_str(url)
                .map_err(unsupported)?
                .create_if_missing(true);
            let mut conn: SqliteConnection = options.connect().await.map_err(transport)?;
            store_table!(conn, plan, table, config);
        }
        Backend::Postgres => {
            let options = PgConnectOptions::from_str(url).map_err(unsupported)?;
            let mut conn: PgConnection = options.connect().await.map_err(transport)?;
            store_table!(conn, plan, table, config);
        }
        Backend::MySql => {
            let options = MySqlConnectOptions::from_str(url).map_err(unsupported)?;
            let mut conn: MySqlConnection = options.connect().await.map_err(transport)?;
            store_table!(conn, plan, table, config);
        }
    }

    tracing::debug!(?backend, table = %config.table_name, rows = table.row_count(), "wrote database table");
    Ok(format!("database://{}", config.table_name))
}
