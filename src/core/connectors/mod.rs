#![allow(clippy::result_large_err)]

//! Default table readers and writers: local files, SQLite databases and HTTP APIs.

mod database;
mod excel;
mod files;
mod http;

pub use files::sanitize_file_name;

use crate::core::error::AppError;
use crate::core::pipeline::node_config::{SinkConfig, SourceConfig};
use crate::core::table::Table;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("source not found: {0}")]
    NotFound(String),
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("access denied: {0}")]
    Forbidden(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot write output: {0}")]
    Unwritable(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("target already exists: {0}")]
    AlreadyExists(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<ReadError> for AppError {
    fn from(err: ReadError) -> Self {
        let code = match &err {
            ReadError::NotFound(_) => "ETL-IO-001",
            ReadError::Malformed(_) => "ETL-IO-002",
            ReadError::UnsupportedFormat(_) => "ETL-IO-003",
            ReadError::Forbidden(_) => "ETL-IO-004",
            ReadError::Transport(_) => "ETL-IO-005",
        };
        AppError::new(ErrorCategory::IoError, err.to_string()).with_code(code)
    }
}

impl From<WriteError> for AppError {
    fn from(err: WriteError) -> Self {
        let code = match &err {
            WriteError::Unwritable(_) => "ETL-IO-101",
            WriteError::UnsupportedFormat(_) => "ETL-IO-103",
            WriteError::AlreadyExists(_) => "ETL-IO-104",
            WriteError::Transport(_) => "ETL-IO-105",
        };
        AppError::new(ErrorCategory::IoError, err.to_string()).with_code(code)
    }
}

/// Tabular input keyed by a SOURCE node's configuration.
#[async_trait]
pub trait TableReader: Send + Sync {
    async fn read(&self, config: &SourceConfig) -> Result<Table, ReadError>;
}

/// Tabular output keyed by a LOAD node's configuration. Returns the written location.
#[async_trait]
pub trait TableWriter: Send + Sync {
    async fn write(&self, table: &Table, config: &SinkConfig) -> Result<String, WriteError>;
}

/// Where file sources are read from and file outputs are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Reject source paths that resolve outside `input_dir`.
    pub restrict_inputs: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./outputs"),
            restrict_inputs: false,
        }
    }
}

impl StorageSettings {
    /// Resolve a source path. Relative paths are looked up inside `input_dir` first.
    pub fn resolve_input(&self, raw: &str) -> Result<PathBuf, ReadError> {
        let requested = Path::new(raw);
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            let inside = self.input_dir.join(requested);
            if inside.exists() || self.restrict_inputs {
                inside
            } else {
                requested.to_path_buf()
            }
        };

        if self.restrict_inputs {
            let root = lexical_normalize(&self.input_dir);
            if !lexical_normalize(&candidate).starts_with(&root) {
                return Err(ReadError::Forbidden(format!(
                    "'{}' is outside the input directory {}",
                    raw,
                    self.input_dir.display()
                )));
            }
        }
        if !candidate.exists() {
            return Err(ReadError::NotFound(candidate.display().to_string()));
        }
        Ok(candidate)
    }

    /// Output path for a LOAD node: the sanitized basename under `output_dir`.
    pub fn resolve_output(&self, raw: &str) -> Result<PathBuf, WriteError> {
        let name = sanitize_file_name(raw);
        if name.is_empty() {
            return Err(WriteError::Unwritable(format!(
                "'{}' does not name a file",
                raw
            )));
        }
        Ok(self.output_dir.join(name))
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The default connector set used by the engine and the CLI.
#[derive(Clone)]
pub struct Connectors {
    storage: StorageSettings,
    http: reqwest::Client,
}

impl Connectors {
    pub fn new(storage: StorageSettings) -> Self {
        Self {
            storage,
            http: reqwest::Client::new(),
        }
    }

    pub fn storage(&self) -> &StorageSettings {
        &self.storage
    }
}

#[async_trait]
impl TableReader for Connectors {
    async fn read(&self, config: &SourceConfig) -> Result<Table, ReadError> {
        match config {
            SourceConfig::Csv(cfg) => {
                let path = self.storage.resolve_input(&cfg.file_path)?;
                files::read_csv(&path, cfg).await
            }
            SourceConfig::Json(cfg) => {
                let path = self.storage.resolve_input(&cfg.file_path)?;
                files::read_json(&path).await
            }
            SourceConfig::Excel(cfg) => {
                let path = self.storage.resolve_input(&cfg.file_path)?;
                excel::read_excel(&path, cfg).await
            }
            SourceConfig::Database(cfg) => database::read_table(cfg).await,
            SourceConfig::Api(cfg) => http::fetch_table(&self.http, cfg).await,
        }
    }
}

#[async_trait]
impl TableWriter for Connectors {
    async fn write(&self, table: &Table, config: &SinkConfig) -> Result<String, WriteError> {
        match config {
            SinkConfig::Csv(cfg) => {
                let path = self.storage.resolve_output(&cfg.output_path)?;
                files::write_csv(table, &path).await
            }
            SinkConfig::Json(cfg) => {
                let path = self.storage.resolve_output(&cfg.output_path)?;
                files::write_json(table, &path).await
            }
            SinkConfig::Excel(cfg) => {
                let path = self.storage.resolve_output(&cfg.output_path)?;
                excel::write_excel(table, &path).await
            }
            SinkConfig::Database(cfg) => database::write_table(table, cfg).await,
            SinkConfig::Api(cfg) => http::send_table(&self.http, table, cfg).await,
        }
    }
}
