use crate::core::connectors::StorageSettings;
use crate::core::pipeline::executor::{EngineSettings, DEFAULT_TIMEOUT};
use crate::core::pipeline::validation::DEFAULT_LARGE_GRAPH_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Workspace configuration loaded from `aed.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AedConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for one pipeline run, in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub validate_before_run: bool,

    /// Node count above which validation warns about performance
    #[serde(default = "default_large_graph_threshold")]
    pub large_graph_threshold: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where relative file sources are looked up
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Where file outputs are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Reject sources that resolve outside `input_dir`
    #[serde(default)]
    pub restrict_inputs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderBackend {
    #[default]
    Memory,
    Sqlite,
}

impl fmt::Display for RecorderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderBackend::Memory => f.write_str("memory"),
            RecorderBackend::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for RecorderBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(RecorderBackend::Memory),
            "sqlite" => Ok(RecorderBackend::Sqlite),
            other => Err(format!("unknown recorder backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub backend: RecorderBackend,

    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_true() -> bool {
    true
}

fn default_large_graph_threshold() -> usize {
    DEFAULT_LARGE_GRAPH_THRESHOLD
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputs")
}

fn default_database_url() -> String {
    "sqlite://.aed/runs.db".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            timeout_seconds: default_timeout_seconds(),
            validate_before_run: true,
            large_graph_threshold: default_large_graph_threshold(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            restrict_inputs: false,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        RecorderConfig {
            backend: RecorderBackend::Memory,
            database_url: default_database_url(),
        }
    }
}

fn anchored(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

impl AedConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            timeout: Duration::from_secs(self.engine.timeout_seconds),
            validate: self.engine.validate_before_run,
            large_graph_threshold: self.engine.large_graph_threshold,
        }
    }

    /// Storage settings with relative directories anchored at `workspace`.
    pub fn storage_settings(&self, workspace: &Path) -> StorageSettings {
        StorageSettings {
            input_dir: anchored(workspace, &self.storage.input_dir),
            output_dir: anchored(workspace, &self.storage.output_dir),
            restrict_inputs: self.storage.restrict_inputs,
        }
    }

    /// Recorder URL with a relative SQLite path anchored at `workspace`.
    pub fn recorder_url(&self, workspace: &Path) -> String {
        let url = &self.recorder.database_url;
        let Some(rest) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        else {
            return url.clone();
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if path.is_empty() || path == ":memory:" || Path::new(path).is_absolute() {
            return url.clone();
        }
        let mut anchored = format!("sqlite://{}", workspace.join(path).display());
        if let Some(query) = query {
            anchored.push('?');
            anchored.push_str(query);
        }
        anchored
    }
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
