#![allow(clippy::result_large_err)]

use super::{AedConfig, ConfigValidator};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE_NAME: &str = "aed.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `<workspace>/aed.toml`, apply `AED_*` overrides and validate.
    /// A missing file means defaults plus environment.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<AedConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Returns Ok(None) if the file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<AedConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
            .with_code("ETL-CFG-020")
        })?;

        let config: AedConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("ETL-CFG-021")
        })?;

        Ok(Some(config))
    }

    fn parsed<T: FromStr>(name: &str) -> Option<T> {
        let raw = env::var(name).ok()?;
        match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(variable = name, value = %raw, "ignoring unparsable override");
                None
            }
        }
    }

    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut AedConfig) {
        if let Some(timeout) = Self::parsed::<u64>("AED_ENGINE_TIMEOUT_SECONDS") {
            config.engine.timeout_seconds = timeout;
        }
        if let Some(validate) = Self::parsed::<bool>("AED_ENGINE_VALIDATE") {
            config.engine.validate_before_run = validate;
        }
        if let Some(threshold) = Self::parsed::<usize>("AED_LARGE_GRAPH_THRESHOLD") {
            config.engine.large_graph_threshold = threshold;
        }

        if let Ok(input_dir) = env::var("AED_STORAGE_INPUT_DIR") {
            config.storage.input_dir = PathBuf::from(input_dir);
        }
        if let Ok(output_dir) = env::var("AED_STORAGE_OUTPUT_DIR") {
            config.storage.output_dir = PathBuf::from(output_dir);
        }
        if let Some(restrict) = Self::parsed::<bool>("AED_STORAGE_RESTRICT_INPUTS") {
            config.storage.restrict_inputs = restrict;
        }

        if let Some(backend) = Self::parsed("AED_RECORDER_BACKEND") {
            config.recorder.backend = backend;
        }
        if let Ok(url) = env::var("AED_DATABASE_URL") {
            config.recorder.database_url = url;
        }
    }

    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "AED_ENGINE_TIMEOUT_SECONDS - Override the run timeout in seconds (default: 3600)",
            "AED_ENGINE_VALIDATE - Validate graphs before running (true/false, default: true)",
            "AED_LARGE_GRAPH_THRESHOLD - Node count that triggers a performance warning (default: 50)",
            "AED_STORAGE_INPUT_DIR - Directory for file sources (default: ./uploads)",
            "AED_STORAGE_OUTPUT_DIR - Directory for file outputs (default: ./outputs)",
            "AED_STORAGE_RESTRICT_INPUTS - Keep file sources inside the input directory (true/false)",
            "AED_RECORDER_BACKEND - Run recorder backend (memory/sqlite, default: memory)",
            "AED_DATABASE_URL - SQLite URL of the run recorder (default: sqlite://.aed/runs.db)",
        ]
    }
}
