#![allow(clippy::result_large_err)]

use super::{AedConfig, RecorderBackend};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

fn invalid(message: &str) -> AppError {
    AppError::new(ErrorCategory::ConfigError, message).with_code("ETL-CFG-022")
}

impl ConfigValidator {
    pub fn validate(config: &AedConfig) -> Result<(), AppError> {
        if config.engine.timeout_seconds == 0 {
            return Err(invalid("engine.timeout_seconds must be at least 1"));
        }

        if config.engine.large_graph_threshold == 0 {
            return Err(invalid("engine.large_graph_threshold must be at least 1"));
        }

        if config.storage.output_dir.as_os_str().is_empty() {
            return Err(invalid("storage.output_dir cannot be empty"));
        }

        // The memory backend ignores database_url.
        if config.recorder.backend == RecorderBackend::Sqlite
            && !config.recorder.database_url.starts_with("sqlite:")
        {
            return Err(invalid(
                "recorder.database_url must be a sqlite: URL when recorder.backend is sqlite",
            ));
        }

        Ok(())
    }
}
