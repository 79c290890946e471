pub mod config;
pub mod connectors;
pub mod error;
pub mod pipeline;
pub mod profile;
pub mod table;
pub mod types;

pub use config::{AedConfig, ConfigLoader, ConfigValidator};
pub use error::AppError;
pub use pipeline::{EngineSettings, PipelineEngine};
pub use table::{Table, Value};
pub use types::*;
