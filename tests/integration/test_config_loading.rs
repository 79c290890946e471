use aed::core::config::{ConfigLoader, RecorderBackend};
use aed::core::types::ErrorCategory;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn clear_aed_env() {
    for v in &[
        "AED_ENGINE_TIMEOUT_SECONDS",
        "AED_ENGINE_VALIDATE",
        "AED_LARGE_GRAPH_THRESHOLD",
        "AED_STORAGE_INPUT_DIR",
        "AED_STORAGE_OUTPUT_DIR",
        "AED_STORAGE_RESTRICT_INPUTS",
        "AED_RECORDER_BACKEND",
        "AED_DATABASE_URL",
    ] {
        env::remove_var(v);
    }
}

/// File values flow into engine, storage and recorder settings.
#[test]
#[serial]
fn test_config_loading_integration() {
    clear_aed_env();
    let temp_dir = TempDir::new().unwrap();
    let workspace_path = temp_dir.path();

    let config_content = r#"
[engine]
timeout_seconds = 90
validate_before_run = false
large_graph_threshold = 12

[storage]
input_dir = "data/in"
output_dir = "/srv/aed/out"
restrict_inputs = true

[recorder]
backend = "sqlite"
database_url = "sqlite://state/runs.db?mode=rwc"
"#;
    fs::write(workspace_path.join("aed.toml"), config_content).unwrap();

    let config = ConfigLoader::load_from_workspace(workspace_path).unwrap();

    let engine = config.engine_settings();
    assert_eq!(engine.timeout, Duration::from_secs(90));
    assert!(!engine.validate);
    assert_eq!(engine.large_graph_threshold, 12);

    let storage = config.storage_settings(workspace_path);
    assert_eq!(storage.input_dir, workspace_path.join("data/in"));
    assert_eq!(storage.output_dir, PathBuf::from("/srv/aed/out"));
    assert!(storage.restrict_inputs);

    assert_eq!(config.recorder.backend, RecorderBackend::Sqlite);
    assert_eq!(
        config.recorder_url(workspace_path),
        format!(
            "sqlite://{}?mode=rwc",
            workspace_path.join("state/runs.db").display()
        )
    );
}

#[test]
#[serial]
fn test_environment_overrides_file_values() {
    clear_aed_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("aed.toml"),
        "[engine]\ntimeout_seconds = 90\n",
    )
    .unwrap();

    env::set_var("AED_ENGINE_TIMEOUT_SECONDS", "15");
    env::set_var("AED_STORAGE_OUTPUT_DIR", "exports");
    env::set_var("AED_RECORDER_BACKEND", "SQLite");
    env::set_var("AED_DATABASE_URL", "sqlite::memory:");

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_aed_env();

    assert_eq!(config.engine.timeout_seconds, 15);
    assert_eq!(config.storage.output_dir, PathBuf::from("exports"));
    assert_eq!(config.recorder.backend, RecorderBackend::Sqlite);
    assert_eq!(config.recorder_url(temp_dir.path()), "sqlite::memory:");
}

#[test]
#[serial]
fn test_unparsable_override_is_ignored() {
    clear_aed_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("AED_LARGE_GRAPH_THRESHOLD", "lots");

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_aed_env();

    assert_eq!(config.engine.large_graph_threshold, 50);
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    clear_aed_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("aed.toml"),
        "[recorder]\nbackend = \"sqlite\"\ndatabase_url = \"postgres://db/runs\"\n",
    )
    .unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
    assert_eq!(err.code, "ETL-CFG-022");

    env::set_var("AED_ENGINE_TIMEOUT_SECONDS", "0");
    fs::remove_file(temp_dir.path().join("aed.toml")).unwrap();
    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    clear_aed_env();
    assert!(err.to_string().contains("timeout_seconds"));
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    clear_aed_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("aed.toml"), "[engine\ntimeout = ").unwrap();

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.code, "ETL-CFG-021");
}

#[test]
fn test_env_var_documentation_lists_every_override() {
    let docs = ConfigLoader::env_var_documentation();
    assert_eq!(docs.len(), 8);
    assert!(docs.iter().all(|line| line.starts_with("AED_")));
}
