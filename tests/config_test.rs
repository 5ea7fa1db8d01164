//! Config file persistence integration tests

use mamoru_cli::config::{CliConfig, ConfigStore, FileConfigStore, CONFIG_DIR, CONFIG_FILE};
use tempfile::TempDir;

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let store = FileConfigStore::new(dir.path().join(CONFIG_DIR).join(CONFIG_FILE));

    let config = store.load().unwrap();
    assert_eq!(config, CliConfig::default());
    assert!(!store.path().exists());
}

#[test]
fn test_save_creates_directory_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = FileConfigStore::new(dir.path().join(CONFIG_DIR).join(CONFIG_FILE));

    let mut config = CliConfig {
        auth_token: Some("token-1".to_string()),
        ..CliConfig::default()
    };
    config.set_telemetry(true);
    store.save(&config).unwrap();

    assert!(store.path().exists());
    let loaded = store.load().unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.telemetry_enabled(false));
    assert!(!loaded.telemetry_enabled(true));
}

#[test]
fn test_reads_hand_written_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(&path, r#"{"telemetry": false, "authToken": "abc", "unknown": 1}"#).unwrap();

    let config = FileConfigStore::new(&path).load().unwrap();
    assert_eq!(config.telemetry, Some(false));
    assert_eq!(config.auth_token.as_deref(), Some("abc"));
    assert_eq!(config.anonymous_id, None);
}

#[test]
fn test_empty_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(&path, "  \n").unwrap();

    assert_eq!(FileConfigStore::new(&path).load().unwrap(), CliConfig::default());
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE);
    std::fs::write(&path, "{telemetry: yes").unwrap();

    let err = FileConfigStore::new(&path).load().unwrap_err();
    assert!(err.to_string().contains(CONFIG_FILE));
}
