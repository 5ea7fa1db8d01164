//! Local CLI configuration
//!
//! A small JSON rc file under the home directory. Commands receive a
//! [`ConfigStore`] instead of touching the file directly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub const CONFIG_DIR: &str = ".mamoru";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CliConfig {
    /// Telemetry opt-in; `None` until the user has been asked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Random id attached to telemetry events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_id: Option<String>,
}

impl CliConfig {
    /// Telemetry runs only after an explicit opt-in, and never with `--skip-telemetry`
    pub fn telemetry_enabled(&self, skip_telemetry: bool) -> bool {
        !skip_telemetry && self.telemetry == Some(true)
    }

    /// Record the opt-in decision, assigning an anonymous id on opt-in
    pub fn set_telemetry(&mut self, enabled: bool) {
        self.telemetry = Some(enabled);
        if enabled && self.anonymous_id.is_none() {
            self.anonymous_id = Some(uuid::Uuid::new_v4().to_string());
        }
    }
}

/// Config persistence
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<CliConfig, ConfigError>;
    fn save(&self, config: &CliConfig) -> Result<(), ConfigError>;
}

/// `~/.mamoru/config.json`
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self::new(home.join(CONFIG_DIR).join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    /// A missing file yields the default config
    fn load(&self) -> Result<CliConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(CliConfig::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", self.path.display(), e)))?;
        if content.trim().is_empty() {
            return Ok(CliConfig::default());
        }
        serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, config: &CliConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(&self.path, json)
            .map_err(|e| ConfigError::Io(format!("{}: {}", self.path.display(), e)))?;

        debug!(path = %self.path.display(), "Saved CLI config");
        Ok(())
    }
}

/// In-process store, used when the home directory is unavailable
#[derive(Default)]
pub struct MemoryConfigStore {
    config: Mutex<CliConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: CliConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<CliConfig, ConfigError> {
        self.config
            .lock()
            .map(|c| c.clone())
            .map_err(|e| ConfigError::Io(e.to_string()))
    }

    fn save(&self, config: &CliConfig) -> Result<(), ConfigError> {
        let mut guard = self.config.lock().map_err(|e| ConfigError::Io(e.to_string()))?;
        *guard = config.clone();
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine the home directory")]
    NoHomeDir,

    #[error("Config I/O error: {0}")]
    Io(String),

    #[error("Invalid config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_requires_opt_in() {
        let mut config = CliConfig::default();
        assert!(!config.telemetry_enabled(false));

        config.set_telemetry(true);
        assert!(config.telemetry_enabled(false));
        assert!(!config.telemetry_enabled(true));
        assert!(config.anonymous_id.is_some());
    }

    #[test]
    fn test_opt_out_keeps_no_id() {
        let mut config = CliConfig::default();
        config.set_telemetry(false);
        assert_eq!(config.telemetry, Some(false));
        assert!(config.anonymous_id.is_none());
    }

    #[test]
    fn test_wire_shape() {
        let config = CliConfig {
            telemetry: Some(true),
            auth_token: Some("tok".to_string()),
            anonymous_id: None,
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::json!({"telemetry": true, "authToken": "tok"})
        );
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryConfigStore::default();
        let mut config = store.load().unwrap();
        config.auth_token = Some("tok".to_string());
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap().auth_token.as_deref(), Some("tok"));
    }
}
