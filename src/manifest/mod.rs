//! Project manifests
//!
//! Documents are read fresh for every invocation:
//! 1. Locate the file (`manifest.yml`, then `manifest.yaml`)
//! 2. Parse YAML into a generic value
//! 3. Validate against the schema, collecting every violation
//! 4. Deserialize into the typed model
//!
//! Steps 1 and 2 fail with errors the CLI treats as fatal; step 3 yields a
//! reusable [`ValidationErrors`] list.

pub mod playbook;
pub mod published;
pub mod queries;

pub use playbook::{read_playbook, Playbook, PlaybookTrigger, PLAYBOOK_FILE};
pub use published::{read_published_manifest, PublishedManifest};
pub use queries::{read_queries, Query, QueryManifest, Severity, QUERIES_FILE};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::schema::{validate, SchemaKind, ValidationErrors};

/// Accepted manifest file names, in lookup order
pub const MANIFEST_FILES: [&str; 2] = ["manifest.yml", "manifest.yaml"];

/// Agent implementation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Sql,
    Wasm,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentType::Sql => write!(f, "sql"),
            AgentType::Wasm => write!(f, "wasm"),
        }
    }
}

/// Agent manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared support set; order is preserved
    pub chains: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Reusable template: metadata only, daemons are launched separately
    #[serde(default, deserialize_with = "null_as_default")]
    pub subscribable: bool,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ManifestParameter>,
}

/// Parameter kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    Int256,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
    Uint256,
    Address,
    Float,
}

/// A typed, user-suppliable configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestParameter {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ParameterValue>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub required_for: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub hidden_for: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl ManifestParameter {
    pub fn is_hidden_for(&self, chain: &str) -> bool {
        self.hidden_for.iter().any(|c| c == chain)
    }

    pub fn is_required_for(&self, chain: &str) -> bool {
        self.required_for.iter().any(|c| c == chain)
    }
}

/// Scalar parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{}", b),
            ParameterValue::Number(n) => write!(f, "{}", n),
            ParameterValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// An empty YAML key (`tags:`) reads as null; treat it like an absent one
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Manifest reader errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest not found in {} (expected manifest.yml or manifest.yaml)", .0.display())]
    NotFound(PathBuf),

    #[error("{} not found", .0.display())]
    MissingFile(PathBuf),

    #[error("Failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("Failed to write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

/// A parsed, not yet validated document
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub value: Value,
}

impl LoadedDocument {
    pub fn validate(&self, kind: SchemaKind) -> Result<(), ValidationErrors> {
        validate(&self.value, kind)
    }

    /// Validate, then deserialize into `T`
    pub fn into_typed<T: DeserializeOwned>(self, kind: SchemaKind) -> Result<T, ManifestError> {
        self.validate(kind)?;
        serde_json::from_value(self.value).map_err(|e| ManifestError::Parse {
            path: self.path,
            message: e.to_string(),
        })
    }
}

/// Locate the manifest in a project directory
pub fn find_manifest(dir: &Path) -> Result<PathBuf, ManifestError> {
    MANIFEST_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
        .ok_or_else(|| ManifestError::NotFound(dir.to_path_buf()))
}

/// Read and parse a YAML document without validating it
pub fn load_document(path: &Path) -> Result<LoadedDocument, ManifestError> {
    if !path.is_file() {
        return Err(ManifestError::MissingFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let value: Value = serde_yaml::from_str(&content).map_err(|e| ManifestError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    debug!(path = %path.display(), "Loaded document");
    Ok(LoadedDocument {
        path: path.to_path_buf(),
        value,
    })
}

/// Locate and parse the project manifest; validation is left to the caller
pub fn load_manifest_document(dir: &Path) -> Result<LoadedDocument, ManifestError> {
    load_document(&find_manifest(dir)?)
}

/// Locate, parse, validate and deserialize the project manifest
pub fn read_manifest(dir: &Path) -> Result<Manifest, ManifestError> {
    load_manifest_document(dir)?.into_typed(SchemaKind::Manifest)
}

/// Write a manifest as YAML. The output is not re-validated.
pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<(), ManifestError> {
    let write_err = |e: String| ManifestError::Write {
        path: path.to_path_buf(),
        message: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    let yaml = serde_yaml::to_string(manifest).map_err(|e| write_err(e.to_string()))?;
    std::fs::write(path, yaml).map_err(|e| write_err(e.to_string()))?;

    debug!(path = %path.display(), "Wrote manifest");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
version: 0.0.1
type: sql
name: Large transfers
chains:
  - SUI_TESTNET
tags: [defi]
parameters:
  - type: NUMBER
    key: threshold
    title: Threshold
    defaultValue: 1000
    requiredFor: [SUI_TESTNET]
"#;

    #[test]
    fn test_find_manifest_prefers_yml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("manifest.yaml"), MANIFEST).unwrap();
        assert_eq!(find_manifest(dir.path()).unwrap(), dir.path().join("manifest.yaml"));

        std::fs::write(dir.path().join("manifest.yml"), MANIFEST).unwrap();
        assert_eq!(find_manifest(dir.path()).unwrap(), dir.path().join("manifest.yml"));
    }

    #[test]
    fn test_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(read_manifest(dir.path()), Err(ManifestError::NotFound(_))));
    }

    #[test]
    fn test_read_typed_manifest() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("manifest.yml"), MANIFEST).unwrap();

        let manifest = read_manifest(dir.path()).unwrap();
        assert_eq!(manifest.agent_type, AgentType::Sql);
        assert!(!manifest.subscribable);
        assert_eq!(manifest.parameters[0].kind, ParameterType::Number);
        assert!(manifest.parameters[0].is_required_for("SUI_TESTNET"));
        assert_eq!(
            manifest.parameters[0].default_value.as_ref().map(|v| v.to_string()),
            Some("1000".to_string())
        );
    }

    #[test]
    fn test_invalid_manifest_lists_violations() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("manifest.yml"), "type: rust\nname: x\n").unwrap();

        let err = read_manifest(dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("manifest contains invalid structure"));
        assert!(message.contains("1. version: is required"));
        assert!(message.contains("2. type: must be one of: sql, wasm"));
        assert!(message.contains("3. chains: is required"));
    }

    fn read_with(extra: &str) -> Result<Manifest, ManifestError> {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("manifest.yml"),
            format!("version: 0.0.1\ntype: sql\nname: x\nchains: [SUI_TESTNET]\n{}", extra),
        )
        .unwrap();
        read_manifest(dir.path())
    }

    #[test]
    fn test_empty_optional_keys_read_as_defaults() {
        let manifest = read_with("subscribable:\n").unwrap();
        assert!(!manifest.subscribable);

        let manifest = read_with("tags:\n").unwrap();
        assert!(manifest.tags.is_empty());

        let manifest = read_with("parameters:\n").unwrap();
        assert!(manifest.parameters.is_empty());
    }

    #[test]
    fn test_empty_parameter_chain_sets_read_as_defaults() {
        let manifest = read_with(
            "parameters:\n  - type: STRING\n    key: k\n    title: t\n    requiredFor:\n    hiddenFor:\n",
        )
        .unwrap();
        assert!(manifest.parameters[0].required_for.is_empty());
        assert!(manifest.parameters[0].hidden_for.is_empty());
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("manifest.yml"), "").unwrap();
        let err = read_manifest(dir.path()).unwrap_err();
        assert!(err.to_string().contains("document is empty"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("manifest.yml"), MANIFEST).unwrap();
        let manifest = read_manifest(dir.path()).unwrap();

        let out = dir.path().join("build");
        write_manifest(&manifest, &out.join("manifest.yml")).unwrap();
        assert_eq!(read_manifest(&out).unwrap(), manifest);
    }
}
