//! Compiled WASM artifacts
//!
//! `build` compiles the agent and stores the module together with the SDK
//! versions it was built against in the project's build directory;
//! `publish` reads them back.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::ledger::{DaemonContent, SdkVersion};

pub const BUILD_DIR: &str = "build";
pub const MODULE_FILE: &str = "index.wasm";
pub const SDK_VERSIONS_FILE: &str = "sdk-versions.json";

/// Crates whose versions are recorded alongside the module
const SDK_CRATE_PREFIX: &str = "mamoru-";

/// Compiled agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WasmArtifact {
    pub module: Vec<u8>,
    pub sdk_versions: Vec<SdkVersion>,
}

impl WasmArtifact {
    /// Hex SHA-256 of the module
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.module))
    }

    pub fn into_content(self) -> DaemonContent {
        DaemonContent::Wasm {
            digest: self.digest(),
            module: base64::engine::general_purpose::STANDARD.encode(&self.module),
            sdk_versions: self.sdk_versions,
        }
    }
}

/// Where compiled artifacts live
pub trait ArtifactSource: Send + Sync {
    fn build_dir(&self, project_dir: &Path) -> PathBuf;
    fn load(&self, project_dir: &Path) -> Result<WasmArtifact, ArtifactError>;
    fn store(&self, project_dir: &Path, artifact: &WasmArtifact) -> Result<PathBuf, ArtifactError>;
}

/// `build/index.wasm` and `build/sdk-versions.json`
#[derive(Debug, Clone, Default)]
pub struct BuildDirArtifacts;

impl ArtifactSource for BuildDirArtifacts {
    fn build_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(BUILD_DIR)
    }

    fn load(&self, project_dir: &Path) -> Result<WasmArtifact, ArtifactError> {
        let dir = self.build_dir(project_dir);
        let module_path = dir.join(MODULE_FILE);
        let module = std::fs::read(&module_path).map_err(|e| ArtifactError::Io {
            path: module_path.clone(),
            message: e.to_string(),
        })?;

        let versions_path = dir.join(SDK_VERSIONS_FILE);
        let sdk_versions = if versions_path.exists() {
            let raw = std::fs::read_to_string(&versions_path).map_err(|e| ArtifactError::Io {
                path: versions_path.clone(),
                message: e.to_string(),
            })?;
            serde_json::from_str(&raw).map_err(|e| ArtifactError::Parse {
                path: versions_path.clone(),
                message: e.to_string(),
            })?
        } else {
            Vec::new()
        };

        let artifact = WasmArtifact { module, sdk_versions };
        debug!(
            path = %module_path.display(),
            size = artifact.module.len(),
            digest = %artifact.digest(),
            "Loaded wasm module"
        );
        Ok(artifact)
    }

    fn store(&self, project_dir: &Path, artifact: &WasmArtifact) -> Result<PathBuf, ArtifactError> {
        let dir = self.build_dir(project_dir);
        let io_err = |path: &Path, e: std::io::Error| ArtifactError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let module_path = dir.join(MODULE_FILE);
        std::fs::write(&module_path, &artifact.module).map_err(|e| io_err(&module_path, e))?;

        let versions_path = dir.join(SDK_VERSIONS_FILE);
        let json = serde_json::to_string_pretty(&artifact.sdk_versions).map_err(|e| ArtifactError::Parse {
            path: versions_path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&versions_path, json).map_err(|e| io_err(&versions_path, e))?;

        Ok(module_path)
    }
}

/// Agent compiler
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, project_dir: &Path) -> Result<WasmArtifact, ArtifactError>;
}

/// Runs an external build command and picks up the produced module
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    pub program: String,
    pub args: Vec<String>,
    /// Directory, relative to the project, the command writes `.wasm` files to
    pub output_dir: PathBuf,
}

impl Default for CommandCompiler {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            args: ["build", "--release", "--target", "wasm32-unknown-unknown"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_dir: PathBuf::from("target/wasm32-unknown-unknown/release"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LockFile {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

impl CommandCompiler {
    fn find_module(&self, project_dir: &Path) -> Result<PathBuf, ArtifactError> {
        let dir = project_dir.join(&self.output_dir);
        let entries = std::fs::read_dir(&dir).map_err(|e| ArtifactError::Io {
            path: dir.clone(),
            message: e.to_string(),
        })?;

        let mut modules: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "wasm"))
            .collect();
        modules.sort();
        modules
            .into_iter()
            .next()
            .ok_or(ArtifactError::NoModule(dir))
    }
}

#[async_trait]
impl Compiler for CommandCompiler {
    async fn compile(&self, project_dir: &Path) -> Result<WasmArtifact, ArtifactError> {
        info!(program = %self.program, args = ?self.args, "Compiling agent");
        let status = Command::new(&self.program)
            .args(&self.args)
            .current_dir(project_dir)
            .stdin(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| ArtifactError::Compiler(format!("failed to run {}: {}", self.program, e)))?;
        if !status.success() {
            return Err(ArtifactError::Compiler(format!("{} exited with {}", self.program, status)));
        }

        let module_path = self.find_module(project_dir)?;
        let module = std::fs::read(&module_path).map_err(|e| ArtifactError::Io {
            path: module_path.clone(),
            message: e.to_string(),
        })?;

        Ok(WasmArtifact {
            module,
            sdk_versions: sdk_versions(project_dir)?,
        })
    }
}

/// Versions of `mamoru-*` crates pinned in the project's `Cargo.lock`
pub fn sdk_versions(project_dir: &Path) -> Result<Vec<SdkVersion>, ArtifactError> {
    let lock_path = project_dir.join("Cargo.lock");
    if !lock_path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(&lock_path).map_err(|e| ArtifactError::Io {
        path: lock_path.clone(),
        message: e.to_string(),
    })?;
    let lock: LockFile = toml::from_str(&raw).map_err(|e| ArtifactError::Parse {
        path: lock_path.clone(),
        message: e.to_string(),
    })?;

    Ok(lock
        .package
        .into_iter()
        .filter(|p| p.name.starts_with(SDK_CRATE_PREFIX))
        .map(|p| SdkVersion {
            name: p.name,
            version: p.version,
        })
        .collect())
}

/// Artifact errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArtifactError {
    #[error("{}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Compilation failed: {0}")]
    Compiler(String),

    #[error("No .wasm module found in {}", .0.display())]
    NoModule(PathBuf),
}
