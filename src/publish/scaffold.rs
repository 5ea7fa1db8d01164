//! Project scaffolding for `init` and `playbook init`

use serde_json::Map;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::manifest::{
    find_manifest, write_manifest, AgentType, Manifest, Playbook, Query, QueryManifest, Severity,
    PLAYBOOK_FILE, QUERIES_FILE,
};

/// What `init` needs to know about the new agent
#[derive(Debug, Clone)]
pub struct AgentTemplate {
    pub name: String,
    pub agent_type: AgentType,
    pub chains: Vec<String>,
    pub subscribable: bool,
}

pub trait ProjectScaffolder: Send + Sync {
    /// Write a new agent project, returning the files created
    fn scaffold_agent(&self, dir: &Path, template: &AgentTemplate) -> Result<Vec<PathBuf>, ScaffoldError>;
    fn scaffold_playbook(&self, dir: &Path, name: &str) -> Result<Vec<PathBuf>, ScaffoldError>;
}

/// Writes a minimal, valid project
#[derive(Debug, Clone, Default)]
pub struct DefaultScaffolder;

impl DefaultScaffolder {
    fn write(path: &Path, content: &str) -> Result<PathBuf, ScaffoldError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ScaffoldError::Io(e.to_string()))?;
        }
        std::fs::write(path, content)
            .map_err(|e| ScaffoldError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(path.to_path_buf())
    }
}

impl ProjectScaffolder for DefaultScaffolder {
    fn scaffold_agent(&self, dir: &Path, template: &AgentTemplate) -> Result<Vec<PathBuf>, ScaffoldError> {
        if let Ok(existing) = find_manifest(dir) {
            return Err(ScaffoldError::AlreadyExists(existing));
        }

        if template.agent_type == AgentType::Wasm {
            crate_name(&template.name)?;
        }

        let manifest = Manifest {
            version: "0.0.1".to_string(),
            agent_type: template.agent_type,
            name: template.name.clone(),
            description: None,
            chains: template.chains.clone(),
            tags: Vec::new(),
            logo_url: None,
            subscribable: template.subscribable,
            parameters: Vec::new(),
        };
        let manifest_path = dir.join("manifest.yml");
        write_manifest(&manifest, &manifest_path).map_err(|e| ScaffoldError::Io(e.to_string()))?;
        let mut created = vec![manifest_path];

        match template.agent_type {
            AgentType::Sql => {
                let queries = QueryManifest {
                    version: Some("1".to_string()),
                    queries: vec![Query {
                        query: "SELECT 1 FROM transactions t WHERE t.gas_used > 1000000".to_string(),
                        severity: Severity::Alert,
                        incident_message: "Transaction used excessive gas".to_string(),
                    }],
                };
                let yaml = serde_yaml::to_string(&queries).map_err(|e| ScaffoldError::Io(e.to_string()))?;
                created.push(Self::write(&dir.join(QUERIES_FILE), &yaml)?);
            }
            AgentType::Wasm => {
                let crate_name = crate_name(&template.name)?;
                let cargo = format!(
                    "[package]\nname = \"{}\"\nversion = \"0.0.1\"\nedition = \"2021\"\n\n\
                     [lib]\ncrate-type = [\"cdylib\"]\n\n\
                     [dependencies]\nmamoru-sdk = \"0.1\"\n",
                    crate_name
                );
                created.push(Self::write(&dir.join("Cargo.toml"), &cargo)?);
                created.push(Self::write(
                    &dir.join("src").join("lib.rs"),
                    "use mamoru_sdk::{report, BlockchainCtx};\n\n\
                     #[no_mangle]\npub fn main() {\n    let ctx = BlockchainCtx::new();\n    \
                     if ctx.transactions().is_empty() {\n        report(\"empty block\");\n    }\n}\n",
                )?);
            }
        }

        info!(dir = %dir.display(), files = created.len(), "Scaffolded agent");
        Ok(created)
    }

    fn scaffold_playbook(&self, dir: &Path, name: &str) -> Result<Vec<PathBuf>, ScaffoldError> {
        let path = dir.join(PLAYBOOK_FILE);
        if path.exists() {
            return Err(ScaffoldError::AlreadyExists(path));
        }

        let mut tasks = Map::new();
        tasks.insert(
            "run".to_string(),
            serde_json::json!([{ "step": "notify", "params": { "channel": "default" } }]),
        );
        let playbook = Playbook {
            name: name.to_string(),
            description: None,
            on: Vec::new(),
            tasks,
        };
        let yaml = serde_yaml::to_string(&playbook).map_err(|e| ScaffoldError::Io(e.to_string()))?;
        let created = Self::write(&path, &yaml)?;

        info!(path = %created.display(), "Scaffolded playbook");
        Ok(vec![created])
    }
}

/// Cargo package name for a wasm agent: lowercase ASCII words joined by `-`
fn crate_name(agent_name: &str) -> Result<String, ScaffoldError> {
    let name = agent_name
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    match name.chars().next() {
        None => Err(ScaffoldError::InvalidName(agent_name.to_string())),
        Some(first) if first.is_ascii_digit() => Ok(format!("agent-{}", name)),
        Some(_) => Ok(name),
    }
}

/// Scaffolding errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScaffoldError {
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("`{0}` cannot be turned into a crate name: use at least one ASCII letter or digit")]
    InvalidName(String),

    #[error("Failed to write project: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{read_manifest, read_playbook, read_queries};
    use tempfile::TempDir;

    fn template(agent_type: AgentType) -> AgentTemplate {
        AgentTemplate {
            name: "Large Transfers".to_string(),
            agent_type,
            chains: vec!["SUI_TESTNET".to_string()],
            subscribable: false,
        }
    }

    #[test]
    fn test_sql_project_is_valid() {
        let dir = TempDir::new().unwrap();
        let created = DefaultScaffolder.scaffold_agent(dir.path(), &template(AgentType::Sql)).unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(read_manifest(dir.path()).unwrap().name, "Large Transfers");
        assert_eq!(read_queries(dir.path()).unwrap().queries.len(), 1);
    }

    #[test]
    fn test_wasm_project_layout() {
        let dir = TempDir::new().unwrap();
        DefaultScaffolder.scaffold_agent(dir.path(), &template(AgentType::Wasm)).unwrap();

        let cargo = std::fs::read_to_string(dir.path().join("Cargo.toml")).unwrap();
        assert!(cargo.contains("name = \"large-transfers\""));
        assert!(dir.path().join("src/lib.rs").exists());
    }

    #[test]
    fn test_wasm_name_without_ascii_alphanumerics() {
        let dir = TempDir::new().unwrap();
        let mut template = template(AgentType::Wasm);
        template.name = "*** ---".to_string();

        assert!(matches!(
            DefaultScaffolder.scaffold_agent(dir.path(), &template),
            Err(ScaffoldError::InvalidName(name)) if name == "*** ---"
        ));
        assert!(!dir.path().join("manifest.yml").exists());
    }

    #[test]
    fn test_crate_name_never_starts_with_a_digit() {
        assert_eq!(crate_name("1inch Swaps").unwrap(), "agent-1inch-swaps");
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        DefaultScaffolder.scaffold_agent(dir.path(), &template(AgentType::Sql)).unwrap();
        assert!(matches!(
            DefaultScaffolder.scaffold_agent(dir.path(), &template(AgentType::Sql)),
            Err(ScaffoldError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_playbook_is_valid() {
        let dir = TempDir::new().unwrap();
        DefaultScaffolder.scaffold_playbook(dir.path(), "Pause bridge").unwrap();
        assert_eq!(read_playbook(dir.path()).unwrap().name, "Pause bridge");
    }
}
