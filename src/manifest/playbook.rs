//! Playbook documents

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use super::{load_document, null_as_default, ManifestError, Severity};
use crate::schema::SchemaKind;

pub const PLAYBOOK_FILE: &str = "playbook.yml";

/// Daemon incidents that start the playbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookTrigger {
    pub daemon_id: String,
    pub levels: Vec<Severity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub on: Vec<PlaybookTrigger>,
    /// Interpreted by the playbook engine
    pub tasks: Map<String, Value>,
}

/// Read `playbook.yml` from a project directory
pub fn read_playbook(dir: &Path) -> Result<Playbook, ManifestError> {
    load_document(&dir.join(PLAYBOOK_FILE))?.into_typed(SchemaKind::Playbook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_playbook() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PLAYBOOK_FILE),
            r#"
name: Pause bridge
on:
  - daemonId: daemon-1
    levels: [error, alert]
tasks:
  run:
    - step: notify
"#,
        )
        .unwrap();

        let playbook = read_playbook(dir.path()).unwrap();
        assert_eq!(playbook.on[0].daemon_id, "daemon-1");
        assert_eq!(playbook.on[0].levels, vec![Severity::Error, Severity::Alert]);
        assert!(playbook.tasks.contains_key("run"));
    }

    #[test]
    fn test_tasks_required() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PLAYBOOK_FILE), "name: Pause bridge\n").unwrap();

        let err = read_playbook(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("playbook contains invalid structure"));
        assert!(err.to_string().contains("tasks: is required"));
    }
}
