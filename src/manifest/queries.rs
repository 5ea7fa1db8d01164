//! Query manifest for SQL agents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::{load_document, ManifestError};
use crate::schema::SchemaKind;

pub const QUERIES_FILE: &str = "queries.yml";

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Alert,
}

impl Severity {
    /// Ledger wire value
    pub fn code(&self) -> i32 {
        match self {
            Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Error => 2,
            Severity::Alert => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Alert => write!(f, "alert"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub query: String,
    pub severity: Severity,
    pub incident_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub queries: Vec<Query>,
}

/// Read `queries.yml` from a project directory
pub fn read_queries(dir: &Path) -> Result<QueryManifest, ManifestError> {
    load_document(&dir.join(QUERIES_FILE))?.into_typed(SchemaKind::QueryManifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_queries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(QUERIES_FILE),
            "queries:\n  - query: SELECT 1 FROM transactions\n    severity: alert\n    incidentMessage: Large transfer\n",
        )
        .unwrap();

        let queries = read_queries(dir.path()).unwrap();
        assert_eq!(queries.version, None);
        assert_eq!(queries.queries[0].severity, Severity::Alert);
        assert_eq!(queries.queries[0].incident_message, "Large transfer");
    }

    #[test]
    fn test_missing_queries_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(read_queries(dir.path()), Err(ManifestError::MissingFile(_))));
    }

    #[test]
    fn test_unknown_severity_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(QUERIES_FILE),
            "queries:\n  - query: SELECT 1\n    severity: critical\n    incidentMessage: x\n",
        )
        .unwrap();

        let err = read_queries(dir.path()).unwrap_err();
        assert!(err.to_string().contains("queries[0].severity: must be one of"));
    }
}
