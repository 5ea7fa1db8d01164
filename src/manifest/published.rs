//! Published (data-source) manifests declaring entities

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{load_document, ManifestError};
use crate::field_type::{resolve_entity, EntityDef, ResolveError, ResolvedEntity};
use crate::schema::SchemaKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedManifest {
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entities: Vec<EntityDef>,
}

impl PublishedManifest {
    /// Resolve every entity in declaration order
    pub fn resolve(&self) -> Result<Vec<ResolvedEntity>, ResolveError> {
        self.entities.iter().map(resolve_entity).collect()
    }
}

/// Read and validate a published manifest file
pub fn read_published_manifest(path: &Path) -> Result<PublishedManifest, ManifestError> {
    load_document(path)?.into_typed(SchemaKind::PublishedManifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DATA_SOURCE: &str = r#"
version: "0.1"
name: transfers
entities:
  - name: transfer
    fields:
      - name: amount
        type: decimal128!
        precision: 38
        scale: 9
      - name: legs
        type: list
        subType:
          type: struct
          fields:
            - name: at
              type: time64
              unit: Nanosecond
    relations:
      manyToOne:
        - field: block
          entity: Block
"#;

    #[test]
    fn test_read_and_resolve() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data-source.yml");
        std::fs::write(&path, DATA_SOURCE).unwrap();

        let manifest = read_published_manifest(&path).unwrap();
        let resolved = manifest.resolve().unwrap();
        let generated: Vec<&str> = resolved[0].generated.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(
            generated,
            vec!["TransferAmountDecimal128", "TransferLegsItemAtTime64", "TransferLegsItemStruct"]
        );
    }

    #[test]
    fn test_version_is_a_fixed_literal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data-source.yml");
        std::fs::write(&path, DATA_SOURCE.replace("\"0.1\"", "0.1.0")).unwrap();

        let err = read_published_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("version: must equal \"0.1\""));
    }
}
