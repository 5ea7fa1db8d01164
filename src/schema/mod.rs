//! Schema validation for manifest, playbook and query documents
//!
//! Documents are validated as a generic `serde_json::Value` graph before they
//! are deserialized into typed structs. Every check runs to completion so the
//! caller sees all violations at once, in document order.
//!
//! Four independent schemas are supported:
//! - `Manifest`: the CLI agent manifest (`manifest.yml`)
//! - `Playbook`: playbook definitions (`playbook.yml`)
//! - `PublishedManifest`: data-source manifests with entity declarations
//! - `QueryManifest`: query lists for SQL agents (`queries.yml`)

mod field_type;
mod manifest;
mod playbook;
mod published;
mod queries;

pub(crate) use field_type::attributes_for;
pub use field_type::{CONDITIONAL_ATTRIBUTES, FIELD_TYPE_TOKENS, MAX_FIELD_DEPTH, TIME_UNITS};
pub use manifest::PARAMETER_TYPES;
pub use published::{PUBLISHED_MANIFEST_VERSION, RESERVED_FIELD_NAME};

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

/// Incident severity tokens shared by queries and playbook triggers
pub const SEVERITY_LEVELS: &[&str] = &["info", "warning", "error", "alert"];

/// Which schema a document is validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Manifest,
    Playbook,
    PublishedManifest,
    QueryManifest,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Manifest => write!(f, "manifest"),
            SchemaKind::Playbook => write!(f, "playbook"),
            SchemaKind::PublishedManifest => write!(f, "published manifest"),
            SchemaKind::QueryManifest => write!(f, "query manifest"),
        }
    }
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location in `a.b[0].c` notation, empty for the document root
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Non-empty list of violations for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub kind: SchemaKind,
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    /// Numbered, newline separated listing behind a fixed banner.
    ///
    /// Callers match on the `"<document> contains invalid structure"` prefix,
    /// keep it stable.
    pub fn render(&self) -> String {
        let mut out = format!("{} contains invalid structure:", self.kind);
        for (idx, violation) in self.violations.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", idx + 1, violation));
        }
        out
    }

    /// True if any violation is reported at exactly `path`
    pub fn has_path(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl std::error::Error for ValidationErrors {}

/// Validate a parsed document against the selected schema
pub fn validate(document: &Value, kind: SchemaKind) -> Result<(), ValidationErrors> {
    let mut checker = Checker::default();

    match document {
        Value::Null => checker.fail("", "document is empty"),
        Value::Object(root) => match kind {
            SchemaKind::Manifest => manifest::check_manifest(&mut checker, root),
            SchemaKind::Playbook => playbook::check_playbook(&mut checker, root),
            SchemaKind::PublishedManifest => published::check_published_manifest(&mut checker, root),
            SchemaKind::QueryManifest => queries::check_query_manifest(&mut checker, root),
        },
        _ => checker.fail("", "must be an object"),
    }

    checker.finish(kind)
}

//=============================================================================
// CHECKER
//=============================================================================

/// Violation accumulator with typed accessors.
///
/// Accessors record a violation and return `None` when the value has the
/// wrong shape, so callers can skip dependent checks without bailing out.
#[derive(Debug, Default)]
pub(crate) struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    pub(crate) fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn finish(self, kind: SchemaKind) -> Result<(), ValidationErrors> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                kind,
                violations: self.violations,
            })
        }
    }

    pub(crate) fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.fail(path, "must be an object");
                None
            }
        }
    }

    pub(crate) fn required<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'a Value> {
        match obj.get(key) {
            Some(Value::Null) | None => {
                self.fail(&child(path, key), "is required");
                None
            }
            Some(value) => Some(value),
        }
    }

    pub(crate) fn string<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a str> {
        match value.as_str() {
            Some(s) => Some(s),
            None => {
                self.fail(path, "must be a string");
                None
            }
        }
    }

    pub(crate) fn required_string<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'a str> {
        let value = self.required(obj, key, path)?;
        self.string(value, &child(path, key))
    }

    pub(crate) fn required_non_empty<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'a str> {
        let s = self.required_string(obj, key, path)?;
        if s.trim().is_empty() {
            self.fail(&child(path, key), "must not be empty");
            return None;
        }
        Some(s)
    }

    pub(crate) fn optional_string<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'a str> {
        match obj.get(key) {
            Some(Value::Null) | None => None,
            Some(value) => self.string(value, &child(path, key)),
        }
    }

    pub(crate) fn optional_bool(&mut self, obj: &Map<String, Value>, key: &str, path: &str) {
        match obj.get(key) {
            Some(Value::Null) | None | Some(Value::Bool(_)) => {}
            Some(_) => self.fail(&child(path, key), "must be a boolean"),
        }
    }

    pub(crate) fn optional_number(&mut self, obj: &Map<String, Value>, key: &str, path: &str) {
        match obj.get(key) {
            Some(Value::Null) | None | Some(Value::Number(_)) => {}
            Some(_) => self.fail(&child(path, key), "must be a number"),
        }
    }

    /// Integer within an inclusive range; out-of-range values are rejected, never clamped
    pub(crate) fn integer_in_range(&mut self, value: &Value, path: &str, min: u64, max: u64) -> Option<u64> {
        let Some(n) = value.as_u64() else {
            self.fail(path, "must be a non-negative integer");
            return None;
        };
        if n < min || n > max {
            self.fail(path, format!("must be between {} and {}", min, max));
            return None;
        }
        Some(n)
    }

    pub(crate) fn one_of(&mut self, value: &Value, path: &str, allowed: &[&str]) -> Option<String> {
        let s = self.string(value, path)?;
        if allowed.contains(&s) {
            Some(s.to_string())
        } else {
            self.fail(path, format!("must be one of: {}", allowed.join(", ")));
            None
        }
    }

    pub(crate) fn matches(&mut self, value: &Value, path: &str, pattern: &Regex) -> Option<String> {
        let s = self.string(value, path)?;
        if pattern.is_match(s) {
            Some(s.to_string())
        } else {
            self.fail(path, format!("must match pattern {}", pattern.as_str()));
            None
        }
    }

    /// Array of unique strings with at least `min_items` entries
    pub(crate) fn string_set(&mut self, value: &Value, path: &str, min_items: usize) -> Vec<String> {
        let Some(items) = value.as_array() else {
            self.fail(path, "must be a list");
            return Vec::new();
        };
        if items.len() < min_items {
            self.fail(path, format!("must contain at least {} entry", min_items));
        }

        let mut seen: Vec<String> = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let item_path = index(path, idx);
            if let Some(s) = self.string(item, &item_path) {
                if seen.iter().any(|existing| existing == s) {
                    self.fail(&item_path, format!("duplicate entry `{}`", s));
                } else {
                    seen.push(s.to_string());
                }
            }
        }
        seen
    }

    /// Array accessor that enforces a minimum length
    pub(crate) fn list<'a>(&mut self, value: &'a Value, path: &str, min_items: usize) -> &'a [Value] {
        match value.as_array() {
            Some(items) => {
                if items.len() < min_items {
                    self.fail(path, format!("must contain at least {} entry", min_items));
                }
                items.as_slice()
            }
            None => {
                self.fail(path, "must be a list");
                &[]
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

pub(crate) fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

pub(crate) fn index(path: &str, idx: usize) -> String {
    format!("{}[{}]", path, idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_is_a_violation() {
        let err = validate(&Value::Null, SchemaKind::Manifest).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].message, "document is empty");
    }

    #[test]
    fn test_non_object_root() {
        let err = validate(&json!(["a"]), SchemaKind::Playbook).unwrap_err();
        assert_eq!(err.violations[0].message, "must be an object");
    }

    #[test]
    fn test_render_format() {
        let err = ValidationErrors {
            kind: SchemaKind::Manifest,
            violations: vec![
                Violation {
                    path: "".to_string(),
                    message: "document is empty".to_string(),
                },
                Violation {
                    path: "chains[0]".to_string(),
                    message: "must be a string".to_string(),
                },
            ],
        };

        assert_eq!(
            err.to_string(),
            "manifest contains invalid structure:\n1. document is empty\n2. chains[0]: must be a string"
        );
    }

    #[test]
    fn test_string_set_reports_duplicates() {
        let mut checker = Checker::default();
        let values = checker.string_set(&json!(["a", "b", "a"]), "tags", 0);
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(checker.violations().len(), 1);
        assert_eq!(checker.violations()[0].path, "tags[2]");
    }

    #[test]
    fn test_integer_range_is_not_clamped() {
        let mut checker = Checker::default();
        assert_eq!(checker.integer_in_range(&json!(256), "precision", 0, 255), None);
        assert_eq!(checker.integer_in_range(&json!(255), "precision", 0, 255), Some(255));
        assert_eq!(checker.integer_in_range(&json!(-1), "precision", 0, 255), None);
        assert_eq!(checker.violations().len(), 2);
    }
}
