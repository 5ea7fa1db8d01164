//! Published (data-source) manifest schema
//!
//! Evolves independently from the agent manifest: the version is a fixed
//! literal rather than a semver pattern.

use serde_json::{Map, Value};

use super::field_type::check_named_field;
use super::{child, index, Checker};

pub const PUBLISHED_MANIFEST_VERSION: &str = "0.1";

/// Field name reserved for the generated primary key
pub const RESERVED_FIELD_NAME: &str = "_id";

pub(crate) const RELATION_KINDS: &[&str] = &["oneToOne", "oneToMany", "manyToOne", "manyToMany"];

pub(crate) fn check_published_manifest(c: &mut Checker, root: &Map<String, Value>) {
    if let Some(version) = c.required(root, "version", "") {
        match version.as_str() {
            Some(PUBLISHED_MANIFEST_VERSION) => {}
            _ => c.fail("version", format!("must equal \"{}\"", PUBLISHED_MANIFEST_VERSION)),
        }
    }
    c.required_non_empty(root, "name", "");
    c.optional_string(root, "description", "");

    if let Some(entities) = c.required(root, "entities", "") {
        let items = c.list(entities, "entities", 1);
        let mut names: Vec<String> = Vec::with_capacity(items.len());
        for (idx, entity) in items.iter().enumerate() {
            let path = index("entities", idx);
            if let Some(name) = check_entity(c, entity, &path) {
                if names.contains(&name) {
                    c.fail(&child(&path, "name"), format!("duplicate entity name `{}`", name));
                } else {
                    names.push(name);
                }
            }
        }
    }
}

fn check_entity(c: &mut Checker, entity: &Value, path: &str) -> Option<String> {
    let obj = c.object(entity, path)?;
    let name = c.required_non_empty(obj, "name", path).map(str::to_string);

    let mut declared: Vec<String> = Vec::new();
    if let Some(fields) = c.required(obj, "fields", path) {
        let fields_path = child(path, "fields");
        for (idx, field) in c.list(fields, &fields_path, 1).iter().enumerate() {
            let field_path = index(&fields_path, idx);
            let Some(field_name) = check_named_field(c, field, &field_path, 1) else {
                continue;
            };
            if field_name == RESERVED_FIELD_NAME {
                c.fail(&child(&field_path, "name"), format!("`{}` is reserved", RESERVED_FIELD_NAME));
            } else if declared.contains(&field_name) {
                c.fail(&child(&field_path, "name"), format!("duplicate field name `{}`", field_name));
            } else {
                declared.push(field_name);
            }
        }
    }

    if let Some(relations) = obj.get("relations").filter(|v| !v.is_null()) {
        let relations_path = child(path, "relations");
        if let Some(relations) = c.object(relations, &relations_path) {
            for kind in RELATION_KINDS {
                let Some(list) = relations.get(*kind).filter(|v| !v.is_null()) else {
                    continue;
                };
                let kind_path = child(&relations_path, kind);
                for (idx, relation) in c.list(list, &kind_path, 0).iter().enumerate() {
                    let relation_path = index(&kind_path, idx);
                    check_relation(c, relation, &relation_path, &mut declared);
                }
            }
        }
    }

    name
}

/// Relation local field names share the namespace of declared fields
fn check_relation(c: &mut Checker, relation: &Value, path: &str, taken: &mut Vec<String>) {
    let Some(obj) = c.object(relation, path) else {
        return;
    };
    c.required_non_empty(obj, "entity", path);
    c.optional_bool(obj, "nullable", path);
    c.optional_bool(obj, "eager", path);

    let Some(field) = c.required_non_empty(obj, "field", path) else {
        return;
    };
    let field_path = child(path, "field");
    if field == RESERVED_FIELD_NAME {
        c.fail(&field_path, format!("`{}` is reserved", RESERVED_FIELD_NAME));
    } else if taken.iter().any(|name| name == field) {
        c.fail(&field_path, format!("`{}` collides with another field", field));
    } else {
        taken.push(field.to_string());
    }
}
