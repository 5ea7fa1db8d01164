//! Recursive field-type checks
//!
//! A field type node references itself through `subType` (lists) and
//! `fields` (structs). The walk carries an explicit depth so deep documents
//! produce a violation instead of exhausting the stack.

use serde_json::{Map, Value};

use super::{child, index, Checker};

/// Maximum nesting of field types (the outermost node is level 1)
pub const MAX_FIELD_DEPTH: usize = 32;

/// Closed set of field type tokens, each optionally suffixed with `!`
pub const FIELD_TYPE_TOKENS: &[&str] = &[
    "boolean",
    "int8",
    "int16",
    "int32",
    "int64",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "float16",
    "float32",
    "float64",
    "string",
    "largestring",
    "binary",
    "largebinary",
    "date32",
    "date64",
    "decimal128",
    "decimal256",
    "time32",
    "time64",
    "fixedsizebinary",
    "list",
    "struct",
];

/// Attributes that are only legal for specific type tokens
pub const CONDITIONAL_ATTRIBUTES: &[&str] = &["precision", "scale", "unit", "size", "subType", "fields"];

pub const TIME_UNITS: &[&str] = &["Second", "Millisecond", "Microsecond", "Nanosecond"];

const MAX_DECIMAL_PARAM: u64 = 255;
const MAX_BINARY_SIZE: u64 = 4_294_967_295;

/// Conditional attributes owned by a type token
pub(crate) fn attributes_for(token: &str) -> &'static [&'static str] {
    match token {
        "decimal128" | "decimal256" => &["precision", "scale"],
        "time32" | "time64" => &["unit"],
        "fixedsizebinary" => &["size"],
        "list" => &["subType"],
        "struct" => &["fields"],
        _ => &[],
    }
}

/// Check a bare field type node (`subType` targets and similar)
pub(crate) fn check_field_type(c: &mut Checker, node: &Value, path: &str, depth: usize) {
    if depth > MAX_FIELD_DEPTH {
        c.fail(path, format!("nesting exceeds {} levels", MAX_FIELD_DEPTH));
        return;
    }
    if let Some(obj) = c.object(node, path) {
        check_type_attributes(c, obj, path, depth);
    }
}

/// Check a named field (`{name, type, ...}`), as used in struct members and entities
pub(crate) fn check_named_field(c: &mut Checker, node: &Value, path: &str, depth: usize) -> Option<String> {
    if depth > MAX_FIELD_DEPTH {
        c.fail(path, format!("nesting exceeds {} levels", MAX_FIELD_DEPTH));
        return None;
    }
    let obj = c.object(node, path)?;
    let name = c.required_non_empty(obj, "name", path).map(str::to_string);
    check_type_attributes(c, obj, path, depth);
    name
}

fn check_type_attributes(c: &mut Checker, obj: &Map<String, Value>, path: &str, depth: usize) {
    let Some(raw) = c.required_string(obj, "type", path) else {
        return;
    };

    let token = raw.strip_suffix('!').unwrap_or(raw);
    if !FIELD_TYPE_TOKENS.contains(&token) {
        c.fail(&child(path, "type"), format!("unknown field type `{}`", raw));
        return;
    }

    let owned = attributes_for(token);
    for attr in CONDITIONAL_ATTRIBUTES {
        if obj.contains_key(*attr) && !owned.contains(attr) {
            c.fail(
                &child(path, attr),
                format!("is not allowed for field type `{}`", token),
            );
        }
    }

    match token {
        "decimal128" | "decimal256" => {
            for attr in ["precision", "scale"] {
                if let Some(value) = c.required(obj, attr, path) {
                    c.integer_in_range(value, &child(path, attr), 0, MAX_DECIMAL_PARAM);
                }
            }
        }
        "time32" | "time64" => {
            if let Some(value) = c.required(obj, "unit", path) {
                c.one_of(value, &child(path, "unit"), TIME_UNITS);
            }
        }
        "fixedsizebinary" => {
            if let Some(value) = c.required(obj, "size", path) {
                c.integer_in_range(value, &child(path, "size"), 0, MAX_BINARY_SIZE);
            }
        }
        "list" => {
            if let Some(sub) = c.required(obj, "subType", path) {
                check_field_type(c, sub, &child(path, "subType"), depth + 1);
            }
        }
        "struct" => {
            if let Some(fields) = c.required(obj, "fields", path) {
                let fields_path = child(path, "fields");
                let members = c.list(fields, &fields_path, 1);
                let mut names: Vec<String> = Vec::with_capacity(members.len());
                for (idx, member) in members.iter().enumerate() {
                    let member_path = index(&fields_path, idx);
                    if let Some(name) = check_named_field(c, member, &member_path, depth + 1) {
                        if names.contains(&name) {
                            c.fail(&child(&member_path, "name"), format!("duplicate field name `{}`", name));
                        } else {
                            names.push(name);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(node: Value) -> Vec<super::super::Violation> {
        let mut c = Checker::default();
        check_field_type(&mut c, &node, "field", 1);
        c.violations().to_vec()
    }

    fn valid_attribute(attr: &str) -> Value {
        match attr {
            "precision" | "scale" => json!(10),
            "unit" => json!("Millisecond"),
            "size" => json!(16),
            "subType" => json!({"type": "int8"}),
            "fields" => json!([{"name": "inner", "type": "string"}]),
            _ => unreachable!(),
        }
    }

    fn complete_node(token: &str) -> Value {
        let mut node = json!({ "type": token });
        for attr in attributes_for(token) {
            node[*attr] = valid_attribute(attr);
        }
        node
    }

    #[test]
    fn test_every_token_with_owned_attributes_is_valid() {
        for token in FIELD_TYPE_TOKENS {
            assert!(run(complete_node(token)).is_empty(), "{} should be valid", token);
            let non_null = format!("{}!", token);
            let mut node = complete_node(token);
            node["type"] = json!(non_null);
            assert!(run(node).is_empty(), "{}! should be valid", token);
        }
    }

    #[test]
    fn test_foreign_attribute_rejected_for_every_token() {
        for token in FIELD_TYPE_TOKENS {
            for attr in CONDITIONAL_ATTRIBUTES {
                if attributes_for(token).contains(attr) {
                    continue;
                }
                let mut node = complete_node(token);
                node[*attr] = valid_attribute(attr);
                let violations = run(node);
                assert!(
                    violations.iter().any(|v| v.path == format!("field.{}", attr)),
                    "{} should be rejected on {}",
                    attr,
                    token
                );
            }
        }
    }

    #[test]
    fn test_missing_owned_attribute_rejected_for_every_token() {
        for token in FIELD_TYPE_TOKENS {
            for attr in attributes_for(token) {
                let mut node = complete_node(token);
                node.as_object_mut().unwrap().remove(*attr);
                let violations = run(node);
                assert!(
                    violations
                        .iter()
                        .any(|v| v.path == format!("field.{}", attr) && v.message == "is required"),
                    "{} should be required on {}",
                    attr,
                    token
                );
            }
        }
    }

    #[test]
    fn test_suffix_does_not_change_attribute_ownership() {
        let violations = run(json!({"type": "time64!", "unit": "Second", "size": 4}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "field.size");
    }

    #[test]
    fn test_unknown_token() {
        let violations = run(json!({"type": "int512"}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "unknown field type `int512`");
    }

    #[test]
    fn test_numeric_bounds() {
        let violations = run(json!({"type": "decimal128", "precision": 256, "scale": 0}));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "field.precision");

        let violations = run(json!({"type": "fixedsizebinary", "size": 4_294_967_296u64}));
        assert_eq!(violations.len(), 1);

        assert!(run(json!({"type": "fixedsizebinary", "size": 4_294_967_295u64})).is_empty());
    }

    #[test]
    fn test_nested_mismatch_reported_at_each_level() {
        let node = json!({
            "type": "list",
            "subType": {
                "type": "struct",
                "fields": [
                    {"name": "a", "type": "int8", "unit": "Second"},
                    {"name": "b", "type": "list", "subType": {"type": "decimal128", "precision": 5}}
                ],
                "size": 3
            }
        });

        let paths: Vec<String> = run(node).into_iter().map(|v| v.path).collect();
        assert_eq!(
            paths,
            vec![
                "field.subType.size".to_string(),
                "field.subType.fields[0].unit".to_string(),
                "field.subType.fields[1].subType.scale".to_string(),
            ]
        );
    }

    fn nested_lists(levels: usize) -> Value {
        let mut node = json!({"type": "int8"});
        for _ in 1..levels {
            node = json!({"type": "list", "subType": node});
        }
        node
    }

    #[test]
    fn test_depth_limit() {
        assert!(run(nested_lists(MAX_FIELD_DEPTH)).is_empty());

        let violations = run(nested_lists(MAX_FIELD_DEPTH + 1));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.starts_with("nesting exceeds"));
    }

    #[test]
    fn test_duplicate_struct_members() {
        let violations = run(json!({
            "type": "struct",
            "fields": [
                {"name": "a", "type": "int8"},
                {"name": "a", "type": "string"}
            ]
        }));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "field.fields[1].name");
    }
}
