//! Agent manifest schema

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::{child, index, Checker};
use crate::ledger::chain::known_chains;

/// Parameter kinds accepted in `parameters[].type`
pub const PARAMETER_TYPES: &[&str] = &[
    "STRING", "NUMBER", "BOOLEAN", "INT8", "INT16", "INT32", "INT64", "INT128", "INT256", "UINT8",
    "UINT16", "UINT32", "UINT64", "UINT128", "UINT256", "ADDRESS", "FLOAT",
];

const AGENT_TYPES: &[&str] = &["sql", "wasm"];

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+\.\d+\.(\*|\d+)$").expect("static pattern"))
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+$").expect("static pattern"))
}

pub(crate) fn check_manifest(c: &mut Checker, root: &Map<String, Value>) {
    if let Some(version) = c.required(root, "version", "") {
        c.matches(version, "version", version_pattern());
    }
    if let Some(agent_type) = c.required(root, "type", "") {
        c.one_of(agent_type, "type", AGENT_TYPES);
    }
    c.required_non_empty(root, "name", "");
    c.optional_string(root, "description", "");

    if let Some(chains) = c.required(root, "chains", "") {
        c.string_set(chains, "chains", 1);
        check_known_chains(c, chains, "chains");
    }
    if let Some(tags) = root.get("tags").filter(|v| !v.is_null()) {
        c.string_set(tags, "tags", 0);
    }
    if let Some(logo) = c.optional_string(root, "logoUrl", "") {
        check_http_url(c, logo, "logoUrl");
    }
    c.optional_bool(root, "subscribable", "");

    if let Some(parameters) = root.get("parameters").filter(|v| !v.is_null()) {
        let items = c.list(parameters, "parameters", 0);
        let mut keys: Vec<String> = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let path = index("parameters", idx);
            if let Some(key) = check_parameter(c, item, &path) {
                if keys.contains(&key) {
                    c.fail(&child(&path, "key"), format!("duplicate parameter key `{}`", key));
                } else {
                    keys.push(key);
                }
            }
        }
    }
}

/// Chain tokens must be ones the ledger can encode
fn check_known_chains(c: &mut Checker, value: &Value, path: &str) {
    let Some(items) = value.as_array() else {
        return;
    };
    for (idx, item) in items.iter().enumerate() {
        if let Some(chain) = item.as_str() {
            if !known_chains().any(|known| known == chain) {
                c.fail(&index(path, idx), format!("unknown chain `{}`", chain));
            }
        }
    }
}

fn check_http_url(c: &mut Checker, raw: &str, path: &str) {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => c.fail(path, format!("unsupported URL scheme `{}`", parsed.scheme())),
        Err(e) => c.fail(path, format!("must be a valid URL ({})", e)),
    }
}

fn check_parameter(c: &mut Checker, item: &Value, path: &str) -> Option<String> {
    let obj = c.object(item, path)?;

    if let Some(kind) = c.required(obj, "type", path) {
        c.one_of(kind, &child(path, "type"), PARAMETER_TYPES);
    }
    let key = c
        .required(obj, "key", path)
        .and_then(|key| c.matches(key, &child(path, "key"), key_pattern()));
    c.required_string(obj, "title", path);
    c.optional_string(obj, "description", path);
    c.optional_string(obj, "symbol", path);

    match obj.get("defaultValue") {
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Number(_)) | Some(Value::Bool(_)) => {}
        Some(_) => c.fail(
            &child(path, "defaultValue"),
            "must be a string, number or boolean",
        ),
    }

    for set in ["requiredFor", "hiddenFor"] {
        if let Some(chains) = obj.get(set).filter(|v| !v.is_null()) {
            let set_path = child(path, set);
            c.string_set(chains, &set_path, 0);
            check_known_chains(c, chains, &set_path);
        }
    }

    c.optional_number(obj, "max", path);
    c.optional_number(obj, "min", path);
    for len in ["maxLen", "minLen"] {
        if let Some(value) = obj.get(len).filter(|v| !v.is_null()) {
            c.integer_in_range(value, &child(path, len), 0, u64::MAX);
        }
    }

    key
}
