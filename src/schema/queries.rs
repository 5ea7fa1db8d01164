//! Query manifest schema for SQL agents

use serde_json::{Map, Value};

use super::{child, index, Checker, SEVERITY_LEVELS};

pub(crate) fn check_query_manifest(c: &mut Checker, root: &Map<String, Value>) {
    c.optional_string(root, "version", "");

    let Some(queries) = c.required(root, "queries", "") else {
        return;
    };
    for (idx, query) in c.list(queries, "queries", 1).iter().enumerate() {
        let path = index("queries", idx);
        let Some(obj) = c.object(query, &path) else {
            continue;
        };
        c.required_non_empty(obj, "query", &path);
        if let Some(severity) = c.required(obj, "severity", &path) {
            c.one_of(severity, &child(&path, "severity"), SEVERITY_LEVELS);
        }
        c.required_string(obj, "incidentMessage", &path);
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{validate, SchemaKind};
    use serde_json::json;

    #[test]
    fn test_valid_queries() {
        let doc = json!({
            "version": "1",
            "queries": [
                {"query": "SELECT 1 FROM transactions", "severity": "alert", "incidentMessage": "hit"}
            ]
        });
        assert!(validate(&doc, SchemaKind::QueryManifest).is_ok());
    }

    #[test]
    fn test_query_rules() {
        let doc = json!({
            "queries": [
                {"query": "", "severity": "fatal"},
                "SELECT 1"
            ]
        });
        let err = validate(&doc, SchemaKind::QueryManifest).unwrap_err();
        let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "queries[0].query",
                "queries[0].severity",
                "queries[0].incidentMessage",
                "queries[1]",
            ]
        );
    }

    #[test]
    fn test_at_least_one_query() {
        let err = validate(&json!({"queries": []}), SchemaKind::QueryManifest).unwrap_err();
        assert!(err.has_path("queries"));
    }
}
