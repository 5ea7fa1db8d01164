//! Playbook schema

use serde_json::{Map, Value};

use super::{child, index, Checker, SEVERITY_LEVELS};

pub(crate) fn check_playbook(c: &mut Checker, root: &Map<String, Value>) {
    c.required_non_empty(root, "name", "");
    c.optional_string(root, "description", "");

    if let Some(triggers) = root.get("on").filter(|v| !v.is_null()) {
        for (idx, trigger) in c.list(triggers, "on", 0).iter().enumerate() {
            let path = index("on", idx);
            let Some(obj) = c.object(trigger, &path) else {
                continue;
            };
            c.required_non_empty(obj, "daemonId", &path);
            if let Some(levels) = c.required(obj, "levels", &path) {
                let levels_path = child(&path, "levels");
                c.string_set(levels, &levels_path, 1);
                for (level_idx, level) in levels.as_array().into_iter().flatten().enumerate() {
                    match level.as_str() {
                        Some(token) if !SEVERITY_LEVELS.contains(&token) => c.fail(
                            &index(&levels_path, level_idx),
                            format!("must be one of: {}", SEVERITY_LEVELS.join(", ")),
                        ),
                        _ => {}
                    }
                }
            }
        }
    }

    // Task bodies are interpreted by the playbook engine, only presence is checked here
    if let Some(tasks) = c.required(root, "tasks", "") {
        c.object(tasks, "tasks");
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::{validate, SchemaKind};
    use serde_json::json;

    #[test]
    fn test_valid_playbook() {
        let doc = json!({
            "name": "Pause bridge",
            "on": [{"daemonId": "daemon-1", "levels": ["error", "alert"]}],
            "tasks": {"run": [{"step": "notify"}]}
        });
        assert!(validate(&doc, SchemaKind::Playbook).is_ok());
    }

    #[test]
    fn test_levels_must_be_non_empty_known_set() {
        let doc = json!({
            "name": "Pause bridge",
            "on": [
                {"daemonId": "daemon-1", "levels": []},
                {"daemonId": "daemon-2", "levels": ["panic"]},
                {"daemonId": "daemon-3", "levels": ["info", "info"]}
            ],
            "tasks": {}
        });
        let err = validate(&doc, SchemaKind::Playbook).unwrap_err();
        let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["on[0].levels", "on[1].levels[0]", "on[2].levels[1]"]);
    }

    #[test]
    fn test_tasks_required() {
        let err = validate(&json!({"name": "p"}), SchemaKind::Playbook).unwrap_err();
        assert!(err.has_path("tasks"));
        assert!(err.to_string().starts_with("playbook contains invalid structure"));
    }
}
