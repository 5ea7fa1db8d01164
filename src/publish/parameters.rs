//! Chain resolution and parameter values

use serde_json::Value;
use std::collections::BTreeMap;

use super::PublishError;
use crate::manifest::ManifestParameter;

/// Parameter key to string value, ordered for a stable payload
pub type ParameterValues = BTreeMap<String, String>;

/// Parse the `--parameters` flag: a JSON object of scalar values
pub fn parse_parameters_flag(raw: &str) -> Result<ParameterValues, PublishError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| PublishError::InvalidParameters(format!("malformed JSON: {}", e)))?;
    let Value::Object(object) = value else {
        return Err(PublishError::InvalidParameters(
            "expected a JSON object of key/value pairs".to_string(),
        ));
    };

    object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(PublishError::InvalidParameters(format!(
                        "value of `{}` must be a string, number or boolean",
                        key
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

/// Reject a chain the agent does not declare
pub fn ensure_supported(chain: &str, supported: &[String]) -> Result<(), PublishError> {
    if supported.iter().any(|c| c == chain) {
        Ok(())
    } else {
        Err(PublishError::UnsupportedChain {
            chain: chain.to_string(),
            supported: supported.to_vec(),
        })
    }
}

/// Chain for a daemon without prompting: the explicit one, or the only supported one
pub fn resolve_chain(explicit: Option<&str>, supported: &[String]) -> Result<String, PublishError> {
    match (explicit, supported) {
        (Some(chain), _) => {
            ensure_supported(chain, supported)?;
            Ok(chain.to_string())
        }
        (None, [only]) => Ok(only.clone()),
        (None, _) => Err(PublishError::AmbiguousChain(supported.to_vec())),
    }
}

/// Parameters the user is asked about on `chain`
pub fn visible_parameters<'a>(
    parameters: &'a [ManifestParameter],
    chain: &str,
) -> Vec<&'a ManifestParameter> {
    parameters.iter().filter(|p| !p.is_hidden_for(chain)).collect()
}

/// Check supplied values against the declarations, then fill defaults.
///
/// Unknown keys are rejected; a parameter required for `chain` must end up
/// with a value.
pub fn complete_values(
    parameters: &[ManifestParameter],
    chain: &str,
    mut values: ParameterValues,
) -> Result<ParameterValues, PublishError> {
    if let Some(unknown) = values.keys().find(|k| !parameters.iter().any(|p| &p.key == *k)) {
        return Err(PublishError::InvalidParameters(format!(
            "unknown parameter `{}`",
            unknown
        )));
    }

    for param in parameters {
        if values.contains_key(&param.key) || param.is_hidden_for(chain) {
            continue;
        }
        if let Some(default) = &param.default_value {
            values.insert(param.key.clone(), default.to_string());
        } else if param.is_required_for(chain) {
            return Err(PublishError::MissingParameter {
                key: param.key.clone(),
                chain: chain.to_string(),
            });
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ParameterType, ParameterValue};

    fn param(key: &str) -> ManifestParameter {
        ManifestParameter {
            kind: ParameterType::String,
            key: key.to_string(),
            title: key.to_string(),
            description: None,
            default_value: None,
            required_for: vec![],
            hidden_for: vec![],
            max: None,
            min: None,
            max_len: None,
            min_len: None,
            symbol: None,
        }
    }

    fn chains(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_parse_flag_normalises_scalars() {
        let values = parse_parameters_flag(r#"{"threshold": 10, "enabled": true, "token": "0x2"}"#).unwrap();
        assert_eq!(values["threshold"], "10");
        assert_eq!(values["enabled"], "true");
        assert_eq!(values["token"], "0x2");
    }

    #[test]
    fn test_parse_flag_malformed_json() {
        let err = parse_parameters_flag("{not json").unwrap_err();
        assert!(matches!(err, PublishError::InvalidParameters(_)));
        assert!(err.to_string().contains("malformed JSON"));
    }

    #[test]
    fn test_parse_flag_rejects_non_objects() {
        for raw in ["[1, 2]", "42", "\"text\"", "null"] {
            assert!(matches!(
                parse_parameters_flag(raw),
                Err(PublishError::InvalidParameters(_))
            ));
        }
        assert!(parse_parameters_flag(r#"{"nested": {"a": 1}}"#).is_err());
    }

    #[test]
    fn test_resolve_chain() {
        assert_eq!(resolve_chain(None, &chains(&["SUI_TESTNET"])).unwrap(), "SUI_TESTNET");
        assert_eq!(
            resolve_chain(Some("SUI_MAINNET"), &chains(&["SUI_TESTNET", "SUI_MAINNET"])).unwrap(),
            "SUI_MAINNET"
        );
        assert!(matches!(
            resolve_chain(None, &chains(&["SUI_TESTNET", "SUI_MAINNET"])),
            Err(PublishError::AmbiguousChain(_))
        ));
        assert!(matches!(
            resolve_chain(Some("XXX"), &chains(&["SUI_TESTNET"])),
            Err(PublishError::UnsupportedChain { .. })
        ));
    }

    #[test]
    fn test_complete_values_fills_defaults() {
        let mut threshold = param("threshold");
        threshold.default_value = Some(ParameterValue::Number(1000.into()));
        let values = complete_values(&[threshold], "SUI_TESTNET", ParameterValues::new()).unwrap();
        assert_eq!(values["threshold"], "1000");
    }

    #[test]
    fn test_required_for_chain() {
        let mut token = param("token");
        token.required_for = chains(&["SUI_MAINNET"]);

        assert!(complete_values(&[token.clone()], "SUI_TESTNET", ParameterValues::new()).is_ok());
        let err = complete_values(&[token], "SUI_MAINNET", ParameterValues::new()).unwrap_err();
        assert!(matches!(err, PublishError::MissingParameter { key, .. } if key == "token"));
    }

    #[test]
    fn test_hidden_parameters() {
        let mut token = param("token");
        token.hidden_for = chains(&["SUI_TESTNET"]);
        token.default_value = Some(ParameterValue::String("x".to_string()));
        let params = [token, param("other")];

        assert_eq!(visible_parameters(&params, "SUI_TESTNET").len(), 1);
        let values = complete_values(&params, "SUI_TESTNET", ParameterValues::new()).unwrap();
        assert!(!values.contains_key("token"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut values = ParameterValues::new();
        values.insert("nope".to_string(), "1".to_string());
        assert!(matches!(
            complete_values(&[param("token")], "SUI_TESTNET", values),
            Err(PublishError::InvalidParameters(m)) if m.contains("nope")
        ));
    }
}
