//! Ledger message and response payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::chain::{chain_to_wire, chains_from_wire, chains_to_wire};
use super::LedgerError;
use crate::manifest::{Manifest, ManifestParameter, ParameterType, Playbook, QueryManifest};

const TYPE_URL_PREFIX: &str = "/validationchain.validationchain.";

/// Standalone agent: metadata plus one daemon
pub const METADATA_TYPE_STANDALONE: i32 = 1;
/// Reusable template: daemons are launched from it later
pub const METADATA_TYPE_SUBSCRIBABLE: i32 = 2;

//==============================================================================
// Messages
//==============================================================================

/// Transactions the CLI submits
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerMessage {
    RegisterDaemonMetadata(RegisterDaemonMetadata),
    RegisterDaemon(RegisterDaemon),
    RegisterPlaybook(RegisterPlaybook),
    RemovePlaybook(RemovePlaybook),
}

impl LedgerMessage {
    /// Message type name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            LedgerMessage::RegisterDaemonMetadata(_) => "MsgRegisterDaemonMetadata",
            LedgerMessage::RegisterDaemon(_) => "MsgRegisterDaemon",
            LedgerMessage::RegisterPlaybook(_) => "MsgRegisterPlaybook",
            LedgerMessage::RemovePlaybook(_) => "MsgRemovePlaybook",
        }
    }

    pub fn type_url(&self) -> String {
        format!("{}{}", TYPE_URL_PREFIX, self.name())
    }

    /// `{typeUrl, value}` envelope
    pub fn to_wire(&self) -> Result<Value, LedgerError> {
        let value = match self {
            LedgerMessage::RegisterDaemonMetadata(m) => serde_json::to_value(m),
            LedgerMessage::RegisterDaemon(m) => serde_json::to_value(m),
            LedgerMessage::RegisterPlaybook(m) => serde_json::to_value(m),
            LedgerMessage::RemovePlaybook(m) => serde_json::to_value(m),
        }
        .map_err(|e| LedgerError::Encode(e.to_string()))?;

        Ok(serde_json::json!({
            "typeUrl": self.type_url(),
            "value": value,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDaemonMetadata {
    pub title: String,
    pub description: String,
    pub logo_url: String,
    pub tags: Vec<String>,
    pub metadata_type: i32,
    pub supported_chains: Vec<i32>,
    pub parameters: Vec<DaemonParameterSpec>,
    pub content: DaemonContent,
}

impl RegisterDaemonMetadata {
    pub fn from_manifest(manifest: &Manifest, content: DaemonContent) -> Result<Self, LedgerError> {
        Ok(Self {
            title: manifest.name.clone(),
            description: manifest.description.clone().unwrap_or_default(),
            logo_url: manifest.logo_url.clone().unwrap_or_default(),
            tags: manifest.tags.clone(),
            metadata_type: if manifest.subscribable {
                METADATA_TYPE_SUBSCRIBABLE
            } else {
                METADATA_TYPE_STANDALONE
            },
            supported_chains: chains_to_wire(&manifest.chains)?,
            parameters: manifest
                .parameters
                .iter()
                .map(DaemonParameterSpec::from_manifest)
                .collect::<Result<_, _>>()?,
            content,
        })
    }
}

/// Agent body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DaemonContent {
    Sql {
        queries: Vec<QuerySpec>,
    },
    #[serde(rename_all = "camelCase")]
    Wasm {
        /// Base64 encoded module
        module: String,
        /// Hex SHA-256 of the raw module
        digest: String,
        sdk_versions: Vec<SdkVersion>,
    },
}

impl DaemonContent {
    pub fn sql(queries: &QueryManifest) -> Self {
        DaemonContent::Sql {
            queries: queries
                .queries
                .iter()
                .map(|q| QuerySpec {
                    query: q.query.clone(),
                    severity: q.severity.code(),
                    incident_message: q.incident_message.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub query: String,
    pub severity: i32,
    pub incident_message: String,
}

/// SDK crate a wasm agent was built against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkVersion {
    pub name: String,
    pub version: String,
}

/// Parameter declaration as stored on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonParameterSpec {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub required_for: Vec<i32>,
    #[serde(default)]
    pub hidden_for: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_len: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl DaemonParameterSpec {
    pub fn from_manifest(param: &ManifestParameter) -> Result<Self, LedgerError> {
        Ok(Self {
            kind: param.kind,
            key: param.key.clone(),
            title: param.title.clone(),
            description: param.description.clone().unwrap_or_default(),
            default_value: param.default_value.as_ref().map(|v| v.to_string()),
            required_for: chains_to_wire(&param.required_for)?,
            hidden_for: chains_to_wire(&param.hidden_for)?,
            max: param.max,
            min: param.min,
            max_len: param.max_len,
            min_len: param.min_len,
            symbol: param.symbol.clone(),
        })
    }

    /// Back to the manifest shape, with chain names restored
    pub fn to_manifest(&self) -> Result<ManifestParameter, LedgerError> {
        Ok(ManifestParameter {
            kind: self.kind,
            key: self.key.clone(),
            title: self.title.clone(),
            description: Some(self.description.clone()).filter(|d| !d.is_empty()),
            default_value: self.default_value.clone().map(crate::manifest::ParameterValue::String),
            required_for: chains_from_wire(&self.required_for)?,
            hidden_for: chains_from_wire(&self.hidden_for)?,
            max: self.max,
            min: self.min,
            max_len: self.max_len,
            min_len: self.min_len,
            symbol: self.symbol.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDaemon {
    pub daemon_metadata_id: String,
    pub chain: i32,
    pub parameters: Vec<DaemonParameterValue>,
}

impl RegisterDaemon {
    pub fn new(
        daemon_metadata_id: &str,
        chain: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            daemon_metadata_id: daemon_metadata_id.to_string(),
            chain: chain_to_wire(chain)?,
            parameters: values
                .iter()
                .map(|(key, value)| DaemonParameterValue {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonParameterValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPlaybook {
    pub name: String,
    pub description: String,
    pub triggers: Vec<PlaybookTriggerSpec>,
    pub tasks: Value,
}

impl From<&Playbook> for RegisterPlaybook {
    fn from(playbook: &Playbook) -> Self {
        Self {
            name: playbook.name.clone(),
            description: playbook.description.clone().unwrap_or_default(),
            triggers: playbook
                .on
                .iter()
                .map(|t| PlaybookTriggerSpec {
                    daemon_id: t.daemon_id.clone(),
                    levels: t.levels.iter().map(|l| l.code()).collect(),
                })
                .collect(),
            tasks: Value::Object(playbook.tasks.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookTriggerSpec {
    pub daemon_id: String,
    pub levels: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePlaybook {
    pub playbook_id: String,
}

//==============================================================================
// Responses
//==============================================================================

/// Fee attached to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub gas: u64,
}

pub const DEFAULT_GAS: u64 = 200_000_000;

impl Default for Fee {
    fn default() -> Self {
        Self { gas: DEFAULT_GAS }
    }
}

/// Synchronous broadcast result. Carries no created ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxResponse {
    pub transaction_hash: String,
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
}

/// Decoded message response from a committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedResponse {
    RegisterDaemonMetadata { daemon_metadata_id: String },
    RegisterDaemon { daemon_id: String },
    RegisterPlaybook { playbook_id: String },
    /// Responses the CLI has no use for
    Other { type_url: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    type_url: String,
    #[serde(default)]
    value: Value,
}

impl DecodedResponse {
    /// Decode one `{typeUrl, value}` entry
    pub fn from_wire(raw: Value) -> Result<Self, LedgerError> {
        let raw: RawResponse =
            serde_json::from_value(raw).map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        let name = raw.type_url.strip_prefix(TYPE_URL_PREFIX).unwrap_or(&raw.type_url);

        let id_field = match name {
            "MsgRegisterDaemonMetadataResponse" => "daemonMetadataId",
            "MsgRegisterDaemonResponse" => "daemonId",
            "MsgRegisterPlaybookResponse" => "playbookId",
            _ => return Ok(DecodedResponse::Other { type_url: raw.type_url }),
        };
        let id = raw
            .value
            .get(id_field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                LedgerError::InvalidResponse(format!("{} is missing `{}`", raw.type_url, id_field))
            })?
            .to_string();

        Ok(match name {
            "MsgRegisterDaemonMetadataResponse" => DecodedResponse::RegisterDaemonMetadata {
                daemon_metadata_id: id,
            },
            "MsgRegisterDaemonResponse" => DecodedResponse::RegisterDaemon { daemon_id: id },
            _ => DecodedResponse::RegisterPlaybook { playbook_id: id },
        })
    }
}

/// Daemon metadata record returned by an id lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonMetadata {
    pub id: String,
    pub title: String,
    pub metadata_type: i32,
    pub supported_chains: Vec<i32>,
    #[serde(default)]
    pub parameters: Vec<DaemonParameterSpec>,
}

impl DaemonMetadata {
    pub fn chains(&self) -> Result<Vec<String>, LedgerError> {
        chains_from_wire(&self.supported_chains)
    }

    pub fn parameters(&self) -> Result<Vec<ManifestParameter>, LedgerError> {
        self.parameters.iter().map(DaemonParameterSpec::to_manifest).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AgentType, ParameterValue};
    use serde_json::json;

    fn manifest() -> Manifest {
        Manifest {
            version: "0.0.1".to_string(),
            agent_type: AgentType::Sql,
            name: "Large transfers".to_string(),
            description: None,
            chains: vec!["SUI_TESTNET".to_string(), "SUI_MAINNET".to_string()],
            tags: vec!["defi".to_string()],
            logo_url: None,
            subscribable: true,
            parameters: vec![ManifestParameter {
                kind: ParameterType::Number,
                key: "threshold".to_string(),
                title: "Threshold".to_string(),
                description: None,
                default_value: Some(ParameterValue::Number(1000.into())),
                required_for: vec!["SUI_MAINNET".to_string()],
                hidden_for: vec![],
                max: None,
                min: Some(0.0),
                max_len: None,
                min_len: None,
                symbol: None,
            }],
        }
    }

    #[test]
    fn test_metadata_payload() {
        let msg = RegisterDaemonMetadata::from_manifest(
            &manifest(),
            DaemonContent::Sql { queries: vec![] },
        )
        .unwrap();

        assert_eq!(msg.metadata_type, METADATA_TYPE_SUBSCRIBABLE);
        assert_eq!(msg.supported_chains, vec![1, 2]);
        assert_eq!(msg.parameters[0].default_value.as_deref(), Some("1000"));
        assert_eq!(msg.parameters[0].required_for, vec![2]);
    }

    #[test]
    fn test_unknown_chain_in_payload() {
        let mut manifest = manifest();
        manifest.chains.push("DOGE_MAINNET".to_string());
        let err = RegisterDaemonMetadata::from_manifest(&manifest, DaemonContent::Sql { queries: vec![] })
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownChain(c) if c == "DOGE_MAINNET"));
    }

    #[test]
    fn test_wire_envelope() {
        let msg = LedgerMessage::RemovePlaybook(RemovePlaybook {
            playbook_id: "pb-1".to_string(),
        });
        assert_eq!(
            msg.to_wire().unwrap(),
            json!({
                "typeUrl": "/validationchain.validationchain.MsgRemovePlaybook",
                "value": {"playbookId": "pb-1"}
            })
        );
    }

    #[test]
    fn test_decode_responses() {
        let decoded = DecodedResponse::from_wire(json!({
            "typeUrl": "/validationchain.validationchain.MsgRegisterDaemonMetadataResponse",
            "value": {"daemonMetadataId": "meta-1"}
        }))
        .unwrap();
        assert_eq!(
            decoded,
            DecodedResponse::RegisterDaemonMetadata {
                daemon_metadata_id: "meta-1".to_string()
            }
        );

        let other = DecodedResponse::from_wire(json!({
            "typeUrl": "/cosmos.bank.v1beta1.MsgSendResponse",
            "value": {}
        }))
        .unwrap();
        assert!(matches!(other, DecodedResponse::Other { .. }));
    }

    #[test]
    fn test_decode_missing_id() {
        let err = DecodedResponse::from_wire(json!({
            "typeUrl": "/validationchain.validationchain.MsgRegisterDaemonResponse",
            "value": {}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("daemonId"));
    }

    #[test]
    fn test_parameter_spec_back_to_manifest() {
        let param = &manifest().parameters[0];
        let spec = DaemonParameterSpec::from_manifest(param).unwrap();
        let restored = spec.to_manifest().unwrap();

        assert_eq!(restored.required_for, param.required_for);
        assert_eq!(restored.default_value, Some(ParameterValue::String("1000".to_string())));
    }
}
