//! Ledger client over the gateway's JSON API
//!
//! Transactions are signed locally with the caller's Ed25519 key; the gateway
//! only relays the signed envelope.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{DaemonMetadata, DecodedResponse, Fee, Ledger, LedgerConnector, LedgerError, LedgerMessage, TxResponse};

pub const DEFAULT_RPC_URL: &str = "https://validation-chain.testnet.mamoru.foundation:443";

/// Connection settings
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Hex encoded 32 byte Ed25519 seed
    pub private_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            private_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Connects an [`HttpLedger`] on first use
pub struct HttpConnector {
    config: LedgerConfig,
}

impl HttpConnector {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LedgerConnector for HttpConnector {
    async fn connect(&self) -> Result<Arc<dyn Ledger>, LedgerError> {
        Ok(Arc::new(HttpLedger::connect(&self.config).await?))
    }
}

pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
    signing_key: SigningKey,
    /// Hex public key, the account address on the gateway
    signer: String,
}

#[derive(Debug, Serialize)]
struct SignedTransaction {
    body: Value,
    signer: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    raw_log: String,
}

#[derive(Debug, Deserialize)]
struct TransactionResult {
    #[serde(default)]
    responses: Vec<Value>,
}

impl HttpLedger {
    /// Parse the key, build the client and check the gateway is reachable
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let raw_key = config
            .private_key
            .as_deref()
            .ok_or(LedgerError::MissingPrivateKey)?;
        let signing_key = parse_signing_key(raw_key)?;
        let signer = hex::encode(signing_key.verifying_key().as_bytes());

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LedgerError::Network(e.to_string()))?;
        let base_url = config.rpc_url.trim_end_matches('/').to_string();

        let response = client
            .get(format!("{}/status", base_url))
            .send()
            .await
            .map_err(|e| LedgerError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "Ledger gateway unavailable: HTTP {}",
                response.status()
            )));
        }

        info!(rpc = %base_url, signer = %signer, "Connected to ledger");
        Ok(Self {
            client,
            base_url,
            signing_key,
            signer,
        })
    }

    pub fn signer(&self) -> &str {
        &self.signer
    }

    fn sign(&self, body: Value) -> Result<SignedTransaction, LedgerError> {
        let bytes = serde_json::to_vec(&body).map_err(|e| LedgerError::Encode(e.to_string()))?;
        let signature = self.signing_key.sign(&bytes);
        Ok(SignedTransaction {
            body,
            signer: self.signer.clone(),
            signature: hex::encode(signature.to_bytes()),
        })
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn submit_transaction(
        &self,
        message: &LedgerMessage,
        fee: &Fee,
    ) -> Result<TxResponse, LedgerError> {
        let body = serde_json::json!({
            "messages": [message.to_wire()?],
            "fee": fee,
        });
        debug!(message = message.name(), payload = %body, "Submitting transaction");
        let signed = self.sign(body)?;

        let response = self
            .client
            .post(format!("{}/txs", self.base_url))
            .json(&signed)
            .send()
            .await
            .map_err(|e| LedgerError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "Broadcast failed: HTTP {}",
                response.status()
            )));
        }

        let broadcast: BroadcastResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        debug!(
            message = message.name(),
            transaction_hash = %broadcast.txhash,
            code = broadcast.code,
            raw_log = %broadcast.raw_log,
            "Broadcast response"
        );

        Ok(TxResponse {
            transaction_hash: broadcast.txhash,
            code: broadcast.code,
            raw_log: broadcast.raw_log,
        })
    }

    async fn fetch_transaction_result(
        &self,
        transaction_hash: &str,
    ) -> Result<Vec<DecodedResponse>, LedgerError> {
        let response = self
            .client
            .get(format!("{}/txs/{}", self.base_url, transaction_hash))
            .send()
            .await
            .map_err(|e| LedgerError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "Fetching transaction {} failed: HTTP {}",
                transaction_hash,
                response.status()
            )));
        }

        let result: TransactionResult = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        debug!(transaction_hash, responses = result.responses.len(), "Fetched transaction result");

        result.responses.into_iter().map(DecodedResponse::from_wire).collect()
    }

    async fn query_entity_by_id(&self, id: &str) -> Result<Option<DaemonMetadata>, LedgerError> {
        let response = self
            .client
            .get(format!("{}/daemon-metadata/{}", self.base_url, id))
            .send()
            .await
            .map_err(|e| LedgerError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "Query failed: HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}

fn parse_signing_key(raw: &str) -> Result<SigningKey, LedgerError> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(raw).map_err(|e| LedgerError::InvalidPrivateKey(e.to_string()))?;
    let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        LedgerError::InvalidPrivateKey(format!("expected 32 bytes, got {}", bytes.len()))
    })?;
    Ok(SigningKey::from_bytes(&seed))
}
