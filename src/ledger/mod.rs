//! Validation Chain ledger
//!
//! The orchestrator talks to the ledger only through [`Ledger`]: submit a
//! signed message, fetch the decoded result of a committed transaction, and
//! look up daemon metadata by id. Everything vendor specific (signing, wire
//! encoding, transport) lives behind it.

pub mod chain;
pub mod http;
pub mod messages;

pub use chain::{chain_from_wire, chain_to_wire, known_chains};
pub use http::{HttpConnector, HttpLedger, LedgerConfig};
pub use messages::{
    DaemonContent, DaemonMetadata, DaemonParameterSpec, DecodedResponse, Fee, LedgerMessage,
    RegisterDaemon, RegisterDaemonMetadata, RegisterPlaybook, RemovePlaybook, SdkVersion,
    TxResponse, DEFAULT_GAS, METADATA_TYPE_STANDALONE, METADATA_TYPE_SUBSCRIBABLE,
};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Narrow ledger client interface
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Sign and broadcast one message
    async fn submit_transaction(
        &self,
        message: &LedgerMessage,
        fee: &Fee,
    ) -> Result<TxResponse, LedgerError>;

    /// Decoded message responses of a committed transaction
    async fn fetch_transaction_result(
        &self,
        transaction_hash: &str,
    ) -> Result<Vec<DecodedResponse>, LedgerError>;

    /// Daemon metadata by id, `None` when the ledger has no such record
    async fn query_entity_by_id(&self, id: &str) -> Result<Option<DaemonMetadata>, LedgerError>;
}

/// Builds the ledger client. Called at most once per publisher.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Ledger>, LedgerError>;
}

/// Turn a non-zero response code into an error carrying the full diagnostics.
///
/// Returns the transaction hash on success.
pub fn ensure_success(message: &LedgerMessage, response: TxResponse) -> Result<String, LedgerError> {
    if response.code != 0 {
        return Err(LedgerError::Rejected {
            message_type: message.name().to_string(),
            code: response.code,
            raw_log: response.raw_log,
            transaction_hash: response.transaction_hash,
        });
    }
    Ok(response.transaction_hash)
}

/// Ledger errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error(
        "{message_type} failed with code {code}: {raw_log} \
         (transaction {transaction_hash} may still exist on chain, inspect it before retrying)"
    )]
    Rejected {
        message_type: String,
        code: u32,
        raw_log: String,
        transaction_hash: String,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("Unknown chain `{0}`")]
    UnknownChain(String),

    #[error("Unknown chain value {0} returned by the ledger")]
    UnknownChainValue(i32),

    #[error("Transaction {transaction_hash} carried no {expected} response")]
    MissingResponse {
        transaction_hash: String,
        expected: String,
    },

    #[error("Private key required: pass --private-key or set MAMORU_PRIVATE_KEY")]
    MissingPrivateKey,

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
