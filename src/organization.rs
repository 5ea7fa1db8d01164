//! Organization API
//!
//! GraphQL queries against the Mamoru backend: assigning daemons to the
//! caller's organization and listing what it owns. All calls are
//! authenticated with the token stored by `auth login`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_GRAPHQL_URL: &str = "https://mamoru-be-production.mamoru.foundation/graphql";

const ASSIGN_DAEMON: &str = r#"
mutation AssignDaemon($daemonId: String!) {
  assignDaemonToOrganization(daemonId: $daemonId) { id }
}"#;

const LIST_DAEMONS: &str = r#"
query ListDaemons {
  listDaemons { items { id title chain status } }
}"#;

const LIST_PLAYBOOKS: &str = r#"
query ListPlaybooks {
  listPlaybooks { items { id name status } }
}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait OrganizationApi: Send + Sync {
    /// Fails while the daemon is not yet visible to the query layer
    async fn assign_daemon(&self, daemon_id: &str) -> Result<(), OrganizationError>;
    async fn list_daemons(&self) -> Result<Vec<DaemonSummary>, OrganizationError>;
    async fn list_playbooks(&self) -> Result<Vec<PlaybookSummary>, OrganizationError>;
}

pub struct GraphqlClient {
    client: reqwest::Client,
    url: String,
    auth_token: String,
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    items: Vec<T>,
}

impl GraphqlClient {
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self, OrganizationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OrganizationError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            auth_token: auth_token.into(),
        })
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, OrganizationError> {
        debug!(url = %self.url, variables = %variables, "GraphQL request");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.auth_token)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(|e| OrganizationError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(OrganizationError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(OrganizationError::Network(format!("HTTP {}", response.status())));
        }

        let body: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| OrganizationError::InvalidResponse(e.to_string()))?;
        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(OrganizationError::Graphql(messages.join("; ")));
        }
        body.data
            .ok_or_else(|| OrganizationError::InvalidResponse("response has no data".to_string()))
    }

    async fn list<T: DeserializeOwned>(&self, query: &str, field: &str) -> Result<Vec<T>, OrganizationError> {
        let data = self.execute(query, Value::Null).await?;
        let list = data
            .get(field)
            .cloned()
            .ok_or_else(|| OrganizationError::InvalidResponse(format!("missing `{}`", field)))?;
        let list: ItemList<T> =
            serde_json::from_value(list).map_err(|e| OrganizationError::InvalidResponse(e.to_string()))?;
        Ok(list.items)
    }
}

#[async_trait]
impl OrganizationApi for GraphqlClient {
    async fn assign_daemon(&self, daemon_id: &str) -> Result<(), OrganizationError> {
        self.execute(ASSIGN_DAEMON, serde_json::json!({ "daemonId": daemon_id }))
            .await
            .map(|_| ())
    }

    async fn list_daemons(&self) -> Result<Vec<DaemonSummary>, OrganizationError> {
        self.list(LIST_DAEMONS, "listDaemons").await
    }

    async fn list_playbooks(&self) -> Result<Vec<PlaybookSummary>, OrganizationError> {
        self.list(LIST_PLAYBOOKS, "listPlaybooks").await
    }
}

/// Organization API errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum OrganizationError {
    #[error("Not logged in: run `mamoru-cli auth login`")]
    NotLoggedIn,

    #[error("Auth token rejected, log in again")]
    Unauthorized,

    #[error("GraphQL error: {0}")]
    Graphql(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl OrganizationError {
    /// Errors that can clear up on their own, such as a daemon the backend has not indexed yet
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OrganizationError::Graphql(_)
                | OrganizationError::Network(_)
                | OrganizationError::InvalidResponse(_)
        )
    }
}
