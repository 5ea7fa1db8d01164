//! Registration orchestrator
//!
//! Publishing an agent:
//! 1. Read and validate the manifest (all violations, before anything else)
//! 2. Pre-flight: chain selection, `--parameters`, agent content. No network.
//! 3. Register daemon metadata, then decode its id from the committed transaction
//! 4. Standalone agents only: register the daemon on the resolved chain
//! 5. Best effort: assign the daemon to the caller's organization, retried
//!    until the backend sees it
//!
//! A ledger error after step 3 has started means the outcome is uncertain:
//! the transaction may exist on chain even though the command failed.

pub mod artifacts;
pub mod parameters;
pub mod prompt;
pub mod scaffold;

pub use artifacts::{
    ArtifactError, ArtifactSource, BuildDirArtifacts, CommandCompiler, Compiler, WasmArtifact,
};
pub use parameters::{parse_parameters_flag, ParameterValues};
pub use prompt::{PromptError, Prompter, StdinPrompter};
pub use scaffold::{AgentTemplate, DefaultScaffolder, ProjectScaffolder, ScaffoldError};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ledger::{
    ensure_success, DaemonContent, DecodedResponse, Fee, Ledger, LedgerConnector, LedgerError,
    LedgerMessage, RegisterDaemon, RegisterDaemonMetadata, RegisterPlaybook, RemovePlaybook,
    METADATA_TYPE_SUBSCRIBABLE,
};
use crate::manifest::{
    read_manifest, read_playbook, read_queries, write_manifest, AgentType, Manifest, ManifestError,
    ManifestParameter,
};
use crate::organization::{OrganizationApi, OrganizationError};
use crate::retry::{retry_while, RetryError, RetryPolicy, Sleeper, TokioSleeper};
use parameters::{complete_values, ensure_supported, resolve_chain, visible_parameters};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Flags shared by `publish` and `launch`
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub chain: Option<String>,
    /// Raw `--parameters` JSON
    pub parameters: Option<String>,
}

/// Ids of what was registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub metadata_id: String,
    /// `None` for subscribable templates
    pub daemon_id: Option<String>,
}

/// Drives registrations against one lazily connected ledger
pub struct Publisher {
    connector: Arc<dyn LedgerConnector>,
    ledger: OnceCell<Arc<dyn Ledger>>,
    artifacts: Arc<dyn ArtifactSource>,
    prompter: Arc<dyn Prompter>,
    organization: Option<Arc<dyn OrganizationApi>>,
    sleeper: Arc<dyn Sleeper>,
    retry_policy: RetryPolicy,
    call_timeout: Duration,
    fee: Fee,
    cancel: CancellationToken,
}

impl Publisher {
    pub fn new(
        connector: Arc<dyn LedgerConnector>,
        artifacts: Arc<dyn ArtifactSource>,
        prompter: Arc<dyn Prompter>,
    ) -> Self {
        Self {
            connector,
            ledger: OnceCell::new(),
            artifacts,
            prompter,
            organization: None,
            sleeper: Arc::new(TokioSleeper),
            retry_policy: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            fee: Fee::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Organization assignment is skipped without one
    pub fn with_organization(mut self, api: Arc<dyn OrganizationApi>) -> Self {
        self.organization = Some(api);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_fee(mut self, fee: Fee) -> Self {
        self.fee = fee;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Publish the agent in `project_dir`
    pub async fn publish(
        &self,
        project_dir: &Path,
        options: &PublishOptions,
    ) -> Result<PublishOutcome, PublishError> {
        let manifest = read_manifest(project_dir)?;
        info!(name = %manifest.name, agent_type = %manifest.agent_type, "Publishing agent");

        let chain = if manifest.subscribable {
            if let Some(chain) = &options.chain {
                ensure_supported(chain, &manifest.chains)?;
            }
            None
        } else {
            Some(resolve_chain(options.chain.as_deref(), &manifest.chains)?)
        };
        let explicit = options
            .parameters
            .as_deref()
            .map(parse_parameters_flag)
            .transpose()?;

        let content = self.load_content(project_dir, &manifest)?;
        let values = match &chain {
            Some(chain) => Some(self.collect_values(&manifest.parameters, chain, explicit).await?),
            None => None,
        };
        let metadata = RegisterDaemonMetadata::from_manifest(&manifest, content)?;

        let metadata_id = self
            .submit_for_id(
                LedgerMessage::RegisterDaemonMetadata(metadata),
                "daemon metadata",
                |r| match r {
                    DecodedResponse::RegisterDaemonMetadata { daemon_metadata_id } => {
                        Some(daemon_metadata_id)
                    }
                    _ => None,
                },
            )
            .await?;
        info!(metadata_id = %metadata_id, "Daemon metadata registered");

        let (Some(chain), Some(values)) = (chain, values) else {
            return Ok(PublishOutcome {
                metadata_id,
                daemon_id: None,
            });
        };

        let daemon_id = self.register_daemon(&metadata_id, &chain, &values).await?;
        Ok(PublishOutcome {
            metadata_id,
            daemon_id: Some(daemon_id),
        })
    }

    /// Start a daemon from an existing subscribable metadata record
    pub async fn launch(
        &self,
        metadata_id: &str,
        options: &PublishOptions,
    ) -> Result<PublishOutcome, PublishError> {
        let explicit = options
            .parameters
            .as_deref()
            .map(parse_parameters_flag)
            .transpose()?;

        let ledger = self.ledger().await?;
        let metadata = self
            .call("query daemon metadata", ledger.query_entity_by_id(metadata_id))
            .await?
            .ok_or_else(|| PublishError::MetadataNotFound(metadata_id.to_string()))?;
        if metadata.metadata_type != METADATA_TYPE_SUBSCRIBABLE {
            return Err(PublishError::NotSubscribable(metadata_id.to_string()));
        }

        let supported = metadata.chains()?;
        let chain = match options.chain.as_deref() {
            Some(chain) => {
                ensure_supported(chain, &supported)?;
                chain.to_string()
            }
            None if supported.len() == 1 => supported[0].clone(),
            None => self.prompter.select_chain(&supported).await?,
        };
        info!(metadata_id, title = %metadata.title, chain = %chain, "Launching daemon");

        let params = metadata.parameters()?;
        let values = self.collect_values(&params, &chain, explicit).await?;
        let daemon_id = self.register_daemon(metadata_id, &chain, &values).await?;

        Ok(PublishOutcome {
            metadata_id: metadata_id.to_string(),
            daemon_id: Some(daemon_id),
        })
    }

    /// Register the playbook in `project_dir`, returning its id
    pub async fn publish_playbook(&self, project_dir: &Path) -> Result<String, PublishError> {
        let playbook = read_playbook(project_dir)?;
        info!(name = %playbook.name, triggers = playbook.on.len(), "Publishing playbook");

        let playbook_id = self
            .submit_for_id(
                LedgerMessage::RegisterPlaybook(RegisterPlaybook::from(&playbook)),
                "playbook",
                |r| match r {
                    DecodedResponse::RegisterPlaybook { playbook_id } => Some(playbook_id),
                    _ => None,
                },
            )
            .await?;
        info!(playbook_id = %playbook_id, "Playbook registered");
        Ok(playbook_id)
    }

    pub async fn remove_playbook(&self, playbook_id: &str) -> Result<(), PublishError> {
        let message = LedgerMessage::RemovePlaybook(RemovePlaybook {
            playbook_id: playbook_id.to_string(),
        });
        let ledger = self.ledger().await?;
        let response = self
            .call(message.name(), ledger.submit_transaction(&message, &self.fee))
            .await?;
        let transaction_hash = ensure_success(&message, response)?;

        info!(playbook_id, transaction_hash = %transaction_hash, "Playbook removed");
        Ok(())
    }

    //==========================================================================
    // Steps
    //==========================================================================

    fn load_content(&self, project_dir: &Path, manifest: &Manifest) -> Result<DaemonContent, PublishError> {
        match manifest.agent_type {
            AgentType::Sql => Ok(DaemonContent::sql(&read_queries(project_dir)?)),
            AgentType::Wasm => {
                let build_dir = self.artifacts.build_dir(project_dir);
                if !build_dir.is_dir() {
                    return Err(PublishError::NotCompiled(build_dir));
                }
                let artifact = self.artifacts.load(project_dir)?;
                info!(
                    size = artifact.module.len(),
                    digest = %artifact.digest(),
                    sdk_versions = artifact.sdk_versions.len(),
                    "Loaded compiled agent"
                );
                Ok(artifact.into_content())
            }
        }
    }

    /// Explicit values short-circuit prompting
    async fn collect_values(
        &self,
        parameters: &[ManifestParameter],
        chain: &str,
        explicit: Option<ParameterValues>,
    ) -> Result<ParameterValues, PublishError> {
        let values = match explicit {
            Some(values) => values,
            None => {
                let visible = visible_parameters(parameters, chain);
                if visible.is_empty() {
                    ParameterValues::new()
                } else {
                    self.prompter.collect_parameter_values(&visible).await?
                }
            }
        };
        complete_values(parameters, chain, values)
    }

    async fn register_daemon(
        &self,
        metadata_id: &str,
        chain: &str,
        values: &ParameterValues,
    ) -> Result<String, PublishError> {
        let message = RegisterDaemon::new(metadata_id, chain, values)?;
        let daemon_id = self
            .submit_for_id(LedgerMessage::RegisterDaemon(message), "daemon", |r| match r {
                DecodedResponse::RegisterDaemon { daemon_id } => Some(daemon_id),
                _ => None,
            })
            .await?;
        info!(daemon_id = %daemon_id, chain, "Daemon registered");

        self.assign_organization(&daemon_id).await?;
        Ok(daemon_id)
    }

    async fn assign_organization(&self, daemon_id: &str) -> Result<(), PublishError> {
        let Some(api) = &self.organization else {
            info!(daemon_id, "Not logged in, skipping organization assignment");
            return Ok(());
        };

        retry_while(
            "organization assignment",
            &self.retry_policy,
            self.sleeper.as_ref(),
            &self.cancel,
            OrganizationError::is_transient,
            move || api.assign_daemon(daemon_id),
        )
        .await?;
        info!(daemon_id, "Daemon assigned to organization");
        Ok(())
    }

    /// Submit, check the code, then decode the created id from the committed transaction
    async fn submit_for_id<F>(
        &self,
        message: LedgerMessage,
        expected: &str,
        extract: F,
    ) -> Result<String, PublishError>
    where
        F: Fn(&DecodedResponse) -> Option<&String>,
    {
        let ledger = self.ledger().await?;
        debug!(message = message.name(), "Submitting");
        let response = self
            .call(message.name(), ledger.submit_transaction(&message, &self.fee))
            .await?;
        let transaction_hash = ensure_success(&message, response)?;

        let responses = self
            .call(
                "fetch transaction result",
                ledger.fetch_transaction_result(&transaction_hash),
            )
            .await?;
        debug!(transaction_hash = %transaction_hash, responses = ?responses, "Decoded transaction");

        let id = responses.iter().find_map(|r| extract(r)).cloned();
        id.ok_or_else(|| {
            PublishError::Ledger(LedgerError::MissingResponse {
                transaction_hash,
                expected: expected.to_string(),
            })
        })
    }

    /// Connect on first use; later calls reuse the same client
    async fn ledger(&self) -> Result<Arc<dyn Ledger>, PublishError> {
        let ledger = self
            .ledger
            .get_or_try_init(|| self.call("connect to ledger", self.connector.connect()))
            .await?;
        Ok(ledger.clone())
    }

    async fn call<T>(
        &self,
        operation: &str,
        future: impl Future<Output = Result<T, LedgerError>>,
    ) -> Result<T, LedgerError> {
        match tokio::time::timeout(self.call_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout {
                operation: operation.to_string(),
                timeout: self.call_timeout,
            }),
        }
    }
}

/// Result of `build`
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest_path: PathBuf,
    pub module_path: Option<PathBuf>,
}

/// Compile a wasm agent (sql agents only get their queries checked) and
/// write a copy of the manifest to the build directory
pub async fn build(
    project_dir: &Path,
    compiler: &dyn Compiler,
    artifacts: &dyn ArtifactSource,
) -> Result<BuildOutput, PublishError> {
    let manifest = read_manifest(project_dir)?;

    let module_path = match manifest.agent_type {
        AgentType::Sql => {
            read_queries(project_dir)?;
            None
        }
        AgentType::Wasm => {
            let artifact = compiler.compile(project_dir).await?;
            let path = artifacts.store(project_dir, &artifact)?;
            info!(path = %path.display(), digest = %artifact.digest(), "Stored compiled module");
            Some(path)
        }
    };

    let manifest_path = artifacts.build_dir(project_dir).join("manifest.yml");
    write_manifest(&manifest, &manifest_path)?;

    Ok(BuildOutput {
        manifest_path,
        module_path,
    })
}

/// Publish errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Agent is not compiled: {} does not exist, run `mamoru-cli build` first", .0.display())]
    NotCompiled(PathBuf),

    #[error("Agent supports several chains ({}), pick one with --chain", .0.join(", "))]
    AmbiguousChain(Vec<String>),

    #[error("Chain `{chain}` is not supported by this agent (supported: {})", .supported.join(", "))]
    UnsupportedChain { chain: String, supported: Vec<String> },

    #[error("Invalid --parameters: {0}")]
    InvalidParameters(String),

    #[error("Parameter `{key}` is required for {chain}")]
    MissingParameter { key: String, chain: String },

    #[error("Daemon metadata `{0}` not found")]
    MetadataNotFound(String),

    #[error("Daemon metadata `{0}` is not subscribable, daemons cannot be launched from it")]
    NotSubscribable(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    OrganizationAssignment(#[from] RetryError<OrganizationError>),
}
