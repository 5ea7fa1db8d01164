//! Command-line interface
//!
//! Commands return their output as a string; `main` prints it and owns the
//! exit status.

use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CliConfig, ConfigStore};
use crate::ledger::http::DEFAULT_RPC_URL;
use crate::ledger::{Fee, HttpConnector, LedgerConfig};
use crate::manifest::{
    load_manifest_document, read_published_manifest, AgentType, PLAYBOOK_FILE, QUERIES_FILE,
};
use crate::organization::{
    DaemonSummary, GraphqlClient, OrganizationApi, OrganizationError, PlaybookSummary,
    DEFAULT_GRAPHQL_URL,
};
use crate::publish::{
    build, AgentTemplate, BuildDirArtifacts, CommandCompiler, DefaultScaffolder, ProjectScaffolder,
    Prompter, PublishOptions, PublishOutcome, Publisher,
};
use crate::schema::SchemaKind;

#[derive(Debug, Parser)]
#[command(name = "mamoru-cli")]
#[command(about = "Scaffold, validate and publish Mamoru monitoring agents and playbooks")]
pub struct Cli {
    /// Validation Chain RPC endpoint
    #[arg(long, global = true, env = "MAMORU_RPC", default_value = DEFAULT_RPC_URL)]
    pub rpc: String,

    /// Hex encoded private key used to sign transactions
    #[arg(long, global = true, env = "MAMORU_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Gas limit for transactions
    #[arg(long, global = true)]
    pub gas: Option<u64>,

    /// Mamoru GraphQL endpoint
    #[arg(long, global = true, env = "MAMORU_GRAPHQL", default_value = DEFAULT_GRAPHQL_URL)]
    pub graphql: String,

    /// Do not ask about or record telemetry
    #[arg(long, global = true)]
    pub skip_telemetry: bool,

    /// Debug logging, including request payloads and raw responses
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AgentKind {
    Sql,
    Wasm,
}

impl From<AgentKind> for AgentType {
    fn from(kind: AgentKind) -> Self {
        match kind {
            AgentKind::Sql => AgentType::Sql,
            AgentKind::Wasm => AgentType::Wasm,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a new agent project
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Agent name (prompted when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Agent kind
        #[arg(long = "type", value_enum, default_value = "sql")]
        kind: AgentKind,
        /// Supported chain, repeatable
        #[arg(long = "chain", default_value = "SUI_TESTNET")]
        chains: Vec<String>,
        /// Create a reusable template
        #[arg(long)]
        subscribable: bool,
    },

    /// Compile a wasm agent into the build directory
    Build {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Check the project's documents and list every violation
    Validate {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },

    /// Register the agent on the Validation Chain
    Publish {
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Chain to run the daemon on
        #[arg(long)]
        chain: Option<String>,
        /// Parameter values as a JSON object
        #[arg(long)]
        parameters: Option<String>,
    },

    /// Start a daemon from a subscribable agent
    Launch {
        /// Daemon metadata id
        metadata_id: String,
        #[arg(long)]
        chain: Option<String>,
        #[arg(long)]
        parameters: Option<String>,
    },

    /// Print the entities a data-source manifest generates
    Entities {
        /// Published manifest file
        file: PathBuf,
    },

    #[command(subcommand)]
    Playbook(PlaybookCommands),

    #[command(subcommand)]
    Auth(AuthCommands),

    #[command(subcommand)]
    Agents(ListCommands),

    #[command(subcommand)]
    Playbooks(ListCommands),
}

#[derive(Debug, Subcommand)]
pub enum PlaybookCommands {
    /// Create a playbook.yml
    Init {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        name: Option<String>,
    },
    /// Register the playbook
    Publish {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Remove a registered playbook
    Remove {
        /// Playbook id
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum AuthCommands {
    /// Store an auth token
    Login {
        /// Token (prompted when omitted)
        #[arg(long)]
        token: Option<String>,
    },
    /// Forget the stored token
    Logout,
}

#[derive(Debug, Subcommand)]
pub enum ListCommands {
    /// List what your organization owns
    List,
}

/// Collaborators shared by all commands
pub struct CommandContext {
    pub config_store: Arc<dyn ConfigStore>,
    pub prompter: Arc<dyn Prompter>,
    pub cancel: CancellationToken,
}

/// Run a parsed command
pub async fn execute_command(ctx: &CommandContext, cli: Cli) -> anyhow::Result<String> {
    let mut config = ctx.config_store.load()?;
    record_telemetry_decision(ctx, &mut config, cli.skip_telemetry).await?;
    if config.telemetry_enabled(cli.skip_telemetry) {
        debug!(
            anonymous_id = config.anonymous_id.as_deref().unwrap_or_default(),
            command = command_name(&cli.command),
            "Telemetry event"
        );
    }

    match cli.command {
        Commands::Init {
            ref dir,
            ref name,
            kind,
            ref chains,
            subscribable,
        } => {
            let name = match name {
                Some(name) => name.clone(),
                None => ctx.prompter.input("Agent name:").await?,
            };
            if name.trim().is_empty() {
                bail!("Agent name must not be empty");
            }
            let template = AgentTemplate {
                name,
                agent_type: kind.into(),
                chains: chains.clone(),
                subscribable,
            };
            let created = DefaultScaffolder.scaffold_agent(dir, &template)?;
            Ok(format_created(&created))
        }

        Commands::Build { ref dir } => {
            let output = build(dir, &CommandCompiler::default(), &BuildDirArtifacts).await?;
            let mut lines = vec![format!("Manifest: {}", output.manifest_path.display())];
            if let Some(module) = output.module_path {
                lines.push(format!("Module:   {}", module.display()));
            }
            Ok(lines.join("\n"))
        }

        Commands::Validate { ref dir } => validate_project(dir),

        Commands::Publish {
            ref dir,
            ref chain,
            ref parameters,
        } => {
            let options = PublishOptions {
                chain: chain.clone(),
                parameters: parameters.clone(),
            };
            let outcome = publisher(ctx, &cli, &config)?.publish(dir, &options).await?;
            Ok(format_outcome(&outcome))
        }

        Commands::Launch {
            ref metadata_id,
            ref chain,
            ref parameters,
        } => {
            let options = PublishOptions {
                chain: chain.clone(),
                parameters: parameters.clone(),
            };
            let outcome = publisher(ctx, &cli, &config)?.launch(metadata_id, &options).await?;
            Ok(format_outcome(&outcome))
        }

        Commands::Entities { ref file } => {
            let manifest = read_published_manifest(file)?;
            let resolved = manifest.resolve()?;
            Ok(format_entities(&resolved))
        }

        Commands::Playbook(PlaybookCommands::Init { ref dir, ref name }) => {
            let name = match name {
                Some(name) => name.clone(),
                None => ctx.prompter.input("Playbook name:").await?,
            };
            let created = DefaultScaffolder.scaffold_playbook(dir, &name)?;
            Ok(format_created(&created))
        }

        Commands::Playbook(PlaybookCommands::Publish { ref dir }) => {
            let id = publisher(ctx, &cli, &config)?.publish_playbook(dir).await?;
            Ok(format!("Playbook published: {}", id))
        }

        Commands::Playbook(PlaybookCommands::Remove { ref id }) => {
            publisher(ctx, &cli, &config)?.remove_playbook(id).await?;
            Ok(format!("Playbook removed: {}", id))
        }

        Commands::Auth(AuthCommands::Login { ref token }) => {
            let token = match token {
                Some(token) => token.clone(),
                None => ctx.prompter.input("Paste your auth token:").await?,
            };
            if token.trim().is_empty() {
                bail!("Auth token must not be empty");
            }
            config.auth_token = Some(token.trim().to_string());
            ctx.config_store.save(&config)?;
            Ok("Logged in".to_string())
        }

        Commands::Auth(AuthCommands::Logout) => {
            config.auth_token = None;
            ctx.config_store.save(&config)?;
            Ok("Logged out".to_string())
        }

        Commands::Agents(ListCommands::List) => {
            let daemons = organization_client(&cli, &config)?.list_daemons().await?;
            Ok(format_daemons(&daemons))
        }

        Commands::Playbooks(ListCommands::List) => {
            let playbooks = organization_client(&cli, &config)?.list_playbooks().await?;
            Ok(format_playbooks(&playbooks))
        }
    }
}

/// Ask once, then remember the answer
async fn record_telemetry_decision(
    ctx: &CommandContext,
    config: &mut CliConfig,
    skip_telemetry: bool,
) -> anyhow::Result<()> {
    if skip_telemetry || config.telemetry.is_some() {
        return Ok(());
    }
    let enabled = ctx
        .prompter
        .confirm("Help improve mamoru-cli by sending anonymous usage data?")
        .await?;
    config.set_telemetry(enabled);
    ctx.config_store.save(config)?;
    info!(enabled, "Telemetry preference saved");
    Ok(())
}

fn publisher(ctx: &CommandContext, cli: &Cli, config: &CliConfig) -> anyhow::Result<Publisher> {
    let connector = HttpConnector::new(LedgerConfig {
        rpc_url: cli.rpc.clone(),
        private_key: cli.private_key.clone(),
        ..LedgerConfig::default()
    });
    let mut publisher = Publisher::new(
        Arc::new(connector),
        Arc::new(BuildDirArtifacts),
        ctx.prompter.clone(),
    )
    .with_cancellation(ctx.cancel.clone());

    if let Some(gas) = cli.gas {
        publisher = publisher.with_fee(Fee { gas });
    }
    match &config.auth_token {
        Some(token) => {
            publisher = publisher.with_organization(Arc::new(GraphqlClient::new(&cli.graphql, token)?));
        }
        None => warn!("Not logged in: daemons will not be assigned to an organization"),
    }
    Ok(publisher)
}

fn organization_client(cli: &Cli, config: &CliConfig) -> anyhow::Result<GraphqlClient> {
    let token = config
        .auth_token
        .as_deref()
        .ok_or(OrganizationError::NotLoggedIn)?;
    Ok(GraphqlClient::new(&cli.graphql, token)?)
}

/// Validate every document present in the project without stopping at the first
fn validate_project(dir: &Path) -> anyhow::Result<String> {
    let mut failures = Vec::new();

    let manifest = load_manifest_document(dir)?;
    if let Err(e) = manifest.validate(SchemaKind::Manifest) {
        failures.push(e.render());
    }
    let agent_type = manifest.value.get("type").and_then(|t| t.as_str());

    let companions = [
        (QUERIES_FILE, SchemaKind::QueryManifest, agent_type == Some("sql")),
        (PLAYBOOK_FILE, SchemaKind::Playbook, false),
    ];
    for (file, kind, required) in companions {
        let path = dir.join(file);
        if !path.exists() && !required {
            continue;
        }
        let document = crate::manifest::load_document(&path)?;
        if let Err(e) = document.validate(kind) {
            failures.push(e.render());
        }
    }

    if failures.is_empty() {
        Ok(format!("{} is valid", manifest.path.display()))
    } else {
        bail!("Validation of {} failed\n\n{}", dir.display(), failures.join("\n\n"))
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Init { .. } => "init",
        Commands::Build { .. } => "build",
        Commands::Validate { .. } => "validate",
        Commands::Publish { .. } => "publish",
        Commands::Launch { .. } => "launch",
        Commands::Entities { .. } => "entities",
        Commands::Playbook(PlaybookCommands::Init { .. }) => "playbook init",
        Commands::Playbook(PlaybookCommands::Publish { .. }) => "playbook publish",
        Commands::Playbook(PlaybookCommands::Remove { .. }) => "playbook remove",
        Commands::Auth(AuthCommands::Login { .. }) => "auth login",
        Commands::Auth(AuthCommands::Logout) => "auth logout",
        Commands::Agents(_) => "agents list",
        Commands::Playbooks(_) => "playbooks list",
    }
}

//==============================================================================
// Output formatting
//==============================================================================

fn format_created(paths: &[PathBuf]) -> String {
    let mut out = String::from("Created:");
    for path in paths {
        out.push_str(&format!("\n  {}", path.display()));
    }
    out
}

pub fn format_outcome(outcome: &PublishOutcome) -> String {
    let mut out = format!("Daemon metadata id: {}", outcome.metadata_id);
    if let Some(daemon_id) = &outcome.daemon_id {
        out.push_str(&format!("\nDaemon id:          {}", daemon_id));
    }
    out
}

fn format_entities(entities: &[crate::field_type::ResolvedEntity]) -> String {
    let mut out = String::new();
    for entity in entities {
        out.push_str(&format!("{}\n", entity.name));
        for (name, field) in &entity.fields {
            let nullable = if field.nullable { "?" } else { "" };
            out.push_str(&format!("  {}: {}{}\n", name, field.wrapper_type, nullable));
        }
        for generated in &entity.generated {
            out.push_str(&format!("  + {}\n", generated.name));
        }
    }
    out.trim_end().to_string()
}

fn format_daemons(daemons: &[DaemonSummary]) -> String {
    if daemons.is_empty() {
        return "No agents".to_string();
    }
    let mut out = format!("{:<40} {:<16} {:<10} {}", "ID", "CHAIN", "STATUS", "TITLE");
    for d in daemons {
        out.push_str(&format!("\n{:<40} {:<16} {:<10} {}", d.id, d.chain, d.status, d.title));
    }
    out
}

fn format_playbooks(playbooks: &[PlaybookSummary]) -> String {
    if playbooks.is_empty() {
        return "No playbooks".to_string();
    }
    let mut out = format!("{:<40} {:<10} {}", "ID", "STATUS", "NAME");
    for p in playbooks {
        out.push_str(&format!("\n{:<40} {:<10} {}", p.id, p.status, p.name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_publish_flags() {
        let cli = Cli::try_parse_from([
            "mamoru-cli",
            "publish",
            "agent",
            "--chain",
            "SUI_TESTNET",
            "--parameters",
            r#"{"threshold": 10}"#,
            "--gas",
            "5000",
        ])
        .unwrap();

        assert_eq!(cli.gas, Some(5000));
        match cli.command {
            Commands::Publish { dir, chain, parameters } => {
                assert_eq!(dir, PathBuf::from("agent"));
                assert_eq!(chain.as_deref(), Some("SUI_TESTNET"));
                assert_eq!(parameters.as_deref(), Some(r#"{"threshold": 10}"#));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_nested_commands() {
        let cli = Cli::try_parse_from(["mamoru-cli", "playbook", "remove", "pb-1"]).unwrap();
        assert_eq!(command_name(&cli.command), "playbook remove");

        let cli = Cli::try_parse_from(["mamoru-cli", "agents", "list", "--skip-telemetry"]).unwrap();
        assert!(cli.skip_telemetry);
        assert_eq!(command_name(&cli.command), "agents list");
    }

    #[test]
    fn test_format_outcome() {
        let outcome = PublishOutcome {
            metadata_id: "meta-1".to_string(),
            daemon_id: None,
        };
        assert_eq!(format_outcome(&outcome), "Daemon metadata id: meta-1");
    }
}
