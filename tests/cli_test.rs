//! Offline command tests: scaffolding, validation, auth and telemetry state

use async_trait::async_trait;
use clap::Parser;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use mamoru_cli::cli::{execute_command, Cli, CommandContext};
use mamoru_cli::config::{CliConfig, ConfigStore, MemoryConfigStore};
use mamoru_cli::manifest::ManifestParameter;
use mamoru_cli::publish::{ParameterValues, PromptError, Prompter};

/// Answers every confirmation with `consent` and counts the questions
struct ScriptedPrompter {
    consent: bool,
    confirmations: AtomicUsize,
}

impl ScriptedPrompter {
    fn new(consent: bool) -> Arc<Self> {
        Arc::new(Self {
            consent,
            confirmations: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn select_chain(&self, _choices: &[String]) -> Result<String, PromptError> {
        Err(PromptError::Closed)
    }

    async fn collect_parameter_values(
        &self,
        _parameters: &[&ManifestParameter],
    ) -> Result<ParameterValues, PromptError> {
        Err(PromptError::Closed)
    }

    async fn confirm(&self, _question: &str) -> Result<bool, PromptError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(self.consent)
    }

    async fn input(&self, _question: &str) -> Result<String, PromptError> {
        Ok("prompted".to_string())
    }
}

fn context(store: Arc<MemoryConfigStore>, prompter: Arc<ScriptedPrompter>) -> CommandContext {
    CommandContext {
        config_store: store,
        prompter,
        cancel: CancellationToken::new(),
    }
}

async fn run(ctx: &CommandContext, args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("mamoru-cli").chain(args.iter().copied()))?;
    execute_command(ctx, cli).await
}

#[tokio::test]
async fn test_init_then_validate() {
    let dir = TempDir::new().unwrap();
    let project = dir.path().to_str().unwrap();
    let ctx = context(
        Arc::new(MemoryConfigStore::default()),
        ScriptedPrompter::new(false),
    );

    let output = run(&ctx, &["init", project, "--name", "Whale watch", "--skip-telemetry"])
        .await
        .unwrap();
    assert!(output.contains("manifest.yml"));
    assert!(output.contains("queries.yml"));

    let output = run(&ctx, &["validate", project, "--skip-telemetry"]).await.unwrap();
    assert!(output.ends_with("is valid"));

    let err = run(&ctx, &["init", project, "--name", "Again", "--skip-telemetry"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn test_init_prompts_for_name() {
    let dir = TempDir::new().unwrap();
    let ctx = context(
        Arc::new(MemoryConfigStore::default()),
        ScriptedPrompter::new(false),
    );

    run(&ctx, &["init", dir.path().to_str().unwrap(), "--skip-telemetry"])
        .await
        .unwrap();
    let manifest = mamoru_cli::manifest::read_manifest(dir.path()).unwrap();
    assert_eq!(manifest.name, "prompted");
}

#[tokio::test]
async fn test_validate_reports_every_document() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("manifest.yml"),
        "version: 0.0.1\ntype: sql\nname: x\nchains: [SUI_TESTNET]\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("queries.yml"),
        "queries:\n  - query: SELECT 1\n    severity: fatal\n",
    )
    .unwrap();
    let ctx = context(
        Arc::new(MemoryConfigStore::default()),
        ScriptedPrompter::new(false),
    );

    let err = run(&ctx, &["validate", dir.path().to_str().unwrap(), "--skip-telemetry"])
        .await
        .unwrap_err()
        .to_string();
    assert!(err.contains("severity: must be one of: info, warning, error, alert"));
    assert!(err.contains("incidentMessage: is required"));
}

#[tokio::test]
async fn test_entities_lists_generated_types() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data-source.yml");
    std::fs::write(
        &path,
        r#"
version: "0.1"
name: transfers
entities:
  - name: transfer
    fields:
      - name: amount
        type: decimal128!
        precision: 38
        scale: 9
"#,
    )
    .unwrap();
    let ctx = context(
        Arc::new(MemoryConfigStore::default()),
        ScriptedPrompter::new(false),
    );

    let output = run(&ctx, &["entities", path.to_str().unwrap(), "--skip-telemetry"])
        .await
        .unwrap();
    assert!(output.contains("amount: TransferAmountDecimal128"));
    assert!(output.contains("+ TransferAmountDecimal128"));
}

#[tokio::test]
async fn test_login_and_logout() {
    let store = Arc::new(MemoryConfigStore::default());
    let ctx = context(store.clone(), ScriptedPrompter::new(false));

    run(&ctx, &["auth", "login", "--token", " abc ", "--skip-telemetry"])
        .await
        .unwrap();
    assert_eq!(store.load().unwrap().auth_token.as_deref(), Some("abc"));

    run(&ctx, &["auth", "logout", "--skip-telemetry"]).await.unwrap();
    assert_eq!(store.load().unwrap().auth_token, None);
}

#[tokio::test]
async fn test_listing_requires_login() {
    let ctx = context(
        Arc::new(MemoryConfigStore::default()),
        ScriptedPrompter::new(false),
    );

    let err = run(&ctx, &["agents", "list", "--skip-telemetry"]).await.unwrap_err();
    assert!(err.to_string().contains("Not logged in"));
}

#[tokio::test]
async fn test_telemetry_asked_once() {
    let store = Arc::new(MemoryConfigStore::default());
    let prompter = ScriptedPrompter::new(true);
    let ctx = context(store.clone(), prompter.clone());

    run(&ctx, &["auth", "logout"]).await.unwrap();
    run(&ctx, &["auth", "logout"]).await.unwrap();

    assert_eq!(prompter.confirmations.load(Ordering::SeqCst), 1);
    let config = store.load().unwrap();
    assert_eq!(config.telemetry, Some(true));
    assert!(config.anonymous_id.is_some());
}

#[tokio::test]
async fn test_skip_telemetry_never_asks() {
    let store = Arc::new(MemoryConfigStore::new(CliConfig::default()));
    let prompter = ScriptedPrompter::new(true);
    let ctx = context(store.clone(), prompter.clone());

    run(&ctx, &["auth", "logout", "--skip-telemetry"]).await.unwrap();

    assert_eq!(prompter.confirmations.load(Ordering::SeqCst), 0);
    assert_eq!(store.load().unwrap().telemetry, None);
}
