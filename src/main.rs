//! mamoru-cli entry point

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mamoru_cli::cli::{execute_command, Cli, CommandContext};
use mamoru_cli::config::{CliConfig, ConfigStore, FileConfigStore, MemoryConfigStore};
use mamoru_cli::publish::StdinPrompter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "mamoru_cli=debug" } else { "mamoru_cli=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse()?)
        )
        .init();

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            interrupt.cancel();
        }
    });

    let config_store: Arc<dyn ConfigStore> = match FileConfigStore::default_location() {
        Ok(store) => {
            debug!(path = %store.path().display(), "Using config file");
            Arc::new(store)
        }
        Err(e) => {
            warn!("Settings will not be saved: {}", e);
            Arc::new(MemoryConfigStore::new(CliConfig::default()))
        }
    };

    let ctx = CommandContext {
        config_store,
        prompter: Arc::new(StdinPrompter::new()),
        cancel,
    };

    match execute_command(&ctx, cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            debug!(error = ?e, "Command failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
