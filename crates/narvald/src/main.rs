//! narvald - the narval launcher
//!
//! Runs one game server session on a throwaway host:
//! - Configuration loading (file plus environment)
//! - Artifact store selection
//! - Launch orchestration with chat notifications

use anyhow::{Context, Result};
use clap::Parser;
use narval_config::{load_config, NotifyConfig, StoreConfig};
use narval_store::{ArtifactStore, DirStore, S3Store};
use narval_util::default_config_path;
use narvald::{resolve_public_address, select_server, Launcher, LogNotifier, Notifier, WebhookNotifier};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// narvald - Ephemeral game server launcher
#[derive(Parser, Debug)]
#[command(name = "narvald")]
#[command(about = "Prepare, run and announce an ephemeral game server", long_about = None)]
struct Args {
    /// Configuration file path (default: ./narval.toml when present)
    #[arg(short, long, env = "NARVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Game adapter override
    #[arg(short, long)]
    game: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

async fn open_store(config: &StoreConfig) -> Arc<dyn ArtifactStore> {
    match config {
        StoreConfig::S3 {
            bucket,
            prefix,
            region,
        } => Arc::new(S3Store::connect(bucket.clone(), prefix, region.clone()).await),
        StoreConfig::Dir { path } => Arc::new(DirStore::new(path.clone())),
    }
}

fn notifier(config: &NotifyConfig, http: reqwest::Client) -> Arc<dyn Notifier> {
    match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(http, url.clone())),
        None => Arc::new(LogNotifier),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "narvald starting"
    );

    let config_path = args
        .config
        .or_else(|| Some(default_config_path()).filter(|p| p.exists()));

    let mut config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load config from the environment".to_string(),
    })?;

    if let Some(game) = args.game {
        config.game = game;
    }

    info!(
        game = %config.game,
        game_dir = %config.game_dir.display(),
        "Configuration loaded"
    );

    let http = reqwest::Client::new();
    let store = open_store(&config.store).await;
    info!(store = %store.describe(), "Artifact store ready");

    let server = select_server(&config.game, store, &config.game_dir)?;
    let notifier = notifier(&config.notify, http.clone());

    let report = Launcher::new(server, notifier, config.server.clone())
        .run(resolve_public_address(http))
        .await
        .context("Launch failed")?;

    info!(
        lines = report.lines,
        notifications = report.notifications,
        "narvald exiting"
    );
    Ok(())
}
