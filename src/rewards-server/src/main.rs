//! Rewards kiosk server: check-in tablets and the back-office dashboard on
//! one HTTP port.

use anyhow::Context;
use clap::Parser;
use rewards_api::ApiServer;
use rewards_core::config::AppConfig;
use rewards_kiosk::KioskController;
use rewards_loyalty::LoyaltyEngine;
use rewards_management::{ManagementState, ManagementStore};
use rewards_store::MemoryBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "rewards-server")]
#[command(about = "Loyalty rewards kiosk and management dashboard")]
#[command(version)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, env = "REWARDS_KIOSK_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "REWARDS_KIOSK__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "REWARDS_KIOSK__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Start with empty tables
    #[arg(long, default_value_t = false)]
    no_seed: bool,
}

/// A file named with `--config` must load. Only the environment-only load
/// falls back to defaults.
fn load_config(path: Option<&str>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            AppConfig::load(Some(path)).with_context(|| format!("Failed to load config file {path}"))
        }
        None => Ok(AppConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        })),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewards=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Rewards kiosk starting up");

    let mut config = load_config(cli.config.as_deref())?;

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if cli.no_seed {
        config.seed_demo_data = false;
    }
    let config = config.normalized();

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        idle_timeout_secs = config.kiosk.idle_timeout_secs,
        server_authoritative_redemption = config.loyalty.server_authoritative_redemption,
        "Configuration loaded"
    );

    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(ManagementStore::new());
    if config.seed_demo_data {
        backend.seed_demo_data();
        store.seed_demo_data();
        info!("Demo data loaded");
    }

    let engine = Arc::new(LoyaltyEngine::new(backend, &config.loyalty));
    let kiosk = Arc::new(KioskController::new(engine.clone(), &config.kiosk));
    let management = ManagementState::new(store, engine, &config);

    // Idle timeouts and success countdowns
    let _sweeper = kiosk.spawn_sweeper(Duration::from_millis(config.kiosk.sweep_interval_ms));

    let api_server = ApiServer::new(config.clone(), kiosk, management);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Rewards kiosk is ready to serve traffic");

    // Blocks until shutdown
    api_server.start_http().await?;

    Ok(())
}
