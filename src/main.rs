//! New-Pair Sniper
//!
//! Main entry point. Loads the env file, connects to the node (ws/ipc for
//! subscriptions, http falls back to polling), and runs the engine until
//! SIGINT/SIGTERM.
//!
//! Dry run by default: eligible pools are logged as DRY RUN intents.
//! Pass --live (or LIVE_MODE=true) to sign and submit.
//!
//! Created: 2026-10-19

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use pair_sniper::chain::{AlloyChainClient, ChainClient, LocalKeySigner, Signer};
use pair_sniper::config::load_config_from_file;
use pair_sniper::execution::SystemClock;
use pair_sniper::Engine;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// New-pair sniper for Uniswap V2 style factories
#[derive(Parser)]
#[command(name = "pair-sniper")]
struct Args {
    /// Env file with RPC_URL, PRIVATE_KEY, QUOTE_TOKEN, ...
    #[arg(long, env = "ENV_FILE", default_value = ".env")]
    env_file: String,

    /// Sign and submit transactions (overrides LIVE_MODE)
    #[arg(long)]
    live: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.log_json {
        fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    let mut config = load_config_from_file(&args.env_file)
        .with_context(|| format!("Failed to load configuration from {}", args.env_file))?;
    if args.live {
        config.live_mode = true;
    }

    info!("===========================================");
    info!("   New-Pair Sniper ({})", if config.live_mode { "LIVE" } else { "DRY RUN" });
    info!("===========================================");
    info!("Configuration loaded from {} (chain_id: {})", args.env_file, config.chain_id);
    info!("RPC URL: {}", config.rpc_url_preview());
    info!("Factory: {}", config.factory);
    info!("Router: {}", config.execution.router);
    info!("Quote token: {}", config.execution.quote_token);
    info!("Trade amount: {} wei", config.execution.amount_in);
    info!("Read failure policy: {:?}", config.read_failure_policy);

    let client: Arc<dyn ChainClient> = Arc::new(
        AlloyChainClient::connect(&config.rpc_url)
            .await
            .context("Failed to connect to RPC")?,
    );
    let block = client.block_number().await.context("Failed to read head block")?;
    info!("Connected! Current block: {}", block);

    let signer: Arc<dyn Signer> = Arc::new(
        LocalKeySigner::from_secret(&config.private_key, config.chain_id, client.clone())
            .context("Failed to load PRIVATE_KEY")?,
    );
    info!("Wallet: {}", signer.address());
    if !config.live_mode {
        warn!("DRY RUN - no transactions will be signed or submitted");
    }

    // SIGINT/SIGTERM -> shutdown watch
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();
    tokio::spawn(async move {
        if let Some(sig) = signals.next().await {
            info!("Received signal {} - shutting down", sig);
            let _ = shutdown_tx.send(true);
        }
    });

    let engine = Engine::new(&config, client, signer, Arc::new(SystemClock), shutdown_rx);
    let result = engine.run().await;
    signals_handle.close();

    match result {
        Ok(()) => {
            info!("Sniper stopped");
            Ok(())
        }
        Err(e) => {
            error!("Sniper stopped: {}", e);
            Err(e.into())
        }
    }
}
