//! Turnstile - HTTP transaction gateway for a permissioned token ledger

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turnstile::{
    config::Args,
    ledger::GatewayConnector,
    server::{self, AppState},
    wallet::FileWallet,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("turnstile={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Turnstile - Ledger Transaction Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Ledger peer: {}", args.ledger_url);
    info!("Channel: {}", args.channel_name);
    info!("Contract: {}", args.contract_name);
    info!("Wallet: {}", args.wallet_dir.display());
    info!("Request timeout: {} ms", args.request_timeout_ms);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("======================================");

    let wallet = Arc::new(FileWallet::new(&args.wallet_dir));
    let connector = Arc::new(GatewayConnector::new(
        &args.ledger_url,
        &args.channel_name,
        &args.contract_name,
        args.request_timeout_ms,
    ));

    let state = Arc::new(AppState::new(args, wallet, connector));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
