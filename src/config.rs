//! Configuration for Turnstile
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

/// Turnstile - HTTP transaction gateway for a permissioned token ledger
#[derive(Parser, Debug, Clone)]
#[command(name = "turnstile")]
#[command(about = "HTTP transaction gateway for a permissioned token ledger")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Ledger peer WebSocket URL
    #[arg(long, env = "LEDGER_URL", default_value = "ws://localhost:7051")]
    pub ledger_url: String,

    /// Logical channel every transaction is submitted on
    #[arg(long, env = "CHANNEL_NAME", default_value = "mychannel")]
    pub channel_name: String,

    /// Deployed contract transactions are addressed to
    #[arg(long, env = "CONTRACT_NAME", default_value = "foodie")]
    pub contract_name: String,

    /// Directory holding enrolled identity files (<org>/<user>.id.json)
    #[arg(long, env = "WALLET_DIR", default_value = "wallet")]
    pub wallet_dir: PathBuf,

    /// Bound wait for a single transaction submission, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Enable development mode (readiness ignores ledger connectivity)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_name.trim().is_empty() {
            return Err("CHANNEL_NAME must not be empty".to_string());
        }
        if self.contract_name.trim().is_empty() {
            return Err("CONTRACT_NAME must not be empty".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }
        if !self.ledger_url.starts_with("ws://") && !self.ledger_url.starts_with("wss://") {
            return Err("LEDGER_URL must be a ws:// or wss:// URL".to_string());
        }
        Ok(())
    }
}
