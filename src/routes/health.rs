//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the gateway process running?)
//! - /ready, /readyz - readiness (can the gateway reach the ledger peer?)
//! - /version - build info for deployment verification
//!
//! Liveness never touches the network. Readiness reports 503 until the
//! ledger endpoint answers, unless dev mode is enabled.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: &'static str,
    uptime_secs: u64,
    timestamp: String,
    mode: &'static str,
    node_id: String,
    channel: String,
    contract: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    ledger: LedgerHealth,
}

#[derive(Serialize)]
struct LedgerHealth {
    connected: bool,
    url: String,
}

fn health_body(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
        channel: state.args.channel_name.clone(),
        contract: state.args.contract_name.clone(),
    }
}

/// Liveness probe: 200 whenever the process is up
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = serde_json::to_value(health_body(&state))
        .unwrap_or_else(|_| serde_json::json!({"healthy": true}));
    json_response(StatusCode::OK, &body)
}

/// Readiness probe: 200 only when the ledger peer is reachable (or in
/// dev mode, where the gateway may run without a ledger behind it)
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let connected = state.connector.ready().await;
    let ready = connected || state.args.dev_mode;

    let body = ReadyResponse {
        ready,
        ledger: LedgerHealth {
            connected,
            url: state.args.ledger_url.clone(),
        },
    };
    let body = serde_json::to_value(body)
        .unwrap_or_else(|_| serde_json::json!({"ready": false}));

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &body)
}

#[derive(Serialize)]
struct VersionResponse {
    version: &'static str,
    commit: &'static str,
    build_time: &'static str,
    service: &'static str,
}

/// Build information for deployment verification
pub fn version_info() -> Response<Full<Bytes>> {
    let body = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "turnstile",
    };
    let body = serde_json::to_value(body)
        .unwrap_or_else(|_| serde_json::json!({"version": "unknown"}));
    json_response(StatusCode::OK, &body)
}
