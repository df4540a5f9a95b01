//! HTTP server implementation
//!
//! hyper http1 with TokioIo: one spawned task per accepted connection,
//! manual match-based routing. Requests are fully independent; the only
//! state shared between them is the connector's session pool.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::ledger::{Connector, Dispatcher};
use crate::ops::Operation;
use crate::routes::{self, json_response};
use crate::types::Result;
use crate::wallet::WalletStore;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub started_at: Instant,
    /// Identity resolver over the wallet directory
    pub wallet: Arc<dyn WalletStore>,
    /// Connection manager; injected so tests can fake the ledger
    pub connector: Arc<dyn Connector>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(args: Args, wallet: Arc<dyn WalletStore>, connector: Arc<dyn Connector>) -> Self {
        let dispatcher = Dispatcher::new(args.request_timeout_ms);
        Self {
            args,
            started_at: Instant::now(),
            wallet,
            connector,
            dispatcher,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Turnstile listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - readiness ignores ledger connectivity");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move {
                            Ok::<_, Infallible>(handle_request(state, addr, req).await)
                        }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    match (method, path.as_str()) {
        // Token operations, one generic handler over the operation table
        (Method::POST, "/student/mint") => {
            routes::handle_operation(state, Operation::Mint, req).await
        }
        (Method::POST, "/student/transfer") => {
            routes::handle_operation(state, Operation::Transfer, req).await
        }
        (Method::POST, "/student/burn") => {
            routes::handle_operation(state, Operation::Burn, req).await
        }
        (Method::POST, "/student/getBalance") => {
            routes::handle_operation(state, Operation::GetBalance, req).await
        }
        (Method::POST, "/student/getQuery") => {
            routes::handle_operation(state, Operation::GetQuery, req).await
        }
        (Method::POST, "/student/getAllOwner") => {
            routes::handle_operation(state, Operation::GetAllOwners, req).await
        }
        (Method::POST, "/student/getHistory") => {
            routes::handle_operation(state, Operation::GetAssetHistory, req).await
        }

        // Enrollment - all three paths share one handler
        (Method::POST, "/identity")
        | (Method::POST, "/identity/addCollege")
        | (Method::POST, "/identity/addStudent") => routes::handle_enroll(state, req).await,

        // Liveness probe - 200 whenever the gateway is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(state),

        // Readiness probe - 200 only when the ledger peer is reachable
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(state).await
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        (_, p) if is_known_path(p) => method_not_allowed(p),
        (_, p) => not_found_response(p),
    }
}

fn is_known_path(path: &str) -> bool {
    matches!(
        path,
        "/student/mint"
            | "/student/transfer"
            | "/student/burn"
            | "/student/getBalance"
            | "/student/getQuery"
            | "/student/getAllOwner"
            | "/student/getHistory"
            | "/identity"
            | "/identity/addCollege"
            | "/identity/addStudent"
            | "/health"
            | "/healthz"
            | "/ready"
            | "/readyz"
            | "/version"
    )
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &json!({"status": false, "message": format!("no route for {path}")}),
    )
}

fn method_not_allowed(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({"status": false, "message": format!("method not allowed for {path}")}),
    )
}
