//! Gateway pipeline integration tests
//!
//! Drives the generic operation handler over a recording connector and a
//! scripted transport, verifying:
//! - validation fails fast (no bind, no network round-trip)
//! - the exact per-operation argument marshaling on the wire
//! - envelope shape for success and each failure family
//! - timeout classification and session release (no leaked sessions)
//! - gateway-level idempotence of the read operations

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::Parser;
use http_body_util::BodyExt;
use rmpv::Value as Mp;
use serde_json::{json, Value};

use turnstile::config::Args;
use turnstile::ledger::codec::{get_field, get_string_field};
use turnstile::ledger::{BoundContract, Connector, LedgerTransport, SessionError};
use turnstile::ops::Operation;
use turnstile::routes::run_operation;
use turnstile::server::AppState;
use turnstile::types::Result;
use turnstile::wallet::{FileWallet, Identity, WalletStore};

// =============================================================================
// Fakes
// =============================================================================

/// Transport that records every envelope and plays back scripted replies
struct RecordingTransport {
    replies: Mutex<VecDeque<std::result::Result<Vec<u8>, SessionError>>>,
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    ids: AtomicU64,
}

impl RecordingTransport {
    fn new(replies: Vec<std::result::Result<Vec<u8>, SessionError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            ids: AtomicU64::new(1),
        })
    }

    fn sent_envelopes(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    fn was_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LedgerTransport for RecordingTransport {
    async fn request(
        &self,
        payload: Vec<u8>,
        _timeout_ms: u64,
    ) -> std::result::Result<Vec<u8>, SessionError> {
        self.sent.lock().unwrap().push(payload);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(SessionError::Closed("script exhausted".to_string())))
    }

    async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Relaxed)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    fn next_id(&self) -> u64 {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }
}

/// Connector that records bind invocations and release outcomes, closing
/// poisoned sessions the way the production connector does
struct RecordingConnector {
    transport: Arc<RecordingTransport>,
    bind_calls: AtomicUsize,
    released: Mutex<Vec<bool>>,
}

impl RecordingConnector {
    fn new(transport: Arc<RecordingTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            bind_calls: AtomicUsize::new(0),
            released: Mutex::new(Vec::new()),
        })
    }

    fn bind_count(&self) -> usize {
        self.bind_calls.load(Ordering::Relaxed)
    }

    fn release_log(&self) -> Vec<bool> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn bind(&self, identity: &Identity) -> Result<BoundContract> {
        self.bind_calls.fetch_add(1, Ordering::Relaxed);
        Ok(BoundContract::new(
            &identity.organization,
            &identity.user_id,
            "mychannel",
            "foodie",
            identity.credential.fingerprint(),
            self.transport.clone(),
        ))
    }

    async fn release(&self, bound: BoundContract, poisoned: bool) {
        self.released.lock().unwrap().push(poisoned);
        if poisoned {
            bound.transport().close().await;
        }
    }

    async fn ready(&self) -> bool {
        true
    }
}

// =============================================================================
// Wire helpers (the peer's side of the protocol)
// =============================================================================

fn encode_mp(value: &Mp) -> Vec<u8> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value).unwrap();
    buf
}

/// Build a success reply carrying a committed payload
fn ok_reply(payload: &[u8]) -> Vec<u8> {
    let inner = Mp::Map(vec![
        (Mp::String("type".into()), Mp::String("ok".into())),
        (Mp::String("value".into()), Mp::Binary(payload.to_vec())),
    ]);
    let envelope = Mp::Map(vec![
        (Mp::String("id".into()), Mp::Integer(1u64.into())),
        (Mp::String("type".into()), Mp::String("response".into())),
        (Mp::String("data".into()), Mp::Binary(encode_mp(&inner))),
    ]);
    encode_mp(&envelope)
}

/// Build an error reply with the given kind and message
fn error_reply(kind: &str, message: &str) -> Vec<u8> {
    let err = Mp::Map(vec![
        (Mp::String("kind".into()), Mp::String(kind.into())),
        (Mp::String("message".into()), Mp::String(message.into())),
    ]);
    let inner = Mp::Map(vec![
        (Mp::String("type".into()), Mp::String("error".into())),
        (Mp::String("value".into()), err),
    ]);
    let envelope = Mp::Map(vec![
        (Mp::String("id".into()), Mp::Integer(1u64.into())),
        (Mp::String("type".into()), Mp::String("response".into())),
        (Mp::String("data".into()), Mp::Binary(encode_mp(&inner))),
    ]);
    encode_mp(&envelope)
}

/// Decode a recorded submit envelope back into (transaction, args)
fn decode_submit(envelope: &[u8]) -> (String, Vec<String>) {
    let mut cursor = std::io::Cursor::new(envelope);
    let outer = rmpv::decode::read_value(&mut cursor).unwrap();
    let Mp::Map(outer) = outer else {
        panic!("expected outer map");
    };
    assert_eq!(get_string_field(&outer, "type").as_deref(), Some("request"));

    let Some(Mp::Binary(inner_bytes)) = get_field(&outer, "data") else {
        panic!("expected data frame");
    };
    let mut inner_cursor = std::io::Cursor::new(inner_bytes.as_slice());
    let Mp::Map(inner) = rmpv::decode::read_value(&mut inner_cursor).unwrap() else {
        panic!("expected inner map");
    };
    assert_eq!(
        get_string_field(&inner, "type").as_deref(),
        Some("submit_transaction")
    );

    let Some(Mp::Map(value)) = get_field(&inner, "value") else {
        panic!("expected value map");
    };
    let transaction = get_string_field(value, "transaction").unwrap();
    let Some(Mp::Array(args)) = get_field(value, "args") else {
        panic!("expected args array");
    };
    let args = args
        .iter()
        .map(|a| a.as_str().unwrap().to_string())
        .collect();

    (transaction, args)
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    state: Arc<AppState>,
    transport: Arc<RecordingTransport>,
    connector: Arc<RecordingConnector>,
    _wallet_dir: tempfile::TempDir,
}

/// Build an AppState over a temp wallet (org1/u1 enrolled) and a scripted
/// ledger transport
async fn harness(replies: Vec<std::result::Result<Vec<u8>, SessionError>>) -> Harness {
    let wallet_dir = tempfile::TempDir::new().unwrap();
    let wallet = Arc::new(FileWallet::new(wallet_dir.path()));
    wallet.enroll("org1", "u1").await.unwrap();

    let transport = RecordingTransport::new(replies);
    let connector = RecordingConnector::new(transport.clone());

    let args = Args::parse_from(["turnstile"]);
    let state = Arc::new(AppState::new(args, wallet, connector.clone()));

    Harness {
        state,
        transport,
        connector,
        _wallet_dir: wallet_dir,
    }
}

async fn call(harness: &Harness, op: Operation, body: Value) -> (u16, Value) {
    let response = run_operation(&harness.state, op, &body).await;
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let envelope: Value = serde_json::from_slice(&bytes).unwrap();
    (status, envelope)
}

fn complete_body(op: Operation) -> Value {
    let mut body = serde_json::Map::new();
    for field in op.required_fields() {
        let value = match *field {
            "OrgName" => "org1",
            "UserId" => "u1",
            _ => "x",
        };
        body.insert(field.to_string(), json!(value));
    }
    Value::Object(body)
}

// =============================================================================
// Validation fails fast
// =============================================================================

#[tokio::test]
async fn test_missing_field_fails_before_any_network_call() {
    for op in Operation::ALL {
        for missing in op.required_fields() {
            let h = harness(vec![Ok(ok_reply(b"TX001"))]).await;

            let mut body = complete_body(op);
            body.as_object_mut().unwrap().remove(*missing);

            let (status, envelope) = call(&h, op, body).await;

            assert_eq!(status, 400, "{op:?} missing {missing}");
            assert_eq!(envelope["status"], json!(false));
            assert_eq!(
                envelope["message"],
                json!(format!("{missing} is required"))
            );
            assert_eq!(h.connector.bind_count(), 0, "bind must not be invoked");
            assert!(h.transport.sent_envelopes().is_empty());
        }
    }
}

// =============================================================================
// Argument marshaling shapes
// =============================================================================

#[tokio::test]
async fn test_write_operations_submit_serialized_body() {
    for op in [Operation::Mint, Operation::Transfer, Operation::Burn] {
        let h = harness(vec![Ok(ok_reply(b"TX001"))]).await;
        let body = complete_body(op);

        let (status, _) = call(&h, op, body.clone()).await;
        assert_eq!(status, 200);

        let sent = h.transport.sent_envelopes();
        assert_eq!(sent.len(), 1);
        let (transaction, args) = decode_submit(&sent[0]);
        assert_eq!(transaction, op.transaction_name());
        assert_eq!(args.len(), 1);

        let round_trip: Value = serde_json::from_str(&args[0]).unwrap();
        assert_eq!(round_trip, body, "{op:?} must serialize the full body");
    }
}

#[tokio::test]
async fn test_read_operations_submit_positional_args() {
    let cases = [
        (
            Operation::GetBalance,
            json!({"OrgName": "org1", "UserId": "u1", "Id": "tok1"}),
            vec!["u1", "tok1"],
        ),
        (
            Operation::GetQuery,
            json!({"OrgName": "org1", "UserId": "u1", "DocType": "Token"}),
            vec!["Token"],
        ),
        (
            Operation::GetAllOwners,
            json!({"OrgName": "org1", "UserId": "u1", "DocType": "Token"}),
            vec!["Token"],
        ),
        (
            Operation::GetAssetHistory,
            json!({"OrgName": "org1", "UserId": "u1", "Id": "tok1"}),
            vec!["tok1"],
        ),
    ];

    for (op, body, expected) in cases {
        let h = harness(vec![Ok(ok_reply(b"ok"))]).await;

        let (status, _) = call(&h, op, body).await;
        assert_eq!(status, 200, "{op:?}");

        let sent = h.transport.sent_envelopes();
        let (transaction, args) = decode_submit(&sent[0]);
        assert_eq!(transaction, op.transaction_name());
        assert_eq!(args, expected, "{op:?} positional args");
    }
}

// =============================================================================
// Concrete scenarios
// =============================================================================

#[tokio::test]
async fn test_scenario_mint_commits_and_returns_txid() {
    let h = harness(vec![Ok(ok_reply(b"TX001"))]).await;
    let body = json!({
        "OrgName": "org1",
        "UserId": "u1",
        "Id": "tok1",
        "DocType": "Token",
        "Amount": "100"
    });

    let (status, envelope) = call(&h, Operation::Mint, body).await;

    assert_eq!(status, 200);
    assert_eq!(envelope["status"], json!(true));
    assert_eq!(envelope["txid"], json!("TX001"));
    let message = envelope["message"].as_str().unwrap();
    assert!(message.starts_with("Minting Done Successfully"), "{message}");
}

#[tokio::test]
async fn test_scenario_transfer_missing_receiver() {
    let h = harness(vec![Ok(ok_reply(b"TX002"))]).await;
    let body = json!({
        "OrgName": "org1",
        "UserId": "u1",
        "Id": "tok1",
        "DocType": "Token",
        "Amount": "10"
    });

    let (status, envelope) = call(&h, Operation::Transfer, body).await;

    assert_eq!(status, 400);
    assert_eq!(envelope["status"], json!(false));
    assert_eq!(envelope["message"], json!("Receiver is required"));
    assert!(h.transport.sent_envelopes().is_empty(), "no network call");
}

#[tokio::test]
async fn test_scenario_get_balance_returns_balance_field() {
    let h = harness(vec![Ok(ok_reply(b"42"))]).await;
    let body = json!({"OrgName": "org1", "UserId": "u1", "Id": "tok1"});

    let (status, envelope) = call(&h, Operation::GetBalance, body).await;

    assert_eq!(status, 200);
    assert_eq!(envelope["status"], json!(true));
    assert_eq!(envelope["balance"], json!("42"));
    assert!(envelope.get("txid").is_none());
}

#[tokio::test]
async fn test_scenario_unknown_user_never_binds() {
    let h = harness(vec![Ok(ok_reply(b"TX001"))]).await;
    let body = json!({"OrgName": "org1", "UserId": "ghost", "Id": "tok1"});

    let (status, envelope) = call(&h, Operation::GetBalance, body).await;

    assert_eq!(status, 500);
    assert_eq!(envelope["status"], json!(false));
    assert_eq!(envelope["message"], json!("unknown_user"));
    assert_eq!(h.connector.bind_count(), 0);
}

// =============================================================================
// Timeout classification and session release
// =============================================================================

#[tokio::test]
async fn test_timeout_yields_commit_timeout_and_releases_session() {
    let h = harness(vec![Err(SessionError::TimedOut)]).await;
    let body = complete_body(Operation::Mint);

    let (status, envelope) = call(&h, Operation::Mint, body).await;

    assert_eq!(status, 500);
    assert_eq!(envelope["message"], json!("commit_timeout"));
    assert_eq!(h.connector.release_log(), vec![true]);
    assert!(h.transport.was_closed(), "timed-out session must be closed");
}

#[tokio::test]
async fn test_chaincode_rejection_collapses_to_message() {
    let h = harness(vec![Ok(error_reply("chaincode_error", "duplicate transaction"))]).await;
    let body = complete_body(Operation::Mint);

    let (status, envelope) = call(&h, Operation::Mint, body).await;

    assert_eq!(status, 500);
    assert_eq!(envelope["status"], json!(false));
    assert_eq!(envelope["message"], json!("duplicate transaction"));
}

#[tokio::test]
async fn test_endorsement_failure_reports_reason_token() {
    let h = harness(vec![Ok(error_reply("endorsement_failed", "2 of 3 peers refused"))]).await;
    let body = complete_body(Operation::Transfer);

    let (status, envelope) = call(&h, Operation::Transfer, body).await;

    assert_eq!(status, 500);
    assert_eq!(envelope["message"], json!("endorsement_failed"));
}

// =============================================================================
// Read operations are gateway-idempotent
// =============================================================================

#[tokio::test]
async fn test_reads_twice_produce_independent_successes() {
    let h = harness(vec![Ok(ok_reply(b"42")), Ok(ok_reply(b"42"))]).await;
    let body = json!({"OrgName": "org1", "UserId": "u1", "Id": "tok1"});

    let (status_a, envelope_a) = call(&h, Operation::GetBalance, body.clone()).await;
    let (status_b, envelope_b) = call(&h, Operation::GetBalance, body).await;

    assert_eq!(status_a, 200);
    assert_eq!(status_b, 200);
    assert_eq!(envelope_a, envelope_b);
    assert_eq!(h.connector.bind_count(), 2);
    assert_eq!(h.connector.release_log(), vec![false, false]);
    assert!(!h.transport.was_closed(), "healthy sessions stay pooled");
}
