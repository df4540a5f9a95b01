//! Token operation routes
//!
//! One generic handler serves all seven operations by walking the
//! operation table: parse the JSON body, validate, marshal, resolve the
//! caller's identity, bind a session, submit, release, shape the envelope.
//! The envelope is wire-stable: `{status, message, txid|balance}`.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{error, info};

use super::{json_response, read_json_body};
use crate::ops::Operation;
use crate::server::AppState;
use crate::types::{GatewayError, Result};

/// Handle one token operation request end to end
pub async fn handle_operation(
    state: Arc<AppState>,
    op: Operation,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    match read_json_body(req).await {
        Ok(body) => run_operation(&state, op, &body).await,
        Err(e) => failure_response(op, &Value::Null, e),
    }
}

/// Run one operation against an already-parsed body and shape the envelope
pub async fn run_operation(state: &AppState, op: Operation, body: &Value) -> Response<Full<Bytes>> {
    match execute(state, op, body).await {
        Ok(payload) => {
            info!(
                operation = op.transaction_name(),
                org = org_of(body),
                user = user_of(body),
                "operation committed"
            );
            success_response(op, body, payload)
        }
        Err(e) => failure_response(op, body, e),
    }
}

/// The generic pipeline shared by all operations.
///
/// Validation and marshaling run before any wallet or network call (a
/// malformed request never costs a round-trip), and a bound session is
/// released on every path out of the submit.
async fn execute(state: &AppState, op: Operation, body: &Value) -> Result<String> {
    op.validate(body)?;
    let args = op.marshal(body)?;

    let identity = state.wallet.resolve(org_of(body), user_of(body)).await?;
    let bound = state.connector.bind(&identity).await?;

    let result = state
        .dispatcher
        .submit(&bound, op.transaction_name(), &args)
        .await;
    state.connector.release(bound, result.is_err()).await;

    Ok(String::from_utf8_lossy(&result?).into_owned())
}

fn success_response(op: Operation, body: &Value, payload: String) -> Response<Full<Bytes>> {
    let message = op.success_message(body, &payload);

    let mut envelope = serde_json::Map::new();
    envelope.insert("status".to_string(), json!(true));
    envelope.insert("message".to_string(), json!(message));
    envelope.insert(op.result_field().to_string(), json!(payload));

    json_response(StatusCode::OK, &Value::Object(envelope))
}

/// Collapse any failure into the generic envelope, after logging the
/// distinct kind with the operation and identity context. No internal
/// detail beyond the display message reaches the caller.
fn failure_response(op: Operation, body: &Value, err: GatewayError) -> Response<Full<Bytes>> {
    error!(
        operation = op.transaction_name(),
        org = org_of(body),
        user = user_of(body),
        kind = err.kind(),
        error = %err,
        "operation failed"
    );

    let envelope = json!({
        "status": false,
        "message": err.to_string(),
    });
    json_response(err.status_code(), &envelope)
}

fn org_of(body: &Value) -> &str {
    body.get("OrgName").and_then(Value::as_str).unwrap_or_default()
}

fn user_of(body: &Value) -> &str {
    body.get("UserId").and_then(Value::as_str).unwrap_or_default()
}
