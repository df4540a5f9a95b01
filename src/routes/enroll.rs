//! Identity enrollment routes
//!
//! `/identity`, `/identity/addCollege`, and `/identity/addStudent` all
//! share one handler: register the (organization, user) pair and import
//! the generated credential into the wallet. Credential issuance beyond
//! the gateway's own wallet is the membership service's concern.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::{json, Value};
use tracing::error;

use super::{json_response, read_json_body};
use crate::server::AppState;
use crate::types::GatewayError;

pub async fn handle_enroll(state: Arc<AppState>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let body = match read_json_body(req).await {
        Ok(body) => body,
        Err(e) => return enroll_failure("", "", e),
    };

    let org = body.get("OrgName").and_then(Value::as_str).unwrap_or_default();
    let user = body.get("UserId").and_then(Value::as_str).unwrap_or_default();

    for (field, value) in [("OrgName", org), ("UserId", user)] {
        if value.trim().is_empty() {
            return enroll_failure(
                org,
                user,
                GatewayError::Validation {
                    field: field.to_string(),
                },
            );
        }
    }

    match state.wallet.enroll(org, user).await {
        Ok(identity) => {
            let envelope = json!({
                "status": true,
                "message": format!(
                    "Successfully registered and enrolled user {} of {} and imported it into the wallet",
                    identity.user_id, identity.organization
                ),
            });
            json_response(StatusCode::OK, &envelope)
        }
        Err(e) => enroll_failure(org, user, e),
    }
}

fn enroll_failure(org: &str, user: &str, err: GatewayError) -> Response<Full<Bytes>> {
    error!(
        operation = "Enroll",
        org = org,
        user = user,
        kind = err.kind(),
        error = %err,
        "enrollment failed"
    );

    let envelope = json!({
        "status": false,
        "message": err.to_string(),
    });
    json_response(err.status_code(), &envelope)
}
