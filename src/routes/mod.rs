//! HTTP routes for Turnstile

pub mod enroll;
pub mod health;
pub mod token;

pub use enroll::handle_enroll;
pub use health::{health_check, readiness_check, version_info};
pub use token::{handle_operation, run_operation};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;

use crate::types::{GatewayError, Result};

/// Serialize a JSON envelope with the standard headers
pub(crate) fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"status":false,"message":"serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Collect and parse a JSON request body
pub(crate) async fn read_json_body(req: Request<Incoming>) -> Result<Value> {
    let bytes = req
        .into_body()
        .collect()
        .await
        .map_err(|e| GatewayError::BadRequest(format!("failed to read body: {e}")))?
        .to_bytes();

    if bytes.is_empty() {
        return Err(GatewayError::BadRequest("empty body".to_string()));
    }

    serde_json::from_slice(&bytes).map_err(|e| GatewayError::BadRequest(e.to_string()))
}
