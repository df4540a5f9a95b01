//! Wire codec for the ledger peer protocol
//!
//! The peer speaks MessagePack envelopes over WebSocket. Every request is
//! `{id, type: "request", data: <inner bytes>}`; the inner frame is
//! `{type: <op>, value: <map>}`. Replies come back as
//! `{id, type: "response", data: <inner bytes>}` where the inner frame is
//! `{type: "ok", value: <payload>}` or
//! `{type: "error", value: {kind, message}}`.

use std::io::Cursor;

use rmpv::Value;

use crate::types::{GatewayError, Result};
use crate::wallet::Identity;

/// Outcome of a decoded peer reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerReply {
    /// Committed result payload
    Payload(Vec<u8>),
    /// Peer-reported failure, classified by the caller
    Error { kind: String, message: String },
}

/// Wrap an inner frame in the request envelope
pub fn build_request(id: u64, inner: &[u8]) -> Result<Vec<u8>> {
    let envelope = Value::Map(vec![
        (Value::String("id".into()), Value::Integer(id.into())),
        (
            Value::String("type".into()),
            Value::String("request".into()),
        ),
        (
            Value::String("data".into()),
            Value::Binary(inner.to_vec()),
        ),
    ]);

    encode(&envelope)
}

/// Build the `authenticate` inner frame sent first on every new session.
///
/// The signature covers the identity and the bind target so a credential
/// presented for one channel/contract pair cannot be replayed for another.
pub fn build_authenticate(
    identity: &Identity,
    channel_name: &str,
    contract_name: &str,
) -> Result<Vec<u8>> {
    let context = format!(
        "{}:{}:{}:{}",
        identity.organization, identity.user_id, channel_name, contract_name
    );
    let signature = identity.credential.sign(context.as_bytes());

    let value = Value::Map(vec![
        (
            Value::String("organization".into()),
            Value::String(identity.organization.clone().into()),
        ),
        (
            Value::String("user".into()),
            Value::String(identity.user_id.clone().into()),
        ),
        (
            Value::String("public_key".into()),
            Value::Binary(identity.credential.public_key().to_vec()),
        ),
        (
            Value::String("signature".into()),
            Value::Binary(signature.to_bytes().to_vec()),
        ),
    ]);

    encode(&inner_frame("authenticate", value))
}

/// Build the `bind_channel` inner frame naming the channel and contract
/// this session submits against
pub fn build_bind(channel_name: &str, contract_name: &str) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (
            Value::String("channel".into()),
            Value::String(channel_name.into()),
        ),
        (
            Value::String("contract".into()),
            Value::String(contract_name.into()),
        ),
    ]);

    encode(&inner_frame("bind_channel", value))
}

/// Build the `submit_transaction` inner frame for a named transaction
/// with positional string arguments
pub fn build_submit(transaction: &str, args: &[String]) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (
            Value::String("transaction".into()),
            Value::String(transaction.into()),
        ),
        (
            Value::String("args".into()),
            Value::Array(
                args.iter()
                    .map(|a| Value::String(a.clone().into()))
                    .collect(),
            ),
        ),
    ]);

    encode(&inner_frame("submit_transaction", value))
}

/// Decode a peer reply down to its payload or reported error
pub fn parse_reply(data: &[u8]) -> Result<PeerReply> {
    let mut cursor = Cursor::new(data);
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| GatewayError::Internal(format!("failed to decode peer reply: {e}")))?;

    let Value::Map(ref map) = value else {
        return Err(GatewayError::Internal(
            "unexpected peer reply format".into(),
        ));
    };

    // Errors may be reported at the envelope level
    if get_string_field(map, "type").as_deref() == Some("error") {
        if let Some(Value::Map(ref err_map)) = get_field(map, "value") {
            return Ok(reply_error(err_map));
        }
        return Ok(PeerReply::Error {
            kind: "unknown".to_string(),
            message: "unknown peer error".to_string(),
        });
    }

    let Some(Value::Binary(inner_bytes)) = get_field(map, "data") else {
        return Err(GatewayError::Internal(
            "peer reply missing data frame".into(),
        ));
    };

    let mut inner_cursor = Cursor::new(inner_bytes.as_slice());
    let inner = rmpv::decode::read_value(&mut inner_cursor)
        .map_err(|e| GatewayError::Internal(format!("failed to decode inner reply: {e}")))?;

    let Value::Map(ref inner_map) = inner else {
        return Err(GatewayError::Internal(
            "unexpected inner reply format".into(),
        ));
    };

    match get_string_field(inner_map, "type").as_deref() {
        Some("ok") => {
            let payload = match get_field(inner_map, "value") {
                Some(Value::Binary(bytes)) => bytes.clone(),
                Some(Value::String(s)) => s.as_bytes().to_vec(),
                Some(Value::Nil) | None => Vec::new(),
                Some(other) => {
                    return Err(GatewayError::Internal(format!(
                        "unexpected ok payload type: {other}"
                    )))
                }
            };
            Ok(PeerReply::Payload(payload))
        }
        Some("error") => {
            if let Some(Value::Map(ref err_map)) = get_field(inner_map, "value") {
                Ok(reply_error(err_map))
            } else {
                Ok(PeerReply::Error {
                    kind: "unknown".to_string(),
                    message: "unknown peer error".to_string(),
                })
            }
        }
        _ => Err(GatewayError::Internal(
            "inner reply missing type tag".into(),
        )),
    }
}

fn reply_error(err_map: &[(Value, Value)]) -> PeerReply {
    PeerReply::Error {
        kind: get_string_field(err_map, "kind").unwrap_or_else(|| "unknown".to_string()),
        message: get_string_field(err_map, "message").unwrap_or_else(|| "unknown".to_string()),
    }
}

fn inner_frame(frame_type: &str, value: Value) -> Value {
    Value::Map(vec![
        (
            Value::String("type".into()),
            Value::String(frame_type.into()),
        ),
        (Value::String("value".into()), value),
    ])
}

fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value)
        .map_err(|e| GatewayError::Internal(format!("failed to encode frame: {e}")))?;
    Ok(buf)
}

/// Get a field from a MessagePack map
pub fn get_field<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    for (k, v) in map {
        if let Value::String(k_str) = k {
            if k_str.as_str() == Some(key) {
                return Some(v);
            }
        }
    }
    None
}

/// Get a string field from a MessagePack map
pub fn get_string_field(map: &[(Value, Value)], key: &str) -> Option<String> {
    match get_field(map, key) {
        Some(Value::String(s)) => s.as_str().map(|s| s.to_string()),
        _ => None,
    }
}

/// Peer-side reply builder for tests that fake the ledger end of the wire
#[cfg(test)]
pub(crate) fn encode_reply(id: u64, inner_type: &str, value: Value) -> Vec<u8> {
    let inner = inner_frame(inner_type, value);
    let mut inner_buf = Vec::new();
    rmpv::encode::write_value(&mut inner_buf, &inner).unwrap();

    let envelope = Value::Map(vec![
        (Value::String("id".into()), Value::Integer(id.into())),
        (
            Value::String("type".into()),
            Value::String("response".into()),
        ),
        (Value::String("data".into()), Value::Binary(inner_buf)),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &envelope).unwrap();
    buf
}
