//! The operation table
//!
//! Every gateway operation is a declarative record: transaction name,
//! required fields, argument marshaling shape, result field, success text.
//! One generic dispatch routine in `routes::token` walks this table; there
//! is no per-operation handler code.
//!
//! The marshaling shapes are part of the deployed contract's wire contract
//! and must not be "cleaned up": write operations serialize the complete
//! request body (extra fields like `TxnId` pass through untouched), read
//! operations pass curated positional scalars.

use serde_json::Value;

use crate::types::{GatewayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Mint,
    Transfer,
    Burn,
    GetBalance,
    GetQuery,
    GetAllOwners,
    GetAssetHistory,
}

/// How an operation's arguments go over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// The full request body, JSON-encoded, as a single argument
    SerializedBody,
    /// The named body fields passed as positional scalars, in order
    Positional(&'static [&'static str]),
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Mint,
        Operation::Transfer,
        Operation::Burn,
        Operation::GetBalance,
        Operation::GetQuery,
        Operation::GetAllOwners,
        Operation::GetAssetHistory,
    ];

    /// Transaction name recognized by the deployed contract
    pub fn transaction_name(&self) -> &'static str {
        match self {
            Operation::Mint => "Mint",
            Operation::Transfer => "Transfer",
            Operation::Burn => "Burn",
            Operation::GetBalance => "GetBalance",
            Operation::GetQuery => "GetQuery",
            Operation::GetAllOwners => "GetAllOwners",
            Operation::GetAssetHistory => "GetAssetHistory",
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Operation::Mint => &["OrgName", "UserId", "Id", "DocType", "Amount"],
            Operation::Transfer => &[
                "OrgName", "UserId", "Id", "DocType", "Amount", "Receiver",
            ],
            Operation::Burn => &[
                "OrgName",
                "UserId",
                "Id",
                "DocType",
                "BurnTokenId",
                "BurnTokenAmount",
            ],
            Operation::GetBalance => &["OrgName", "UserId", "Id"],
            Operation::GetQuery | Operation::GetAllOwners => &["OrgName", "UserId", "DocType"],
            Operation::GetAssetHistory => &["OrgName", "UserId", "Id"],
        }
    }

    pub fn arg_shape(&self) -> ArgShape {
        match self {
            Operation::Mint | Operation::Transfer | Operation::Burn => ArgShape::SerializedBody,
            Operation::GetBalance => ArgShape::Positional(&["UserId", "Id"]),
            Operation::GetQuery | Operation::GetAllOwners => ArgShape::Positional(&["DocType"]),
            Operation::GetAssetHistory => ArgShape::Positional(&["Id"]),
        }
    }

    /// Name of the data field in the success envelope
    pub fn result_field(&self) -> &'static str {
        match self {
            Operation::GetBalance => "balance",
            _ => "txid",
        }
    }

    /// Write operations mutate ledger state; a timed-out write is an
    /// unknown outcome and must not be blindly retried
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Mint | Operation::Transfer | Operation::Burn)
    }

    /// Check every required field before any wallet or network call
    pub fn validate(&self, body: &Value) -> Result<()> {
        for field in self.required_fields() {
            if !has_value(body, field) {
                return Err(GatewayError::Validation {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Marshal the request body into wire arguments
    pub fn marshal(&self, body: &Value) -> Result<Vec<String>> {
        match self.arg_shape() {
            ArgShape::SerializedBody => {
                let encoded = serde_json::to_string(body).map_err(|e| {
                    GatewayError::Internal(format!("failed to serialize body: {e}"))
                })?;
                Ok(vec![encoded])
            }
            ArgShape::Positional(fields) => {
                fields.iter().map(|field| scalar_arg(body, field)).collect()
            }
        }
    }

    /// Success text for the response envelope
    pub fn success_message(&self, body: &Value, payload: &str) -> String {
        match self {
            Operation::Mint => {
                format!("Minting Done Successfully & Minted Token - {payload}")
            }
            Operation::Transfer => {
                let receiver = body
                    .get("Receiver")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                format!("Successfully Transferred Token to {receiver}")
            }
            Operation::Burn => "Burn Token Successfully".to_string(),
            Operation::GetBalance => "Balance fetch successfully".to_string(),
            Operation::GetQuery => "GetQuery Fetch Successfully".to_string(),
            Operation::GetAllOwners => "getAllOwner Fetch Successfully".to_string(),
            Operation::GetAssetHistory => "getHistory Fetch Successfully".to_string(),
        }
    }
}

fn has_value(body: &Value, field: &str) -> bool {
    match body.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn scalar_arg(body: &Value, field: &str) -> Result<String> {
    match body.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(GatewayError::Validation {
            field: field.to_string(),
        }),
    }
}
