//! Transaction Dispatcher
//!
//! Submits one named transaction on a bound contract and waits for the
//! committed result. Failures come back classified; there is no retry here
//! and no "maybe committed" outcome. Anything ambiguous (timeout, socket
//! lost mid-submit) surfaces as `commit_timeout` so the caller knows to
//! confirm ledger state before resubmitting.

use tracing::debug;

use super::codec::{self, PeerReply};
use super::connector::BoundContract;
use super::session::SessionError;
use crate::types::{Result, SubmitReason};

pub struct Dispatcher {
    request_timeout_ms: u64,
}

impl Dispatcher {
    pub fn new(request_timeout_ms: u64) -> Self {
        Self { request_timeout_ms }
    }

    /// Submit `transaction` with positional `args`, blocking until the
    /// ledger commits or the bounded wait elapses. Returns the committed
    /// result payload.
    pub async fn submit(
        &self,
        contract: &BoundContract,
        transaction: &str,
        args: &[String],
    ) -> Result<Vec<u8>> {
        let inner = codec::build_submit(transaction, args)?;
        let envelope = codec::build_request(contract.transport().next_id(), &inner)?;

        debug!(
            transaction = %transaction,
            channel = %contract.channel_name,
            contract = %contract.contract_name,
            args = args.len(),
            "submitting transaction"
        );

        let reply = match contract
            .transport()
            .request(envelope, self.request_timeout_ms)
            .await
        {
            Ok(reply) => reply,
            Err(SessionError::TimedOut) => {
                return Err(SubmitReason::CommitTimeout.into());
            }
            Err(SessionError::Closed(_)) => {
                // Connection died after the submit left; outcome unknown
                return Err(SubmitReason::CommitTimeout.into());
            }
        };

        match codec::parse_reply(&reply)? {
            PeerReply::Payload(payload) => Ok(payload),
            PeerReply::Error { kind, message } => Err(classify_submit(&kind, message).into()),
        }
    }
}

fn classify_submit(kind: &str, message: String) -> SubmitReason {
    match kind {
        "endorsement_failed" => SubmitReason::EndorsementFailed,
        "commit_timeout" => SubmitReason::CommitTimeout,
        "malformed_arguments" | "invalid_arguments" => SubmitReason::MalformedArguments,
        _ => SubmitReason::ChaincodeError(message),
    }
}
