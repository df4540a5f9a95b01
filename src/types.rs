//! Crate-wide error taxonomy
//!
//! Four failure families map onto the request pipeline: validation
//! (caller's malformed input), lookup (unknown identity), connection
//! (cannot reach or authenticate to the ledger network), and submission
//! (the transaction itself was rejected, timed out, or aborted). All are
//! terminal for the current request; the gateway never retries on its own.

use hyper::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Why an identity lookup failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupReason {
    #[error("unknown_organization")]
    UnknownOrganization,
    #[error("unknown_user")]
    UnknownUser,
    #[error("credential_unavailable")]
    CredentialUnavailable,
}

/// Why a ledger session could not be established or bound
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectReason {
    #[error("auth_rejected")]
    AuthRejected,
    #[error("channel_not_found")]
    ChannelNotFound,
    #[error("contract_not_found")]
    ContractNotFound,
    #[error("network_unreachable: {0}")]
    NetworkUnreachable(String),
}

/// Why a submitted transaction failed
///
/// `CommitTimeout` also covers any ambiguous outcome: the dispatcher never
/// reports "maybe committed", so an unknown commit state surfaces here as a
/// retryable-by-the-caller timeout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitReason {
    #[error("endorsement_failed")]
    EndorsementFailed,
    #[error("commit_timeout")]
    CommitTimeout,
    #[error("{0}")]
    ChaincodeError(String),
    #[error("malformed_arguments")]
    MalformedArguments,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required field is missing, null, or empty in the request body
    #[error("{field} is required")]
    Validation { field: String },

    /// (organization, user) did not resolve to a usable identity
    #[error("{0}")]
    Lookup(#[from] LookupReason),

    /// Could not reach, authenticate to, or bind on the ledger network
    #[error("{0}")]
    Connection(#[from] ConnectReason),

    /// The ledger rejected, timed out, or aborted the transaction
    #[error("{0}")]
    Submission(#[from] SubmitReason),

    /// Unreadable or non-JSON request body
    #[error("invalid request body: {0}")]
    BadRequest(String),

    /// Failures that must not leak detail to callers beyond this message
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// HTTP status for the response envelope: caller mistakes are 400,
    /// everything upstream is 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } | GatewayError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short kind tag for server-side diagnostics. The envelope collapses
    /// error kinds; logs must not.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "validation",
            GatewayError::Lookup(_) => "lookup",
            GatewayError::Connection(_) => "connection",
            GatewayError::Submission(_) => "submission",
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::Internal(_) => "internal",
            GatewayError::Io(_) => "io",
        }
    }
}
