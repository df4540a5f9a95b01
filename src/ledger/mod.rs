//! Ledger network access
//!
//! Everything between the HTTP surface and the ledger peer lives here:
//! the wire codec, the authenticated WebSocket session, the identity-keyed
//! connection pool, and the transaction dispatcher.

pub mod codec;
pub mod connector;
pub mod dispatch;
pub mod session;

pub use connector::{BoundContract, Connector, GatewayConnector};
pub use dispatch::Dispatcher;
pub use session::{LedgerSession, SessionError};

use async_trait::async_trait;

/// One authenticated wire session to a ledger peer.
///
/// Implementations must process requests one at a time: a pooled session is
/// shared across requests, and concurrent use of a single unsynchronized
/// session is unsafe. `LedgerSession` serializes structurally (its pump task
/// completes each request before taking the next).
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Send a request envelope and wait for the peer's reply, bounded by
    /// `timeout_ms`.
    async fn request(
        &self,
        payload: Vec<u8>,
        timeout_ms: u64,
    ) -> std::result::Result<Vec<u8>, SessionError>;

    /// Whether the underlying connection is still usable
    async fn is_connected(&self) -> bool;

    /// Tear the session down; subsequent requests fail
    async fn close(&self);

    /// Next request envelope id for this session
    fn next_id(&self) -> u64;
}
