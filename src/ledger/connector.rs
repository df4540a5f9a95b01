//! Connection Manager
//!
//! Turns a resolved identity into a session bound to the configured channel
//! and contract. Sessions are pooled by (org, user, channel, contract), so
//! a session is never shared across identities. Reuse is an optimization
//! only: a fresh bind is always safe, and correctness never depends on a
//! pooled session still being alive.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::codec::{self, PeerReply};
use super::session::LedgerSession;
use super::LedgerTransport;
use crate::types::{ConnectReason, GatewayError, Result};
use crate::wallet::Identity;

/// A session bound to one identity, one channel, and one contract.
/// Request-scoped: obtained from `Connector::bind` and handed back through
/// `Connector::release` on every exit path.
pub struct BoundContract {
    pub organization: String,
    pub user_id: String,
    pub channel_name: String,
    pub contract_name: String,
    /// Credential fingerprint for diagnostics; never credential material
    pub fingerprint: String,
    key: String,
    transport: Arc<dyn LedgerTransport>,
}

impl BoundContract {
    pub fn new(
        organization: &str,
        user_id: &str,
        channel_name: &str,
        contract_name: &str,
        fingerprint: &str,
        transport: Arc<dyn LedgerTransport>,
    ) -> Self {
        Self {
            organization: organization.to_string(),
            user_id: user_id.to_string(),
            channel_name: channel_name.to_string(),
            contract_name: contract_name.to_string(),
            fingerprint: fingerprint.to_string(),
            key: pool_key(organization, user_id, channel_name, contract_name),
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<dyn LedgerTransport> {
        &self.transport
    }
}

/// Binds identities to ledger sessions and owns their lifecycle
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish (or reuse) an authenticated session bound to the
    /// configured channel and contract
    async fn bind(&self, identity: &Identity) -> Result<BoundContract>;

    /// Hand a bound session back. Poisoned or disconnected sessions are
    /// closed and evicted; healthy ones return to the pool.
    async fn release(&self, bound: BoundContract, poisoned: bool);

    /// Whether the ledger endpoint is currently reachable
    async fn ready(&self) -> bool;
}

/// Production connector over pooled `LedgerSession`s
pub struct GatewayConnector {
    ledger_url: String,
    channel_name: String,
    contract_name: String,
    handshake_timeout_ms: u64,
    sessions: DashMap<String, Arc<dyn LedgerTransport>>,
}

impl GatewayConnector {
    pub fn new(
        ledger_url: &str,
        channel_name: &str,
        contract_name: &str,
        handshake_timeout_ms: u64,
    ) -> Self {
        Self {
            ledger_url: ledger_url.to_string(),
            channel_name: channel_name.to_string(),
            contract_name: contract_name.to_string(),
            handshake_timeout_ms,
            sessions: DashMap::new(),
        }
    }

    fn bound(&self, identity: &Identity, transport: Arc<dyn LedgerTransport>) -> BoundContract {
        BoundContract::new(
            &identity.organization,
            &identity.user_id,
            &self.channel_name,
            &self.contract_name,
            identity.credential.fingerprint(),
            transport,
        )
    }

    /// Run one handshake request and fold the peer's answer into a
    /// connection error if it refused
    async fn handshake_step(
        &self,
        session: &LedgerSession,
        inner: Vec<u8>,
    ) -> Result<()> {
        let envelope = codec::build_request(session.next_id(), &inner)?;
        let reply = session
            .request(envelope, self.handshake_timeout_ms)
            .await
            .map_err(|e| {
                GatewayError::Connection(ConnectReason::NetworkUnreachable(e.to_string()))
            })?;

        match codec::parse_reply(&reply)? {
            PeerReply::Payload(_) => Ok(()),
            PeerReply::Error { kind, message } => {
                Err(GatewayError::Connection(classify_bind(&kind, message)))
            }
        }
    }
}

#[async_trait]
impl Connector for GatewayConnector {
    async fn bind(&self, identity: &Identity) -> Result<BoundContract> {
        let key = pool_key(
            &identity.organization,
            &identity.user_id,
            &self.channel_name,
            &self.contract_name,
        );

        // Fast path: reuse the pooled session for this exact identity + binding
        if let Some(existing) = self.sessions.get(&key) {
            let transport = Arc::clone(existing.value());
            drop(existing);
            if transport.is_connected().await {
                debug!(key = %key, "reusing pooled ledger session");
                return Ok(self.bound(identity, transport));
            }
            self.sessions
                .remove_if(&key, |_, v| Arc::ptr_eq(v, &transport));
        }

        let session = LedgerSession::connect(&self.ledger_url).await?;

        // Authenticate before anything else; then bind channel + contract.
        // A session that fails either step is closed before the error leaves.
        let auth = codec::build_authenticate(identity, &self.channel_name, &self.contract_name)?;
        if let Err(e) = self.handshake_step(&session, auth).await {
            session.close().await;
            return Err(e);
        }

        let bind = codec::build_bind(&self.channel_name, &self.contract_name)?;
        if let Err(e) = self.handshake_step(&session, bind).await {
            session.close().await;
            return Err(e);
        }

        let transport: Arc<dyn LedgerTransport> = Arc::new(session);
        self.sessions.insert(key.clone(), Arc::clone(&transport));

        info!(
            org = %identity.organization,
            user = %identity.user_id,
            channel = %self.channel_name,
            contract = %self.contract_name,
            fingerprint = %identity.credential.fingerprint(),
            "ledger session bound"
        );

        Ok(self.bound(identity, transport))
    }

    async fn release(&self, bound: BoundContract, poisoned: bool) {
        if poisoned || !bound.transport.is_connected().await {
            warn!(key = %bound.key, "evicting ledger session");
            bound.transport.close().await;
            self.sessions
                .remove_if(&bound.key, |_, v| Arc::ptr_eq(v, &bound.transport));
        }
        // Healthy sessions simply stay pooled
    }

    async fn ready(&self) -> bool {
        // Snapshot the pool first; map shards are not held across awaits
        let pooled: Vec<Arc<dyn LedgerTransport>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for transport in pooled {
            if transport.is_connected().await {
                return true;
            }
        }

        // No live session yet; probe the endpoint without authenticating
        match LedgerSession::connect(&self.ledger_url).await {
            Ok(probe) => {
                probe.close().await;
                true
            }
            Err(_) => false,
        }
    }
}

fn pool_key(organization: &str, user_id: &str, channel_name: &str, contract_name: &str) -> String {
    format!("{organization}/{user_id}@{channel_name}:{contract_name}")
}

fn classify_bind(kind: &str, message: String) -> ConnectReason {
    match kind {
        "auth_rejected" | "unauthorized" => ConnectReason::AuthRejected,
        "channel_not_found" => ConnectReason::ChannelNotFound,
        "contract_not_found" => ConnectReason::ContractNotFound,
        _ => ConnectReason::NetworkUnreachable(message),
    }
}
