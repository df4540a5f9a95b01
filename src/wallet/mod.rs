//! Identity resolution - the gateway's wallet
//!
//! Given (organization, user) the wallet produces a connection-ready
//! signing identity or a typed lookup failure. Credentials live on disk
//! under `<wallet_dir>/<org>/<user>.id.json`, written by enrollment and
//! read per request; the wallet holds no secrets across requests.

mod store;

pub use store::FileWallet;

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey};
use sha2::{Digest, Sha256};

use crate::types::Result;

/// Signing material for one enrolled identity
pub struct Credential {
    signing_key: SigningKey,
    fingerprint: String,
}

impl Credential {
    pub fn new(signing_key: SigningKey) -> Self {
        let digest = Sha256::digest(signing_key.verifying_key().as_bytes());
        let fingerprint = hex::encode(&digest[..8]);
        Self {
            signing_key,
            fingerprint,
        }
    }

    /// Public key bytes presented to the ledger peer during authentication
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign the session handshake context
    pub fn sign(&self, context: &[u8]) -> Signature {
        self.signing_key.sign(context)
    }

    /// Short public-key fingerprint, safe for server-side diagnostics
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // key material must never reach logs
        f.debug_struct("Credential")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// A resolved, connection-ready identity. Request-scoped; never persisted
/// by the gateway beyond the wallet files themselves.
#[derive(Debug)]
pub struct Identity {
    pub organization: String,
    pub user_id: String,
    pub credential: Credential,
}

/// Lookup capability over the identity store
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Resolve (organization, user) into a signing identity
    async fn resolve(&self, organization: &str, user_id: &str) -> Result<Identity>;

    /// Register a new identity and import it into the wallet.
    /// Re-enrolling an existing user replaces the stored credential.
    async fn enroll(&self, organization: &str, user_id: &str) -> Result<Identity>;
}
