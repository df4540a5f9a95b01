//! File-backed wallet store
//!
//! One JSON file per enrolled user, one directory per organization:
//! `{organization, userId, publicKey, privateKey, enrolledAt}` with key
//! material base64-encoded. The directory layout doubles as the
//! deployment's membership configuration: an organization is "known"
//! exactly when its directory exists under the wallet root.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroize;

use super::{Credential, Identity, WalletStore};
use crate::types::{GatewayError, LookupReason, Result};

#[derive(Serialize, Deserialize)]
struct IdentityFile {
    organization: String,
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "publicKey")]
    public_key: String,
    #[serde(rename = "privateKey")]
    private_key: String,
    #[serde(rename = "enrolledAt")]
    enrolled_at: String,
}

/// Wallet store over a directory of identity files
pub struct FileWallet {
    root: PathBuf,
}

impl FileWallet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn identity_path(&self, organization: &str, user_id: &str) -> PathBuf {
        self.root
            .join(organization)
            .join(format!("{user_id}.id.json"))
    }

    fn decode_signing_key(file: IdentityFile) -> Result<SigningKey> {
        let mut key_b64 = file.private_key;
        let decoded = STANDARD.decode(&key_b64);
        key_b64.zeroize();

        let mut key_bytes =
            decoded.map_err(|_| GatewayError::from(LookupReason::CredentialUnavailable))?;
        if key_bytes.len() != 32 {
            key_bytes.zeroize();
            return Err(LookupReason::CredentialUnavailable.into());
        }

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&key_bytes);
        key_bytes.zeroize();

        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(signing_key)
    }
}

#[async_trait]
impl WalletStore for FileWallet {
    async fn resolve(&self, organization: &str, user_id: &str) -> Result<Identity> {
        if organization.is_empty() {
            return Err(LookupReason::UnknownOrganization.into());
        }
        if user_id.is_empty() {
            return Err(LookupReason::UnknownUser.into());
        }

        let org_dir = self.root.join(organization);
        if !tokio::fs::try_exists(&org_dir).await.unwrap_or(false) {
            return Err(LookupReason::UnknownOrganization.into());
        }

        let path = self.identity_path(organization, user_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LookupReason::UnknownUser.into());
            }
            Err(e) => {
                debug!(error = %e, path = %path.display(), "identity file unreadable");
                return Err(LookupReason::CredentialUnavailable.into());
            }
        };

        let file: IdentityFile = serde_json::from_slice(&raw)
            .map_err(|_| GatewayError::from(LookupReason::CredentialUnavailable))?;
        let signing_key = Self::decode_signing_key(file)?;

        Ok(Identity {
            organization: organization.to_string(),
            user_id: user_id.to_string(),
            credential: Credential::new(signing_key),
        })
    }

    async fn enroll(&self, organization: &str, user_id: &str) -> Result<Identity> {
        let org_dir = self.root.join(organization);
        tokio::fs::create_dir_all(&org_dir).await?;

        let signing_key = SigningKey::generate(&mut OsRng);
        let mut file = IdentityFile {
            organization: organization.to_string(),
            user_id: user_id.to_string(),
            public_key: STANDARD.encode(signing_key.verifying_key().as_bytes()),
            private_key: STANDARD.encode(signing_key.to_bytes()),
            enrolled_at: Utc::now().to_rfc3339(),
        };

        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| GatewayError::Internal(format!("failed to encode identity: {e}")))?;
        file.private_key.zeroize();

        tokio::fs::write(self.identity_path(organization, user_id), json).await?;

        info!(
            org = %organization,
            user = %user_id,
            "identity enrolled and imported into the wallet"
        );

        Ok(Identity {
            organization: organization.to_string(),
            user_id: user_id.to_string(),
            credential: Credential::new(signing_key),
        })
    }
}
