// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Authorization Cache
//!
//! Reuses a stored, still-valid credential for a (user, contract set,
//! optional public key) combination and only asks the wallet to sign on a
//! miss. Expired or unreadable entries count as misses and are overwritten,
//! never deleted.

use ethers::types::Address;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::credential::AuthorizationCredential;
use super::signer::{AuthorizationSigner, UserSigner};
use super::storage::StringStorage;
use super::storage_key::AuthorizationStorageKey;
use crate::sdk::{FheInstance, KeyPair};

#[derive(Clone)]
pub struct AuthorizationCache {
    storage: Arc<dyn StringStorage>,
    signer: AuthorizationSigner,
}

impl AuthorizationCache {
    pub fn new(storage: Arc<dyn StringStorage>) -> Self {
        Self {
            storage,
            signer: AuthorizationSigner::default(),
        }
    }

    pub fn with_signer(mut self, signer: AuthorizationSigner) -> Self {
        self.signer = signer;
        self
    }

    pub fn storage(&self) -> &Arc<dyn StringStorage> {
        &self.storage
    }

    /// Stored credential if present, readable and still valid
    pub async fn load(
        &self,
        user_address: Address,
        contract_addresses: &[Address],
        public_key: Option<&str>,
    ) -> Option<AuthorizationCredential> {
        let key = AuthorizationStorageKey::new(user_address, contract_addresses, public_key);

        let stored = match self.storage.get_item(key.as_str()).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, "Failed to read decryption authorization: {}", e);
                return None;
            }
        };

        let credential = match AuthorizationCredential::from_json(&stored) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(key = %key, "Ignoring unreadable decryption authorization: {}", e);
                return None;
            }
        };

        if !credential.is_valid() {
            debug!(key = %key, expired_at = credential.expires_at(), "Stored authorization expired");
            return None;
        }
        Some(credential)
    }

    /// Cached credential or a freshly signed one
    ///
    /// A supplied keypair is reused and its public key becomes part of the
    /// storage key; otherwise the instance generates a new keypair.
    pub async fn load_or_sign(
        &self,
        instance: &dyn FheInstance,
        contract_addresses: &[Address],
        signer: &dyn UserSigner,
        key_pair: Option<&KeyPair>,
    ) -> Option<AuthorizationCredential> {
        let user_address = match signer.address().await {
            Ok(address) => address,
            Err(e) => {
                error!("Failed to resolve signer address: {}", e);
                return None;
            }
        };
        let public_key = key_pair.map(|pair| pair.public_key.as_str());

        if let Some(credential) = self.load(user_address, contract_addresses, public_key).await {
            info!(user = ?user_address, "Using cached decryption authorization");
            return Some(credential);
        }

        info!(user = ?user_address, "Creating new decryption authorization");
        let key_pair = match key_pair {
            Some(pair) => pair.clone(),
            None => instance.generate_keypair(),
        };

        let credential = self
            .signer
            .create(
                instance,
                contract_addresses,
                &key_pair.public_key,
                &key_pair.private_key,
                signer,
            )
            .await?;

        self.save(&credential, public_key.is_some()).await;
        Some(credential)
    }

    async fn save(&self, credential: &AuthorizationCredential, include_public_key: bool) {
        let key = AuthorizationStorageKey::new(
            credential.user_address(),
            credential.contract_addresses(),
            include_public_key.then(|| credential.public_key()),
        );

        let json = match credential.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, "Failed to serialize decryption authorization: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.set_item(key.as_str(), &json).await {
            warn!(key = %key, "Failed to persist decryption authorization: {}", e);
        }
    }
}
