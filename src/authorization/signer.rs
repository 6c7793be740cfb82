// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Authorization signing
//!
//! Produces a fresh [`AuthorizationCredential`] by asking the instance for the
//! structured payload and the user's wallet for a typed-data signature.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::signers::Signer;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::Address;
use tracing::{debug, error};

use super::credential::{unix_now, AuthorizationCredential};
use super::storage_key::canonical_contracts;
use crate::config::DEFAULT_AUTHORIZATION_DURATION_DAYS;
use crate::error::{SessionError, SessionResult};
use crate::sdk::FheInstance;

/// The user's wallet as seen by the authorization flow
#[async_trait]
pub trait UserSigner: Send + Sync {
    async fn address(&self) -> Result<Address>;

    /// 65-byte signature over `payload`, `0x`-hex encoded
    async fn sign_typed_data(&self, payload: &TypedData) -> Result<String>;
}

#[async_trait]
impl<S> UserSigner for S
where
    S: Signer + Send + Sync,
    S::Error: 'static,
{
    async fn address(&self) -> Result<Address> {
        Ok(Signer::address(self))
    }

    async fn sign_typed_data(&self, payload: &TypedData) -> Result<String> {
        let signature = Signer::sign_typed_data(self, payload)
            .await
            .map_err(|e| anyhow!("Typed data signing failed: {}", e))?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationSigner {
    duration_days: u64,
}

impl Default for AuthorizationSigner {
    fn default() -> Self {
        Self {
            duration_days: DEFAULT_AUTHORIZATION_DURATION_DAYS,
        }
    }
}

impl AuthorizationSigner {
    pub fn new(duration_days: u64) -> Self {
        Self { duration_days }
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    /// Sign a credential starting now. Failures are logged and yield `None`.
    pub async fn create(
        &self,
        instance: &dyn FheInstance,
        contract_addresses: &[Address],
        public_key: &str,
        private_key: &str,
        signer: &dyn UserSigner,
    ) -> Option<AuthorizationCredential> {
        self.create_at(
            instance,
            contract_addresses,
            public_key,
            private_key,
            signer,
            unix_now(),
        )
        .await
    }

    pub async fn create_at(
        &self,
        instance: &dyn FheInstance,
        contract_addresses: &[Address],
        public_key: &str,
        private_key: &str,
        signer: &dyn UserSigner,
        start_timestamp: u64,
    ) -> Option<AuthorizationCredential> {
        match self
            .try_create(
                instance,
                contract_addresses,
                public_key,
                private_key,
                signer,
                start_timestamp,
            )
            .await
        {
            Ok(credential) => Some(credential),
            Err(e) => {
                error!("Failed to create decryption authorization: {}", e);
                None
            }
        }
    }

    async fn try_create(
        &self,
        instance: &dyn FheInstance,
        contract_addresses: &[Address],
        public_key: &str,
        private_key: &str,
        signer: &dyn UserSigner,
        start_timestamp: u64,
    ) -> SessionResult<AuthorizationCredential> {
        let user_address = signer
            .address()
            .await
            .map_err(|e| SessionError::signing("address", e.to_string()))?;

        let contracts = canonical_contracts(contract_addresses);
        let eip712 = instance
            .create_eip712(public_key, &contracts, start_timestamp, self.duration_days)
            .map_err(|e| SessionError::signing("payload", e.to_string()))?;

        let signature = signer
            .sign_typed_data(&eip712)
            .await
            .map_err(|e| SessionError::signing("sign", e.to_string()))?;

        debug!(
            user = ?user_address,
            contracts = contracts.len(),
            duration_days = self.duration_days,
            "✍️  Decryption authorization signed"
        );

        Ok(AuthorizationCredential {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
            signature,
            contract_addresses: contracts,
            user_address,
            start_timestamp,
            duration_days: self.duration_days,
            eip712,
        })
    }
}
