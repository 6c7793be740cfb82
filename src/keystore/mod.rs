// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Material Store
//!
//! Persistent cache of the expensive public cryptographic material (network
//! public key and public parameters) indexed by authority (ACL) contract
//! address.
//!
//! The cache is monotonic: entries are upserted, never deleted. When no
//! persistence medium is configured every read returns an empty
//! [`KeyMaterial`] and writes are dropped.

pub mod file;

pub use file::FileKeyMaterialMedium;

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::sdk::{PublicKeyMaterial, PublicParamsMaterial, PublicParamsSet};

/// Logical stores inside a medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMaterialKind {
    PublicKey,
    PublicParams,
}

impl KeyMaterialKind {
    pub fn store_name(&self) -> &'static str {
        match self {
            KeyMaterialKind::PublicKey => "publicKeyStore",
            KeyMaterialKind::PublicParams => "paramsStore",
        }
    }
}

/// Binary key-value medium addressable by authority address
#[async_trait]
pub trait KeyMaterialMedium: Send + Sync {
    async fn get(&self, kind: KeyMaterialKind, authority: Address) -> Result<Option<Vec<u8>>>;
    async fn put(&self, kind: KeyMaterialKind, authority: Address, value: Vec<u8>) -> Result<()>;
}

/// In-memory medium, useful for tests and short-lived processes
#[derive(Clone, Default)]
pub struct MemoryKeyMaterialMedium {
    entries: Arc<RwLock<HashMap<(KeyMaterialKind, Address), Vec<u8>>>>,
}

impl MemoryKeyMaterialMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl KeyMaterialMedium for MemoryKeyMaterialMedium {
    async fn get(&self, kind: KeyMaterialKind, authority: Address) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(&(kind, authority)).cloned())
    }

    async fn put(&self, kind: KeyMaterialKind, authority: Address, value: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert((kind, authority), value);
        Ok(())
    }
}

/// Cached public material for one authority
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMaterial {
    pub public_key: Option<PublicKeyMaterial>,
    pub public_params: Option<PublicParamsSet>,
}

impl KeyMaterial {
    pub fn is_empty(&self) -> bool {
        self.public_key.is_none() && self.public_params.is_none()
    }
}

#[derive(Clone)]
pub struct KeyMaterialStore {
    medium: Option<Arc<dyn KeyMaterialMedium>>,
    params_bits: u32,
}

impl KeyMaterialStore {
    pub fn new(medium: Arc<dyn KeyMaterialMedium>, params_bits: u32) -> Self {
        Self {
            medium: Some(medium),
            params_bits,
        }
    }

    /// Store with no persistence medium
    pub fn disabled() -> Self {
        Self {
            medium: None,
            params_bits: crate::config::DEFAULT_PUBLIC_PARAMS_BITS,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.medium.is_some()
    }

    pub fn params_bits(&self) -> u32 {
        self.params_bits
    }

    pub async fn get(&self, authority: Address) -> Result<KeyMaterial> {
        let Some(medium) = &self.medium else {
            return Ok(KeyMaterial::default());
        };

        let public_key = match medium.get(KeyMaterialKind::PublicKey, authority).await? {
            Some(bytes) => Some(bincode::deserialize::<PublicKeyMaterial>(&bytes)?),
            None => None,
        };

        let public_params = match medium.get(KeyMaterialKind::PublicParams, authority).await? {
            Some(bytes) => {
                let params: PublicParamsMaterial = bincode::deserialize(&bytes)?;
                let mut set = PublicParamsSet::new();
                set.insert(self.params_bits, params);
                Some(set)
            }
            None => None,
        };

        debug!(
            authority = ?authority,
            has_public_key = public_key.is_some(),
            has_public_params = public_params.is_some(),
            "Key material lookup"
        );

        Ok(KeyMaterial {
            public_key,
            public_params,
        })
    }

    /// Upsert whichever fields are supplied; absent fields are left untouched
    pub async fn set(
        &self,
        authority: Address,
        public_key: Option<&PublicKeyMaterial>,
        public_params: Option<&PublicParamsMaterial>,
    ) -> Result<()> {
        let Some(medium) = &self.medium else {
            return Ok(());
        };

        if let Some(key) = public_key {
            medium
                .put(KeyMaterialKind::PublicKey, authority, bincode::serialize(key)?)
                .await?;
        }

        if let Some(params) = public_params {
            medium
                .put(
                    KeyMaterialKind::PublicParams,
                    authority,
                    bincode::serialize(params)?,
                )
                .await?;
        }

        Ok(())
    }
}
