// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cryptographic engine seams
//!
//! The production engine is an external implementation fetched from a fixed
//! distribution location. Loading produces a [`CryptoEngine`], which must be
//! initialized once per process before it can create instances.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::instance::{FheInstance, PublicKeyMaterial, PublicParamsSet};
use crate::config::NetworkConfig;
use crate::rpc::Connection;

/// Options forwarded to the engine's one-time setup routine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOptions {
    pub thread_count: Option<usize>,
}

/// Configuration handed to [`CryptoEngine::create_instance`]
///
/// Engine network defaults merged with the caller's connection and any
/// cached public material.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub network_config: NetworkConfig,
    pub network: Connection,
    pub public_key: Option<PublicKeyMaterial>,
    pub public_params: Option<PublicParamsSet>,
}

#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// One-time setup. `Ok(false)` means the engine reported failure.
    async fn init(&self, options: &InitOptions) -> Result<bool>;

    /// Default deployment the engine targets
    fn network_defaults(&self) -> NetworkConfig;

    async fn create_instance(&self, config: InstanceConfig) -> Result<Arc<dyn FheInstance>>;
}

/// Brings an engine implementation into the process
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn CryptoEngine>>;
}

/// Turns a fetched distribution artifact into a usable engine
pub trait EngineFactory: Send + Sync {
    fn from_artifact(&self, artifact: Vec<u8>) -> Result<Arc<dyn CryptoEngine>>;
}

/// Fetches the engine artifact over HTTP and hands it to an [`EngineFactory`]
pub struct RemoteEngineLoader {
    client: reqwest::Client,
    url: String,
    factory: Arc<dyn EngineFactory>,
}

impl RemoteEngineLoader {
    pub fn new(url: impl Into<String>, factory: Arc<dyn EngineFactory>) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url).map_err(|e| anyhow!("Invalid engine URL {}: {}", url, e))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            url,
            factory,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EngineLoader for RemoteEngineLoader {
    async fn load(&self) -> Result<Arc<dyn CryptoEngine>> {
        info!(url = %self.url, "📦 Fetching FHE engine bundle");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch engine from {}: {}", self.url, e))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Engine fetch from {} returned HTTP {}",
                self.url,
                response.status()
            ));
        }

        let artifact = response
            .bytes()
            .await
            .map_err(|e| anyhow!("Failed to read engine bundle: {}", e))?;
        info!(bytes = artifact.len(), "Engine bundle downloaded");

        self.factory.from_artifact(artifact.to_vec())
    }
}
