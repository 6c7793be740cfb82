// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Configuration
//!
//! Configuration for the session controller, key material persistence and the
//! authorization cache. Loaded from environment variables or a TOML file.

pub mod chains;

pub use chains::{NetworkConfig, SimulatedChains, GATEWAY_CHAIN_ID, SIMULATED_CHAIN_ID};

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SessionError;
use crate::sdk::{EngineFactory, RemoteEngineLoader, SdkBootstrap};

/// Fixed distribution location of the relayer engine bundle
pub const DEFAULT_SDK_URL: &str =
    "https://cdn.zama.ai/relayer-sdk-js/0.1.2/relayer-sdk-js.umd.cjs";

/// Validity window of a freshly signed decryption authorization
pub const DEFAULT_AUTHORIZATION_DURATION_DAYS: u64 = 365;

/// Security size class of the persisted public parameters
pub const DEFAULT_PUBLIC_PARAMS_BITS: u32 = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Chains served by a local simulated node
    pub simulated_chains: SimulatedChains,

    /// Endpoint used for provider connections on chains that are neither
    /// simulated nor carry their own endpoint. `None` means no endpoint is
    /// assumed.
    pub fallback_rpc_url: Option<String>,

    /// Directory for persisted public key / params (none = no persistence)
    pub key_material_dir: Option<PathBuf>,

    /// Directory for persisted decryption authorizations
    pub authorization_dir: Option<PathBuf>,

    /// Engine distribution URL
    pub sdk_url: String,

    pub authorization_duration_days: u64,

    pub public_params_bits: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulated_chains: SimulatedChains::local(),
            fallback_rpc_url: None,
            key_material_dir: None,
            authorization_dir: None,
            sdk_url: DEFAULT_SDK_URL.to_string(),
            authorization_duration_days: DEFAULT_AUTHORIZATION_DURATION_DAYS,
            public_params_bits: DEFAULT_PUBLIC_PARAMS_BITS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SimulatedChainEntry {
    chain_id: u64,
    rpc_url: String,
}

/// On-disk TOML layout
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    simulated_chains: Vec<SimulatedChainEntry>,
    fallback_rpc_url: Option<String>,
    key_material_dir: Option<PathBuf>,
    authorization_dir: Option<PathBuf>,
    sdk_url: Option<String>,
    authorization_duration_days: Option<u64>,
    public_params_bits: Option<u32>,
}

impl SessionConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `FHEVM_SIMULATED_CHAINS`: `id=url,id=url` (default: `31337=http://localhost:8545`)
    /// - `FHEVM_FALLBACK_RPC_URL`: endpoint for unknown provider chains (default: unset)
    /// - `FHEVM_KEY_MATERIAL_DIR`: directory for public key / params
    /// - `FHEVM_AUTHORIZATION_DIR`: directory for decryption authorizations
    /// - `FHEVM_SDK_URL`: engine distribution URL
    /// - `FHEVM_AUTHORIZATION_DURATION_DAYS`: validity window (default: 365)
    pub fn from_env() -> Result<Self, SessionError> {
        let defaults = Self::default();

        let simulated_chains = match env::var("FHEVM_SIMULATED_CHAINS") {
            Ok(entries) => SimulatedChains::parse(&entries)?,
            Err(_) => defaults.simulated_chains,
        };

        let authorization_duration_days = match env::var("FHEVM_AUTHORIZATION_DURATION_DAYS") {
            Ok(days) => days.parse::<u64>().map_err(|e| SessionError::Config {
                field: "authorization_duration_days".to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => defaults.authorization_duration_days,
        };

        let config = Self {
            simulated_chains,
            fallback_rpc_url: env::var("FHEVM_FALLBACK_RPC_URL").ok(),
            key_material_dir: env::var("FHEVM_KEY_MATERIAL_DIR").ok().map(PathBuf::from),
            authorization_dir: env::var("FHEVM_AUTHORIZATION_DIR").ok().map(PathBuf::from),
            sdk_url: env::var("FHEVM_SDK_URL").unwrap_or(defaults.sdk_url),
            authorization_duration_days,
            public_params_bits: defaults.public_params_bits,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, SessionError> {
        let file: FileConfig = toml::from_str(contents).map_err(|e| SessionError::Config {
            field: "toml".to_string(),
            reason: e.to_string(),
        })?;
        let defaults = Self::default();

        let simulated_chains = if file.simulated_chains.is_empty() {
            defaults.simulated_chains
        } else {
            let mut chains = SimulatedChains::new();
            for entry in file.simulated_chains {
                chains.insert(entry.chain_id, entry.rpc_url);
            }
            chains
        };

        let config = Self {
            simulated_chains,
            fallback_rpc_url: file.fallback_rpc_url,
            key_material_dir: file.key_material_dir,
            authorization_dir: file.authorization_dir,
            sdk_url: file.sdk_url.unwrap_or(defaults.sdk_url),
            authorization_duration_days: file
                .authorization_duration_days
                .unwrap_or(defaults.authorization_duration_days),
            public_params_bits: file.public_params_bits.unwrap_or(defaults.public_params_bits),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| SessionError::Config {
            field: "path".to_string(),
            reason: format!("{}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loader that fetches the engine bundle from `sdk_url`
    pub fn engine_loader(
        &self,
        factory: Arc<dyn EngineFactory>,
    ) -> Result<RemoteEngineLoader, SessionError> {
        RemoteEngineLoader::new(self.sdk_url.clone(), factory).map_err(|e| SessionError::Config {
            field: "sdk_url".to_string(),
            reason: e.to_string(),
        })
    }

    /// Install the process-wide bootstrap backed by [`Self::engine_loader`].
    ///
    /// Returns `Ok(false)` if a bootstrap was already installed.
    pub fn install_engine(&self, factory: Arc<dyn EngineFactory>) -> Result<bool, SessionError> {
        let loader = self.engine_loader(factory)?;
        Ok(SdkBootstrap::install_global(SdkBootstrap::new(Arc::new(loader))))
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        url::Url::parse(&self.sdk_url).map_err(|e| SessionError::Config {
            field: "sdk_url".to_string(),
            reason: e.to_string(),
        })?;
        for (chain_id, rpc_url) in self.simulated_chains.iter() {
            url::Url::parse(rpc_url).map_err(|e| SessionError::Config {
                field: format!("simulated_chains.{}", chain_id),
                reason: e.to_string(),
            })?;
        }
        if let Some(fallback) = &self.fallback_rpc_url {
            url::Url::parse(fallback).map_err(|e| SessionError::Config {
                field: "fallback_rpc_url".to_string(),
                reason: e.to_string(),
            })?;
        }
        if self.authorization_duration_days == 0 {
            return Err(SessionError::Config {
                field: "authorization_duration_days".to_string(),
                reason: "must be at least one day".to_string(),
            });
        }
        Ok(())
    }
}
