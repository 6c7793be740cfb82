// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment Resolution
//!
//! Determines the active chain id, the RPC endpoint to talk to, and whether
//! the chain is a simulated (local) or production FHE environment.

use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::config::chains::DEFAULT_SIMULATED_RPC_URL;
use crate::config::SimulatedChains;
use crate::error::{SessionError, SessionResult};
use crate::rpc::{parse_chain_id, Connection, RpcConnector, ETH_CHAIN_ID_RPC_METHOD};

/// Outcome of resolving a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub is_simulated: bool,
    /// `None` when a provider handle is connected to a chain with no known
    /// endpoint and no fallback is configured
    pub rpc_url: Option<String>,
    pub chain_id: u64,
}

pub struct EnvironmentResolver {
    connector: Arc<dyn RpcConnector>,
    fallback_rpc_url: Option<String>,
}

impl EnvironmentResolver {
    pub fn new(connector: Arc<dyn RpcConnector>) -> Self {
        Self {
            connector,
            fallback_rpc_url: None,
        }
    }

    /// Endpoint assumed for provider connections on chains absent from the
    /// simulated table. Development setups typically point this at a local node.
    pub fn with_fallback_rpc_url(mut self, rpc_url: Option<String>) -> Self {
        self.fallback_rpc_url = rpc_url;
        self
    }

    pub async fn resolve(
        &self,
        connection: &Connection,
        simulated_chains: &SimulatedChains,
    ) -> SessionResult<ResolvedEnvironment> {
        let (chain_id, rpc_url) = match connection {
            Connection::Url(url) => {
                let rpc = self
                    .connector
                    .connect(url)
                    .map_err(|e| SessionError::resolution(e.to_string()))?;
                let value = rpc
                    .request(ETH_CHAIN_ID_RPC_METHOD, json!([]))
                    .await
                    .map_err(|e| SessionError::resolution(e.to_string()))?;
                let chain_id =
                    parse_chain_id(&value).map_err(|e| SessionError::resolution(e.to_string()))?;
                (chain_id, Some(url.clone()))
            }
            Connection::Provider(handle) => {
                let value = handle
                    .request(ETH_CHAIN_ID_RPC_METHOD, json!([]))
                    .await
                    .map_err(|e| SessionError::resolution(e.to_string()))?;
                let chain_id =
                    parse_chain_id(&value).map_err(|e| SessionError::resolution(e.to_string()))?;
                let rpc_url = match simulated_chains.endpoint(chain_id) {
                    Some(endpoint) => Some(endpoint.to_string()),
                    None if simulated_chains.is_simulated(chain_id) => Some(
                        self.fallback_rpc_url
                            .clone()
                            .unwrap_or_else(|| DEFAULT_SIMULATED_RPC_URL.to_string()),
                    ),
                    None => self.fallback_rpc_url.clone(),
                };
                (chain_id, rpc_url)
            }
        };

        let is_simulated = simulated_chains.is_simulated(chain_id);
        debug!(
            chain_id = chain_id,
            rpc_url = ?rpc_url,
            is_simulated = is_simulated,
            "Resolved FHE environment"
        );

        Ok(ResolvedEnvironment {
            is_simulated,
            rpc_url,
            chain_id,
        })
    }
}
