// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! JSON-RPC Transport Seams
//!
//! The session layer treats the chain transport as an opaque request/response
//! interface plus an event subscription. This module defines those seams and
//! an `ethers` HTTP adapter.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub const ETH_CHAIN_ID_RPC_METHOD: &str = "eth_chainId";
pub const WEB3_CLIENT_VERSION_RPC_METHOD: &str = "web3_clientVersion";
pub const FHEVM_RELAYER_METADATA_RPC_METHOD: &str = "fhevm_relayer_metadata";

const PROVIDER_EVENT_CAPACITY: usize = 16;

/// Request/response half of a chain connection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JsonRpc: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// Account and network notifications emitted by a live provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnected,
}

/// A live provider: JSON-RPC plus event subscription
pub trait ConnectionHandle: JsonRpc {
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

/// Shared provider handle with a stable identity
///
/// Two handles compare equal only if they were cloned from the same
/// [`ProviderHandle::new`] call.
#[derive(Clone)]
pub struct ProviderHandle {
    id: u64,
    inner: Arc<dyn ConnectionHandle>,
}

impl ProviderHandle {
    pub fn new(inner: Arc<dyn ConnectionHandle>) -> Self {
        Self {
            id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
            inner,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.request(method, params).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner.subscribe()
    }

    pub fn as_rpc(&self) -> Arc<dyn JsonRpc> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl JsonRpc for ProviderHandle {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.request(method, params).await
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle").field("id", &self.id).finish()
    }
}

/// What the caller is connected through
#[derive(Clone, Debug)]
pub enum Connection {
    /// Literal endpoint URL
    Url(String),
    /// Live provider handle
    Provider(ProviderHandle),
}

/// Comparable identity of a [`Connection`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionIdentity {
    Url(String),
    Provider(u64),
}

impl Connection {
    pub fn url(url: impl Into<String>) -> Self {
        Connection::Url(url.into())
    }

    pub fn provider(inner: Arc<dyn ConnectionHandle>) -> Self {
        Connection::Provider(ProviderHandle::new(inner))
    }

    pub fn identity(&self) -> ConnectionIdentity {
        match self {
            Connection::Url(url) => ConnectionIdentity::Url(url.clone()),
            Connection::Provider(handle) => ConnectionIdentity::Provider(handle.id()),
        }
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionIdentity::Url(url) => write!(f, "url:{}", url),
            ConnectionIdentity::Provider(id) => write!(f, "provider:{}", id),
        }
    }
}

/// Opens a JSON-RPC client for an endpoint URL
pub trait RpcConnector: Send + Sync {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn JsonRpc>>;
}

/// Default connector backed by `ethers` HTTP providers
#[derive(Debug, Default, Clone)]
pub struct HttpConnector;

impl RpcConnector for HttpConnector {
    fn connect(&self, rpc_url: &str) -> Result<Arc<dyn JsonRpc>> {
        Ok(Arc::new(EthersRpc::new(rpc_url)?))
    }
}

/// `ethers` HTTP provider adapter
///
/// HTTP endpoints cannot push notifications, so the event stream only carries
/// what is sent through [`EthersRpc::notify`].
pub struct EthersRpc {
    provider: Provider<Http>,
    events: broadcast::Sender<ProviderEvent>,
}

impl EthersRpc {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| anyhow!("Failed to create provider for {}: {}", rpc_url, e))?;
        let (events, _) = broadcast::channel(PROVIDER_EVENT_CAPACITY);
        Ok(Self { provider, events })
    }

    pub fn notify(&self, event: ProviderEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl JsonRpc for EthersRpc {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let value: Value = self
            .provider
            .request(method, params)
            .await
            .map_err(|e| anyhow!("{} failed: {}", method, e))?;
        Ok(value)
    }
}

impl ConnectionHandle for EthersRpc {
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// Parse an `eth_chainId` result (hex quantity or plain number)
pub fn parse_chain_id(value: &Value) -> Result<u64> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16)
                    .map_err(|e| anyhow!("Invalid chain id '{}': {}", s, e)),
                None => trimmed
                    .parse::<u64>()
                    .map_err(|e| anyhow!("Invalid chain id '{}': {}", s, e)),
            }
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| anyhow!("Invalid chain id: {}", n)),
        other => Err(anyhow!("Unexpected chain id value: {}", other)),
    }
}
