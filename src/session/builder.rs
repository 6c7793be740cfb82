// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Builder
//!
//! One attempt at producing a ready FHE instance for a connection. The
//! builder has no state of its own; the controller owns cancellation and
//! decides what to do with the result.

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, SimulatedChains};
use crate::environment::{EnvironmentResolver, ResolvedEnvironment};
use crate::error::{SessionError, SessionResult};
use crate::keystore::{FileKeyMaterialMedium, KeyMaterialStore};
use crate::rpc::{Connection, RpcConnector};
use crate::sdk::{FheInstance, InitOptions, InstanceConfig, SdkBootstrap};
use crate::simulated::{probe_simulated_node, SimulatedInstance};

/// Progress reported while a build runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    SdkLoading,
    SdkInitializing,
    Creating,
    Ready,
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildPhase::SdkLoading => "sdk-loading",
            BuildPhase::SdkInitializing => "sdk-initializing",
            BuildPhase::Creating => "creating",
            BuildPhase::Ready => "ready",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct SessionBuilder {
    resolver: Arc<EnvironmentResolver>,
    connector: Arc<dyn RpcConnector>,
    bootstrap: Arc<SdkBootstrap>,
    key_store: KeyMaterialStore,
    init_options: InitOptions,
}

fn ensure_active(token: &CancellationToken) -> SessionResult<()> {
    if token.is_cancelled() {
        Err(SessionError::Cancelled)
    } else {
        Ok(())
    }
}

impl SessionBuilder {
    pub fn new(
        resolver: Arc<EnvironmentResolver>,
        connector: Arc<dyn RpcConnector>,
        bootstrap: Arc<SdkBootstrap>,
        key_store: KeyMaterialStore,
    ) -> Self {
        Self {
            resolver,
            connector,
            bootstrap,
            key_store,
            init_options: InitOptions::default(),
        }
    }

    /// Builder wired from operator configuration
    pub fn from_config(
        config: &SessionConfig,
        connector: Arc<dyn RpcConnector>,
        bootstrap: Arc<SdkBootstrap>,
    ) -> Self {
        let resolver = EnvironmentResolver::new(connector.clone())
            .with_fallback_rpc_url(config.fallback_rpc_url.clone());
        let key_store = match &config.key_material_dir {
            Some(dir) => KeyMaterialStore::new(
                Arc::new(FileKeyMaterialMedium::new(dir.clone())),
                config.public_params_bits,
            ),
            None => KeyMaterialStore::disabled(),
        };
        Self::new(Arc::new(resolver), connector, bootstrap, key_store)
    }

    pub fn with_init_options(mut self, options: InitOptions) -> Self {
        self.init_options = options;
        self
    }

    pub fn bootstrap(&self) -> &Arc<SdkBootstrap> {
        &self.bootstrap
    }

    /// Produce a ready instance for `connection`
    ///
    /// `on_phase` is only invoked while the build is still live. A cancelled
    /// build returns [`SessionError::Cancelled`] and leaves the key material
    /// store untouched.
    pub async fn build<F>(
        &self,
        connection: Connection,
        simulated_chains: &SimulatedChains,
        token: CancellationToken,
        mut on_phase: F,
    ) -> SessionResult<Arc<dyn FheInstance>>
    where
        F: FnMut(BuildPhase) + Send,
    {
        let environment = self.resolver.resolve(&connection, simulated_chains).await?;
        ensure_active(&token)?;

        if environment.is_simulated {
            return self.build_simulated(&environment, &token, &mut on_phase).await;
        }

        self.build_production(connection, &token, &mut on_phase).await
    }

    async fn build_simulated<F>(
        &self,
        environment: &ResolvedEnvironment,
        token: &CancellationToken,
        on_phase: &mut F,
    ) -> SessionResult<Arc<dyn FheInstance>>
    where
        F: FnMut(BuildPhase) + Send,
    {
        let rpc_url = environment.rpc_url.as_deref().ok_or_else(|| {
            SessionError::resolution(format!(
                "no endpoint known for simulated chain {}",
                environment.chain_id
            ))
        })?;

        let rpc = self.connector.connect(rpc_url).map_err(|e| {
            SessionError::IncompatibleSimulatedNode {
                rpc_url: rpc_url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let metadata = probe_simulated_node(rpc.as_ref(), rpc_url).await?;
        ensure_active(token)?;

        on_phase(BuildPhase::Creating);
        let instance: Arc<dyn FheInstance> =
            Arc::new(SimulatedInstance::new(rpc, environment.chain_id, metadata));
        ensure_active(token)?;

        info!(chain_id = environment.chain_id, rpc_url = %rpc_url, "🧪 Simulated FHE instance ready");
        on_phase(BuildPhase::Ready);
        Ok(instance)
    }

    async fn build_production<F>(
        &self,
        connection: Connection,
        token: &CancellationToken,
        on_phase: &mut F,
    ) -> SessionResult<Arc<dyn FheInstance>>
    where
        F: FnMut(BuildPhase) + Send,
    {
        on_phase(BuildPhase::SdkLoading);
        let engine = self.bootstrap.ensure_loaded().await?;
        ensure_active(token)?;

        if !self.bootstrap.is_initialized() {
            on_phase(BuildPhase::SdkInitializing);
            self.bootstrap.ensure_initialized(&self.init_options).await?;
            ensure_active(token)?;
        }

        let network_config = engine.network_defaults();
        let authority = network_config.acl_contract_address;

        let cached = match self.key_store.get(authority).await {
            Ok(material) => material,
            Err(e) => {
                warn!(authority = ?authority, "Key material lookup failed: {}", e);
                Default::default()
            }
        };
        ensure_active(token)?;
        debug!(
            authority = ?authority,
            cached_public_key = cached.public_key.is_some(),
            cached_public_params = cached.public_params.is_some(),
            "Using cached key material"
        );

        on_phase(BuildPhase::Creating);
        let config = InstanceConfig {
            network_config,
            network: connection,
            public_key: cached.public_key,
            public_params: cached.public_params,
        };

        let instance = engine
            .create_instance(config)
            .await
            .map_err(|e| SessionError::instance_construction(e.to_string()))?;
        ensure_active(token)?;

        let public_key = instance.get_public_key();
        let public_params = instance.get_public_params(self.key_store.params_bits());
        if let Err(e) = self
            .key_store
            .set(authority, public_key.as_ref(), public_params.as_ref())
            .await
        {
            warn!(authority = ?authority, "Failed to persist key material: {}", e);
        }
        ensure_active(token)?;

        info!(authority = ?authority, "✅ FHE instance ready");
        on_phase(BuildPhase::Ready);
        Ok(instance)
    }
}
