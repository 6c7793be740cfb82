// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Simulated (local development) node support
//!
//! A simulated chain is a local development node that ships its own FHE
//! mock. Before a session is built against one, the node is probed: it must
//! identify itself as a Hardhat node and publish relayer metadata.

pub mod instance;

pub use instance::SimulatedInstance;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::rpc::{JsonRpc, FHEVM_RELAYER_METADATA_RPC_METHOD, WEB3_CLIENT_VERSION_RPC_METHOD};

const SIMULATED_CLIENT_MARKER: &str = "hardhat";

/// Contract addresses published by a simulated node's FHE plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedMetadata {
    #[serde(rename = "ACLAddress")]
    pub acl_address: Address,
    #[serde(rename = "InputVerifierAddress")]
    pub input_verifier_address: Address,
    #[serde(rename = "KMSVerifierAddress")]
    pub kms_verifier_address: Address,
}

/// Check that `rpc` is a compatible simulated node and return its metadata
///
/// Fails closed: anything other than a Hardhat client reporting complete
/// metadata yields [`SessionError::IncompatibleSimulatedNode`].
pub async fn probe_simulated_node(
    rpc: &dyn JsonRpc,
    rpc_url: &str,
) -> SessionResult<SimulatedMetadata> {
    let incompatible = |reason: String| {
        warn!(rpc_url = %rpc_url, "Simulated node rejected: {}", reason);
        SessionError::IncompatibleSimulatedNode {
            rpc_url: rpc_url.to_string(),
            reason,
        }
    };

    let version = rpc
        .request(WEB3_CLIENT_VERSION_RPC_METHOD, Value::Array(vec![]))
        .await
        .map_err(|e| incompatible(format!("client version query failed: {}", e)))?;

    let version = version
        .as_str()
        .ok_or_else(|| incompatible(format!("unexpected client version {}", version)))?;
    debug!(client_version = %version, "Simulated node client version");

    if !version.to_lowercase().contains(SIMULATED_CLIENT_MARKER) {
        return Err(incompatible(format!(
            "client '{}' is not a Hardhat node",
            version
        )));
    }

    let metadata = rpc
        .request(FHEVM_RELAYER_METADATA_RPC_METHOD, Value::Array(vec![]))
        .await
        .map_err(|e| incompatible(format!("relayer metadata query failed: {}", e)))?;

    let metadata: SimulatedMetadata = serde_json::from_value(metadata)
        .map_err(|e| incompatible(format!("malformed relayer metadata: {}", e)))?;

    info!(
        rpc_url = %rpc_url,
        acl = ?metadata.acl_address,
        "🧪 Simulated FHE node detected"
    );
    Ok(metadata)
}
