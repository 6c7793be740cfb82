// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::SessionError;

/// Chain id reserved for the local simulated FHE node
pub const SIMULATED_CHAIN_ID: u64 = 31337;

/// Default endpoint of a local simulated node
pub const DEFAULT_SIMULATED_RPC_URL: &str = "http://localhost:8545";

/// Chain id of the decryption gateway used by both production and simulated deployments
pub const GATEWAY_CHAIN_ID: u64 = 55815;

/// Known simulated-environment endpoints, keyed by chain id
///
/// Supplied once when the session controller is constructed. An empty table
/// falls back to treating only [`SIMULATED_CHAIN_ID`] as simulated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedChains {
    endpoints: BTreeMap<u64, String>,
}

impl SimulatedChains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the local hardhat node registered
    pub fn local() -> Self {
        let mut chains = Self::new();
        chains.insert(SIMULATED_CHAIN_ID, DEFAULT_SIMULATED_RPC_URL);
        chains
    }

    pub fn insert(&mut self, chain_id: u64, rpc_url: impl Into<String>) {
        self.endpoints.insert(chain_id, rpc_url.into());
    }

    pub fn with(mut self, chain_id: u64, rpc_url: impl Into<String>) -> Self {
        self.insert(chain_id, rpc_url);
        self
    }

    pub fn endpoint(&self, chain_id: u64) -> Option<&str> {
        self.endpoints.get(&chain_id).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether `chain_id` belongs to a simulated environment
    pub fn is_simulated(&self, chain_id: u64) -> bool {
        if self.endpoints.is_empty() {
            chain_id == SIMULATED_CHAIN_ID
        } else {
            self.endpoints.contains_key(&chain_id)
        }
    }

    /// Parse `id=url,id=url` (the `FHEVM_SIMULATED_CHAINS` format)
    pub fn parse(entries: &str) -> Result<Self, SessionError> {
        let mut chains = Self::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, url) = entry.split_once('=').ok_or_else(|| SessionError::Config {
                field: "simulated_chains".to_string(),
                reason: format!("expected <chain_id>=<rpc_url>, got '{}'", entry),
            })?;
            let chain_id = id.trim().parse::<u64>().map_err(|e| SessionError::Config {
                field: "simulated_chains".to_string(),
                reason: format!("invalid chain id '{}': {}", id, e),
            })?;
            chains.insert(chain_id, url.trim());
        }
        Ok(chains)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.endpoints.iter().map(|(id, url)| (*id, url.as_str()))
    }
}

/// Contract addresses and endpoints of a production FHE deployment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub acl_contract_address: Address,
    pub kms_contract_address: Address,
    pub input_verifier_contract_address: Address,
    pub verifying_contract_address_decryption: Address,
    pub verifying_contract_address_input_verification: Address,
    pub chain_id: u64,
    pub gateway_chain_id: u64,
    pub network: String,
    pub relayer_url: String,
}

impl NetworkConfig {
    /// Sepolia testnet deployment
    pub fn sepolia() -> Self {
        NetworkConfig {
            acl_contract_address: parse_const_address("0x687820221192C5B662b25367F70076A37bc79b6c"),
            kms_contract_address: parse_const_address("0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC"),
            input_verifier_contract_address: parse_const_address(
                "0xbc91f3daD1A5F19F8390c400196e58073B6a0BC4",
            ),
            verifying_contract_address_decryption: parse_const_address(
                "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1",
            ),
            verifying_contract_address_input_verification: parse_const_address(
                "0x7048C39f048125eDa9d678AEbaDfB22F7900a29F",
            ),
            chain_id: 11155111,
            gateway_chain_id: GATEWAY_CHAIN_ID,
            network: std::env::var("SEPOLIA_RPC_URL")
                .unwrap_or_else(|_| "https://eth-sepolia.public.blastapi.io".to_string()),
            relayer_url: std::env::var("FHEVM_RELAYER_URL")
                .unwrap_or_else(|_| "https://relayer.testnet.zama.cloud".to_string()),
        }
    }
}

/// Verifying contracts used by the local simulated node
///
/// The hardhat plugin deploys these at fixed addresses; they are not part of
/// the relayer metadata the node reports.
pub fn simulated_verifying_contract_decryption() -> Address {
    parse_const_address("0x5ffdaAB0373E62E2ea2944776209aEf29E631A64")
}

pub fn simulated_verifying_contract_input_verification() -> Address {
    parse_const_address("0x812b06e1CDCE800494b79fFE4f925A504a9A9810")
}

fn parse_const_address(s: &str) -> Address {
    Address::from_str(s).unwrap_or_else(|_| Address::zero())
}
