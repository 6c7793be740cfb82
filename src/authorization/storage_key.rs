// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::Address;
use ethers::utils::to_checksum;
use std::fmt;
use tiny_keccak::{Hasher, Keccak};

const STORAGE_KEY_TAG: &str = "fhevm_decryption_signature";

/// `0x`-prefixed Keccak-256 of `data`
fn keccak256_hex(data: &[u8]) -> String {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    format!("0x{}", hex::encode(output))
}

/// Contract set in canonical order (ascending checksummed form)
pub fn canonical_contracts(contract_addresses: &[Address]) -> Vec<Address> {
    let mut contracts: Vec<(String, Address)> = contract_addresses
        .iter()
        .map(|address| (to_checksum(address, None), *address))
        .collect();
    contracts.sort_by(|a, b| a.0.cmp(&b.0));
    contracts.into_iter().map(|(_, address)| address).collect()
}

/// Storage location of a credential
///
/// Deterministic across restarts and independent of the order in which the
/// contracts are supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorizationStorageKey(String);

impl AuthorizationStorageKey {
    pub fn new(
        user_address: Address,
        contract_addresses: &[Address],
        public_key: Option<&str>,
    ) -> Self {
        let joined = canonical_contracts(contract_addresses)
            .iter()
            .map(|address| to_checksum(address, None))
            .collect::<Vec<_>>()
            .join(",");

        let mut components = vec![
            STORAGE_KEY_TAG.to_string(),
            format!("{:?}", user_address).to_lowercase(),
            keccak256_hex(joined.as_bytes()),
        ];
        if let Some(public_key) = public_key {
            components.push(keccak256_hex(public_key.as_bytes()));
        }

        Self(components.join("_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorizationStorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
