// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! FHE instance capability
//!
//! The instance is the opaque client-side object able to encrypt inputs and
//! decrypt authorized ciphertext handles for one chain / authority
//! configuration. This crate only manages its lifecycle and feeds it
//! pre-agreed arguments.

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::transaction::eip712::TypedData;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Ephemeral decryption keypair (hex encoded, not the user's wallet key)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

/// Network public key published by the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyMaterial {
    pub id: String,
    pub data: Vec<u8>,
}

/// Public parameters for one security size class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParamsMaterial {
    pub id: String,
    pub data: Vec<u8>,
}

/// Public parameters keyed by security size class (e.g. `2048`)
pub type PublicParamsSet = BTreeMap<u32, PublicParamsMaterial>;

/// Cleartext value submitted for encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum PlainValue {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Uint128(u128),
    Uint256(U256),
    Address(Address),
}

/// Encrypted input ready to be passed to a contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedInput {
    pub handles: Vec<Bytes>,
    pub input_proof: Bytes,
}

/// Decrypted cleartext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClearValue {
    Bool(bool),
    Address(Address),
    Uint(U256),
}

/// Ciphertext handle together with the contract that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleContractPair {
    pub handle: String,
    pub contract_address: Address,
}

/// Everything a user decryption needs besides the handles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptRequest {
    pub private_key: String,
    pub public_key: String,
    pub signature: String,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

#[async_trait]
pub trait FheInstance: Send + Sync {
    async fn create_encrypted_input(
        &self,
        contract_address: Address,
        user_address: Address,
        values: &[PlainValue],
    ) -> Result<EncryptedInput>;

    async fn user_decrypt(
        &self,
        handles: &[HandleContractPair],
        request: &UserDecryptRequest,
    ) -> Result<HashMap<String, ClearValue>>;

    /// Structured signing payload binding the public key, the contract set and
    /// the validity window
    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<TypedData>;

    fn generate_keypair(&self) -> KeyPair;

    fn get_public_key(&self) -> Option<PublicKeyMaterial>;

    fn get_public_params(&self, bits: u32) -> Option<PublicParamsMaterial>;
}
