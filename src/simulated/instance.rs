// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local FHE instance backed by a simulated node
//!
//! Signing payloads are real EIP-712 documents identical in shape to the
//! production ones, and user signatures are verified locally before any
//! cleartext is requested from the node.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::transaction::eip712::{Eip712, TypedData};
use ethers::types::{Address, Signature, H256, U256};
use futures::future::try_join_all;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::SimulatedMetadata;
use crate::config::chains::{simulated_verifying_contract_decryption, GATEWAY_CHAIN_ID};
use crate::rpc::JsonRpc;
use crate::sdk::{
    ClearValue, EncryptedInput, FheInstance, HandleContractPair, KeyPair, PlainValue,
    PublicKeyMaterial, PublicParamsMaterial, UserDecryptRequest,
};

pub const CLEAR_TEXT_RPC_METHOD: &str = "fhevm_getClearText";
pub const CREATE_ENCRYPTED_INPUT_RPC_METHOD: &str = "fhevm_createEncryptedInput";

const DECRYPTION_DOMAIN_NAME: &str = "Decryption";
const DECRYPTION_DOMAIN_VERSION: &str = "1";
const USER_DECRYPT_PRIMARY_TYPE: &str = "UserDecryptRequestVerification";
const SECONDS_PER_DAY: u64 = 86_400;

pub struct SimulatedInstance {
    rpc: Arc<dyn JsonRpc>,
    chain_id: u64,
    metadata: SimulatedMetadata,
}

impl SimulatedInstance {
    pub fn new(rpc: Arc<dyn JsonRpc>, chain_id: u64, metadata: SimulatedMetadata) -> Self {
        Self {
            rpc,
            chain_id,
            metadata,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn metadata(&self) -> &SimulatedMetadata {
        &self.metadata
    }

    fn check_request(
        &self,
        handles: &[HandleContractPair],
        request: &UserDecryptRequest,
    ) -> Result<()> {
        for pair in handles {
            if !request.contract_addresses.contains(&pair.contract_address) {
                return Err(anyhow!(
                    "Contract {:?} is not covered by the decryption signature",
                    pair.contract_address
                ));
            }
        }

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let expiry = request
            .start_timestamp
            .saturating_add(request.duration_days.saturating_mul(SECONDS_PER_DAY));
        if now >= expiry {
            return Err(anyhow!("Decryption signature expired at {}", expiry));
        }

        let typed_data = self.create_eip712(
            &request.public_key,
            &request.contract_addresses,
            request.start_timestamp,
            request.duration_days,
        )?;
        let digest = typed_data
            .encode_eip712()
            .map_err(|e| anyhow!("Failed to hash EIP-712 payload: {}", e))?;

        let signature = Signature::from_str(&request.signature)
            .map_err(|e| anyhow!("Invalid signature: {}", e))?;
        let signer = signature
            .recover(H256::from(digest))
            .map_err(|e| anyhow!("Signature recovery failed: {}", e))?;

        if signer != request.user_address {
            return Err(anyhow!(
                "Signature was produced by {:?}, expected {:?}",
                signer,
                request.user_address
            ));
        }
        Ok(())
    }
}

fn with_hex_prefix(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{}", value)
    }
}

/// Decode a cleartext returned by the node
fn parse_clear_value(value: Value) -> Result<ClearValue> {
    match value {
        Value::Bool(b) => Ok(ClearValue::Bool(b)),
        Value::Number(n) => n
            .as_u64()
            .map(|v| ClearValue::Uint(U256::from(v)))
            .ok_or_else(|| anyhow!("Unsupported clear text number {}", n)),
        Value::String(s) => {
            if s.len() == 42 && s.starts_with("0x") {
                if let Ok(address) = s.parse::<Address>() {
                    return Ok(ClearValue::Address(address));
                }
            }
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => U256::from_str_radix(hex, 16)
                    .map_err(|e| anyhow!("Invalid clear text '{}': {:?}", s, e)),
                None => U256::from_dec_str(&s)
                    .map_err(|e| anyhow!("Invalid clear text '{}': {:?}", s, e)),
            };
            parsed.map(ClearValue::Uint)
        }
        other => Err(anyhow!("Unexpected clear text value {}", other)),
    }
}

#[async_trait]
impl FheInstance for SimulatedInstance {
    async fn create_encrypted_input(
        &self,
        contract_address: Address,
        user_address: Address,
        values: &[PlainValue],
    ) -> Result<EncryptedInput> {
        let params = json!([{
            "contractAddress": contract_address,
            "userAddress": user_address,
            "values": values,
        }]);
        let response = self
            .rpc
            .request(CREATE_ENCRYPTED_INPUT_RPC_METHOD, params)
            .await?;
        let input: EncryptedInput = serde_json::from_value(response)
            .map_err(|e| anyhow!("Malformed encrypted input response: {}", e))?;

        if input.handles.len() != values.len() {
            return Err(anyhow!(
                "Node returned {} handles for {} values",
                input.handles.len(),
                values.len()
            ));
        }
        Ok(input)
    }

    async fn user_decrypt(
        &self,
        handles: &[HandleContractPair],
        request: &UserDecryptRequest,
    ) -> Result<HashMap<String, ClearValue>> {
        self.check_request(handles, request)?;

        let decrypted = try_join_all(handles.iter().map(|pair| async move {
            let value = self
                .rpc
                .request(CLEAR_TEXT_RPC_METHOD, json!([pair.handle]))
                .await?;
            Ok::<_, anyhow::Error>((pair.handle.clone(), parse_clear_value(value)?))
        }))
        .await?;

        let results: HashMap<String, ClearValue> = decrypted.into_iter().collect();
        debug!(count = results.len(), "Decrypted handles on simulated node");
        Ok(results)
    }

    fn create_eip712(
        &self,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Result<TypedData> {
        if contract_addresses.is_empty() {
            return Err(anyhow!("At least one contract address is required"));
        }

        let payload = json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                USER_DECRYPT_PRIMARY_TYPE: [
                    { "name": "publicKey", "type": "bytes" },
                    { "name": "contractAddresses", "type": "address[]" },
                    { "name": "startTimestamp", "type": "uint256" },
                    { "name": "durationDays", "type": "uint256" },
                    { "name": "extraData", "type": "bytes" }
                ]
            },
            "primaryType": USER_DECRYPT_PRIMARY_TYPE,
            "domain": {
                "name": DECRYPTION_DOMAIN_NAME,
                "version": DECRYPTION_DOMAIN_VERSION,
                "chainId": GATEWAY_CHAIN_ID,
                "verifyingContract": simulated_verifying_contract_decryption()
            },
            "message": {
                "publicKey": with_hex_prefix(public_key),
                "contractAddresses": contract_addresses,
                "startTimestamp": start_timestamp.to_string(),
                "durationDays": duration_days.to_string(),
                "extraData": "0x00"
            }
        });

        serde_json::from_value(payload).map_err(|e| anyhow!("Failed to build EIP-712 payload: {}", e))
    }

    fn generate_keypair(&self) -> KeyPair {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = signing_key.verifying_key().to_encoded_point(false);
        KeyPair {
            public_key: hex::encode(public_key.as_bytes()),
            private_key: hex::encode(signing_key.to_bytes()),
        }
    }

    fn get_public_key(&self) -> Option<PublicKeyMaterial> {
        None
    }

    fn get_public_params(&self, _bits: u32) -> Option<PublicParamsMaterial> {
        None
    }
}
