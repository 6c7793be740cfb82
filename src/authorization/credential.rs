// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ethers::types::transaction::eip712::TypedData;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::SessionResult;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Signed decryption authorization
///
/// Binds an ephemeral keypair to a user and a contract set for a bounded
/// window. Immutable once created; serialized as camelCase JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationCredential {
    pub(super) public_key: String,
    pub(super) private_key: String,
    pub(super) signature: String,
    pub(super) contract_addresses: Vec<Address>,
    pub(super) user_address: Address,
    pub(super) start_timestamp: u64,
    pub(super) duration_days: u64,
    pub(super) eip712: TypedData,
}

impl AuthorizationCredential {
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn contract_addresses(&self) -> &[Address] {
        &self.contract_addresses
    }

    pub fn user_address(&self) -> Address {
        self.user_address
    }

    pub fn start_timestamp(&self) -> u64 {
        self.start_timestamp
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    pub fn eip712(&self) -> &TypedData {
        &self.eip712
    }

    /// Unix timestamp at which the credential stops being valid
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(unix_now())
    }

    /// Valid strictly before expiry; at the exact expiry second it is not
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at()
    }

    pub fn to_json(&self) -> SessionResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SessionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
