// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tracing::debug;

use super::credential::AuthorizationCredential;
use crate::sdk::{ClearValue, FheInstance, HandleContractPair, UserDecryptRequest};

impl UserDecryptRequest {
    pub fn from_credential(credential: &AuthorizationCredential) -> Self {
        Self {
            private_key: credential.private_key().to_string(),
            public_key: credential.public_key().to_string(),
            signature: credential.signature().to_string(),
            contract_addresses: credential.contract_addresses().to_vec(),
            user_address: credential.user_address(),
            start_timestamp: credential.start_timestamp(),
            duration_days: credential.duration_days(),
        }
    }
}

/// Decrypt `handles` with the rights granted by `credential`
pub async fn decrypt_handles(
    instance: &dyn FheInstance,
    credential: &AuthorizationCredential,
    handles: &[HandleContractPair],
) -> Result<HashMap<String, ClearValue>> {
    if !credential.is_valid() {
        return Err(anyhow!(
            "Decryption authorization expired at {}",
            credential.expires_at()
        ));
    }
    if handles.is_empty() {
        return Ok(HashMap::new());
    }

    let request = UserDecryptRequest::from_credential(credential);
    debug!(count = handles.len(), user = ?request.user_address, "Requesting user decryption");
    instance.user_decrypt(handles, &request).await
}
