// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decryption Authorization
//!
//! A user decryption needs a wallet signature over an EIP-712 payload that
//! binds an ephemeral keypair to a contract set for a bounded window. Signing
//! prompts the user, so credentials are cached in a string store and reused
//! until they expire.
//!
//! - **credential**: immutable signed credential and its validity rule
//! - **storage_key**: deterministic storage location
//! - **storage**: string key-value media
//! - **signer**: wallet capability and credential creation
//! - **cache**: load-or-sign
//! - **decrypt**: feeding a credential to an instance

pub mod cache;
pub mod credential;
pub mod decrypt;
pub mod signer;
pub mod storage;
pub mod storage_key;

pub use cache::AuthorizationCache;
pub use credential::AuthorizationCredential;
pub use decrypt::decrypt_handles;
pub use signer::{AuthorizationSigner, UserSigner};
pub use storage::{FileStringStorage, InMemoryStringStorage, StringStorage};
pub use storage_key::{canonical_contracts, AuthorizationStorageKey};
