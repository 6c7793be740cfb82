// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! FHEVM session lifecycle manager and decryption authorization cache
//!
//! Turns a chain connection into a ready FHE instance (local simulated node
//! or production engine), keeps that instance consistent with the active
//! connection, and caches the signed authorizations needed for user
//! decryption.

pub mod authorization;
pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod keystore;
pub mod rpc;
pub mod sdk;
pub mod session;
pub mod simulated;
pub mod version;

pub use authorization::{
    decrypt_handles, AuthorizationCache, AuthorizationCredential, AuthorizationSigner,
    AuthorizationStorageKey, FileStringStorage, InMemoryStringStorage, StringStorage, UserSigner,
};
pub use config::{NetworkConfig, SessionConfig, SimulatedChains};
pub use environment::{EnvironmentResolver, ResolvedEnvironment};
pub use error::{ErrorKind, SessionError, SessionResult};
pub use keystore::{
    FileKeyMaterialMedium, KeyMaterial, KeyMaterialMedium, KeyMaterialStore,
    MemoryKeyMaterialMedium,
};
pub use rpc::{
    Connection, ConnectionHandle, HttpConnector, JsonRpc, ProviderEvent, ProviderHandle,
    RpcConnector,
};
pub use sdk::{CryptoEngine, EngineLoader, FheInstance, SdkBootstrap};
pub use session::{
    BuildPhase, SessionBuilder, SessionController, SessionHandle, SessionSnapshot, SessionStatus,
};
pub use simulated::{probe_simulated_node, SimulatedInstance, SimulatedMetadata};
