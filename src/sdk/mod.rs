// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! FHE Engine Integration
//!
//! - **instance**: the opaque FHE instance capability and its value types
//! - **engine**: engine, loader and factory seams plus the HTTP loader
//! - **bootstrap**: process-scoped load/init state

pub mod bootstrap;
pub mod engine;
pub mod instance;

pub use bootstrap::SdkBootstrap;
pub use engine::{
    CryptoEngine, EngineFactory, EngineLoader, InitOptions, InstanceConfig, RemoteEngineLoader,
};
pub use instance::{
    ClearValue, EncryptedInput, FheInstance, HandleContractPair, KeyPair, PlainValue,
    PublicKeyMaterial, PublicParamsMaterial, PublicParamsSet, UserDecryptRequest,
};
