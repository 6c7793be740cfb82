// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Error Types
//!
//! Error taxonomy shared by the session builder, the lifecycle controller and
//! the authorization cache.
//!
//! ## Propagation
//!
//! - **Cancelled**: swallowed by the lifecycle controller (expected supersession)
//! - **Signing**: swallowed by the authorization cache into a `None` result
//! - **Storage**: swallowed when persisting key material or credentials
//! - Everything else surfaces as the controller's `Error` state

use thiserror::Error;

/// Result alias used across the crate
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors that can occur while building or using an FHE session
///
/// All variants carry owned strings so the error can be cloned into the
/// published session snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Chain identity or RPC endpoint could not be determined
    #[error("Failed to resolve environment: {reason}")]
    Resolution { reason: String },

    /// Cryptographic engine could not be fetched or loaded
    #[error("Failed to load FHE engine: {reason}")]
    EngineLoad { reason: String },

    /// Engine one-time setup reported failure
    #[error("Failed to initialize FHE engine: {reason}")]
    EngineInit { reason: String },

    /// Engine rejected the instance configuration
    #[error("Failed to create FHE instance: {reason}")]
    InstanceConstruction { reason: String },

    /// Chain is registered as simulated but the node does not speak the
    /// simulated FHE protocol
    #[error("Node at {rpc_url} is not a compatible simulated FHE node: {reason}")]
    IncompatibleSimulatedNode { rpc_url: String, reason: String },

    /// Build was superseded or explicitly cancelled
    #[error("FHE operation was cancelled")]
    Cancelled,

    /// Address lookup, payload construction or wallet signature failed
    #[error("Signing failed during {operation}: {reason}")]
    Signing { operation: String, reason: String },

    /// Persistence medium failed
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration for {field}: {reason}")]
    Config { field: String, reason: String },
}

/// Discriminant of [`SessionError`], useful for matching without payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Resolution,
    EngineLoad,
    EngineInit,
    InstanceConstruction,
    IncompatibleSimulatedNode,
    Cancelled,
    Signing,
    Storage,
    Config,
}

impl SessionError {
    pub fn resolution(reason: impl Into<String>) -> Self {
        SessionError::Resolution {
            reason: reason.into(),
        }
    }

    pub fn engine_load(reason: impl Into<String>) -> Self {
        SessionError::EngineLoad {
            reason: reason.into(),
        }
    }

    pub fn engine_init(reason: impl Into<String>) -> Self {
        SessionError::EngineInit {
            reason: reason.into(),
        }
    }

    pub fn instance_construction(reason: impl Into<String>) -> Self {
        SessionError::InstanceConstruction {
            reason: reason.into(),
        }
    }

    pub fn signing(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        SessionError::Signing {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        SessionError::Storage {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Resolution { .. } => ErrorKind::Resolution,
            SessionError::EngineLoad { .. } => ErrorKind::EngineLoad,
            SessionError::EngineInit { .. } => ErrorKind::EngineInit,
            SessionError::InstanceConstruction { .. } => ErrorKind::InstanceConstruction,
            SessionError::IncompatibleSimulatedNode { .. } => ErrorKind::IncompatibleSimulatedNode,
            SessionError::Cancelled => ErrorKind::Cancelled,
            SessionError::Signing { .. } => ErrorKind::Signing,
            SessionError::Storage { .. } => ErrorKind::Storage,
            SessionError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Cancellation is an expected outcome, never a user-visible failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionError::Cancelled)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Storage {
            reason: format!("json error: {}", err),
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Storage {
            reason: format!("io error: {}", err),
        }
    }
}

impl From<bincode::Error> for SessionError {
    fn from(err: bincode::Error) -> Self {
        SessionError::Storage {
            reason: format!("bincode error: {}", err),
        }
    }
}
