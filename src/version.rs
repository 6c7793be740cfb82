// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the FHE session manager

/// Full version string with feature description
pub const VERSION: &str = "v0.3.0-provider-events-2026-10-12";

/// Semantic version number
pub const VERSION_NUMBER: &str = "0.3.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 0;

/// Minor version number
pub const VERSION_MINOR: u32 = 3;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Build date
pub const BUILD_DATE: &str = "2026-10-12";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "simulated-chains",
    "simulated-node-probe",
    "sdk-bootstrap-dedupe",
    "key-material-cache",
    "session-state-machine",
    "stale-build-discard",
    "provider-events",
    "decryption-authorization-cache",
    "eip712-user-decrypt",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("FHEVM Session {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info as JSON
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
