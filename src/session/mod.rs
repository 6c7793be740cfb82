// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! FHE session lifecycle
//!
//! - **builder**: one attempt at producing a ready instance
//! - **machine**: pure lifecycle state machine
//! - **controller**: actor task driving the machine and running builds

pub mod builder;
pub mod controller;
pub mod machine;

pub use builder::{BuildPhase, SessionBuilder};
pub use controller::{SessionController, SessionHandle};
pub use machine::{
    SessionIdentity, SessionInput, SessionMachine, SessionSnapshot, SessionStatus, StartBuild,
};
