// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session lifecycle state machine
//!
//! Pure transition logic: inputs are applied one at a time and the machine
//! answers with the build to start, if any. Running builds, timers and
//! channels live in the controller.
//!
//! ## Invariants
//!
//! - At most one build is in flight.
//! - A build result is accepted only if its generation is the in-flight one
//!   and the identity captured at start still matches.
//! - `Cancelled` never changes state.
//! - `Error` is sticky until refresh, disable or a new connection.

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::builder::BuildPhase;
use crate::error::SessionError;
use crate::rpc::{Connection, ConnectionIdentity};
use crate::sdk::FheInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Ready => "ready",
            SessionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Connection identity plus chain id, captured when a build starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub connection: ConnectionIdentity,
    pub chain_id: Option<u64>,
}

pub enum SessionInput {
    Enable,
    Disable,
    /// `connection: None` means the connection was lost
    ConnectionChanged {
        connection: Option<Connection>,
        chain_id: Option<u64>,
    },
    Refresh,
    BuildPhase {
        generation: u64,
        phase: BuildPhase,
    },
    BuildSucceeded {
        generation: u64,
        instance: Arc<dyn FheInstance>,
    },
    BuildFailed {
        generation: u64,
        error: SessionError,
    },
}

impl fmt::Debug for SessionInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionInput::Enable => f.write_str("Enable"),
            SessionInput::Disable => f.write_str("Disable"),
            SessionInput::ConnectionChanged {
                connection,
                chain_id,
            } => f
                .debug_struct("ConnectionChanged")
                .field("connection", &connection.as_ref().map(|c| c.identity()))
                .field("chain_id", chain_id)
                .finish(),
            SessionInput::Refresh => f.write_str("Refresh"),
            SessionInput::BuildPhase { generation, phase } => f
                .debug_struct("BuildPhase")
                .field("generation", generation)
                .field("phase", phase)
                .finish(),
            SessionInput::BuildSucceeded { generation, .. } => f
                .debug_struct("BuildSucceeded")
                .field("generation", generation)
                .finish(),
            SessionInput::BuildFailed { generation, error } => f
                .debug_struct("BuildFailed")
                .field("generation", generation)
                .field("error", error)
                .finish(),
        }
    }
}

/// Build the controller must start
#[derive(Debug)]
pub struct StartBuild {
    pub generation: u64,
    pub connection: Connection,
    pub token: CancellationToken,
}

/// Immutable view of the session published to observers
#[derive(Clone)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Present iff `status == Ready`
    pub instance: Option<Arc<dyn FheInstance>>,
    /// Present iff `status == Error`
    pub error: Option<SessionError>,
    pub phase: Option<BuildPhase>,
    pub generation: u64,
}

impl SessionSnapshot {
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            instance: None,
            error: None,
            phase: None,
            generation: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("status", &self.status)
            .field("has_instance", &self.instance.is_some())
            .field("error", &self.error)
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .finish()
    }
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
    identity: SessionIdentity,
}

pub struct SessionMachine {
    enabled: bool,
    connection: Option<Connection>,
    chain_id: Option<u64>,
    status: SessionStatus,
    instance: Option<Arc<dyn FheInstance>>,
    error: Option<SessionError>,
    phase: Option<BuildPhase>,
    generation: u64,
    in_flight: Option<InFlight>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            enabled: false,
            connection: None,
            chain_id: None,
            status: SessionStatus::Idle,
            instance: None,
            error: None,
            phase: None,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn has_build_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.connection.as_ref().map(|connection| SessionIdentity {
            connection: connection.identity(),
            chain_id: self.chain_id,
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            instance: self.instance.clone(),
            error: self.error.clone(),
            phase: self.phase,
            generation: self.generation,
        }
    }

    /// Apply one input; returns the build to start, if any
    pub fn handle(&mut self, input: SessionInput) -> Option<StartBuild> {
        match input {
            SessionInput::Enable => {
                self.enabled = true;
                self.try_start()
            }
            SessionInput::Disable => {
                self.enabled = false;
                self.reset();
                None
            }
            SessionInput::ConnectionChanged {
                connection,
                chain_id,
            } => self.on_connection_changed(connection, chain_id),
            SessionInput::Refresh => {
                self.reset();
                None
            }
            SessionInput::BuildPhase { generation, phase } => {
                if self.is_current(generation) {
                    self.phase = Some(phase);
                }
                None
            }
            SessionInput::BuildSucceeded {
                generation,
                instance,
            } => {
                self.on_success(generation, instance);
                None
            }
            SessionInput::BuildFailed { generation, error } => {
                self.on_failure(generation, error);
                None
            }
        }
    }

    fn on_connection_changed(
        &mut self,
        connection: Option<Connection>,
        chain_id: Option<u64>,
    ) -> Option<StartBuild> {
        let Some(connection) = connection else {
            self.reset();
            self.connection = None;
            self.chain_id = None;
            return None;
        };

        let next = SessionIdentity {
            connection: connection.identity(),
            chain_id,
        };

        if self.identity().as_ref() == Some(&next) {
            // Same target: only an idle session reacts
            return self.try_start();
        }

        self.reset();
        self.connection = Some(connection);
        self.chain_id = chain_id;
        self.try_start()
    }

    fn on_success(&mut self, generation: u64, instance: Arc<dyn FheInstance>) {
        let current = self.identity();
        match &self.in_flight {
            Some(build) if build.generation == generation && Some(&build.identity) == current.as_ref() => {
                self.in_flight = None;
                self.status = SessionStatus::Ready;
                self.instance = Some(instance);
                self.error = None;
                self.phase = Some(BuildPhase::Ready);
            }
            _ => debug!(generation, "Discarding stale build result"),
        }
    }

    fn on_failure(&mut self, generation: u64, error: SessionError) {
        if error.is_cancelled() {
            debug!(generation, "Build cancelled");
            return;
        }

        if self.is_current(generation) {
            self.in_flight = None;
            self.status = SessionStatus::Error;
            self.instance = None;
            self.error = Some(error);
            self.phase = None;
        } else {
            debug!(generation, "Discarding stale build failure");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.in_flight
            .as_ref()
            .map(|build| build.generation == generation)
            .unwrap_or(false)
    }

    fn try_start(&mut self) -> Option<StartBuild> {
        if !self.enabled || self.status != SessionStatus::Idle || self.in_flight.is_some() {
            return None;
        }
        let connection = self.connection.clone()?;
        let identity = self.identity()?;

        self.generation += 1;
        let token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            generation: self.generation,
            token: token.clone(),
            identity,
        });
        self.status = SessionStatus::Loading;
        self.phase = None;

        Some(StartBuild {
            generation: self.generation,
            connection,
            token,
        })
    }

    /// Cancel any in-flight build and return to Idle
    fn reset(&mut self) {
        if let Some(build) = self.in_flight.take() {
            build.token.cancel();
        }
        self.status = SessionStatus::Idle;
        self.instance = None;
        self.error = None;
        self.phase = None;
    }
}

impl Drop for SessionMachine {
    fn drop(&mut self) {
        if let Some(build) = self.in_flight.take() {
            build.token.cancel();
        }
    }
}
