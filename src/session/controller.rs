// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Lifecycle Controller
//!
//! Runs a [`SessionMachine`] inside a single actor task. Caller commands,
//! provider notifications and build results all enter the same queue and are
//! applied strictly in arrival order. Observers read [`SessionSnapshot`]s from
//! a `watch` channel.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let handle = SessionController::spawn(builder, SimulatedChains::local());
//! handle
//!     .set_connection(Some(Connection::url("http://localhost:8545")), Some(31337))
//!     .await;
//! handle.enable().await;
//! let snapshot = handle.wait_until_settled().await;
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::builder::SessionBuilder;
use super::machine::{SessionInput, SessionMachine, SessionSnapshot, SessionStatus, StartBuild};
use crate::config::SimulatedChains;
use crate::rpc::{Connection, ProviderEvent};

const CONTROL_CHANNEL_CAPACITY: usize = 64;

enum ControlMessage {
    Input(SessionInput),
    Provider { provider_id: u64, event: ProviderEvent },
    Sync(oneshot::Sender<()>),
    Shutdown,
}

/// Caller-facing handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::Sender<ControlMessage>,
    state_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn enable(&self) {
        self.send(ControlMessage::Input(SessionInput::Enable)).await;
    }

    pub async fn disable(&self) {
        self.send(ControlMessage::Input(SessionInput::Disable)).await;
    }

    /// Report the current connection and chain id. `None` means disconnected.
    pub async fn set_connection(&self, connection: Option<Connection>, chain_id: Option<u64>) {
        self.send(ControlMessage::Input(SessionInput::ConnectionChanged {
            connection,
            chain_id,
        }))
        .await;
    }

    pub async fn refresh(&self) {
        self.send(ControlMessage::Input(SessionInput::Refresh)).await;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_rx.clone()
    }

    /// Wait until every command sent so far has been applied and no build is
    /// pending, then return the resulting snapshot
    pub async fn wait_until_settled(&self) -> SessionSnapshot {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(ControlMessage::Sync(ack_tx)).await;
        if ack_rx.await.is_err() {
            return self.snapshot();
        }

        let mut rx = self.state_rx.clone();
        let settled = rx
            .wait_for(|snapshot| snapshot.status != SessionStatus::Loading)
            .await
            .map(|snapshot| (*snapshot).clone());
        match settled {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    /// Stop the actor, cancelling any in-flight build
    pub async fn shutdown(&self) {
        self.send(ControlMessage::Shutdown).await;
    }

    async fn send(&self, message: ControlMessage) {
        if self.tx.send(message).await.is_err() {
            debug!(session_id = %self.id, "Session actor already stopped");
        }
    }
}

pub struct SessionController {
    id: Uuid,
    machine: SessionMachine,
    builder: SessionBuilder,
    simulated_chains: Arc<SimulatedChains>,
    weak_tx: mpsc::WeakSender<ControlMessage>,
    state_tx: watch::Sender<SessionSnapshot>,
    provider_watch: Option<(u64, JoinHandle<()>)>,
}

impl SessionController {
    /// Spawn the session actor on the current runtime
    pub fn spawn(builder: SessionBuilder, simulated_chains: SimulatedChains) -> SessionHandle {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionSnapshot::idle());

        let controller = SessionController {
            id,
            machine: SessionMachine::new(),
            builder,
            simulated_chains: Arc::new(simulated_chains),
            weak_tx: tx.downgrade(),
            state_tx,
            provider_watch: None,
        };
        tokio::spawn(controller.run(rx));

        info!(session_id = %id, "FHE session controller started");
        SessionHandle { id, tx, state_rx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ControlMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                ControlMessage::Input(input) => self.apply(input),
                ControlMessage::Provider { provider_id, event } => {
                    self.on_provider_event(provider_id, event)
                }
                ControlMessage::Sync(ack) => {
                    let _ = ack.send(());
                }
                ControlMessage::Shutdown => break,
            }
        }

        self.machine.handle(SessionInput::Disable);
        self.publish();
        self.stop_provider_watch();
        info!(session_id = %self.id, "FHE session controller stopped");
    }

    fn apply(&mut self, input: SessionInput) {
        debug!(session_id = %self.id, input = ?input, "Session input");
        let before = self.machine.status();

        if let Some(start) = self.machine.handle(input) {
            self.start_build(start);
        }
        self.sync_provider_watch();
        self.publish();

        let after = self.machine.status();
        if before != after {
            match after {
                SessionStatus::Ready => info!(session_id = %self.id, "✅ FHE session ready"),
                SessionStatus::Error => warn!(
                    session_id = %self.id,
                    error = ?self.machine.snapshot().error,
                    "❌ FHE session failed"
                ),
                _ => debug!(session_id = %self.id, from = %before, to = %after, "Session status changed"),
            }
        }
    }

    fn on_provider_event(&mut self, provider_id: u64, event: ProviderEvent) {
        let current = match self.machine.connection() {
            Some(Connection::Provider(handle)) if handle.id() == provider_id => handle.clone(),
            _ => {
                debug!(session_id = %self.id, provider_id, "Ignoring event from replaced provider");
                return;
            }
        };

        match event {
            ProviderEvent::ChainChanged(chain_id) => {
                info!(session_id = %self.id, chain_id, "🔗 Provider switched chain");
                self.apply(SessionInput::ConnectionChanged {
                    connection: Some(Connection::Provider(current)),
                    chain_id: Some(chain_id),
                });
            }
            ProviderEvent::Disconnected => {
                info!(session_id = %self.id, "Provider disconnected");
                self.apply(SessionInput::ConnectionChanged {
                    connection: None,
                    chain_id: None,
                });
            }
            ProviderEvent::AccountsChanged(accounts) => {
                debug!(session_id = %self.id, count = accounts.len(), "Provider accounts changed");
            }
        }
    }

    fn start_build(&self, start: StartBuild) {
        let Some(tx) = self.weak_tx.upgrade() else {
            return;
        };
        let StartBuild {
            generation,
            connection,
            token,
        } = start;

        info!(
            session_id = %self.id,
            generation,
            connection = %connection.identity(),
            "🚀 Starting FHE session build"
        );

        let builder = self.builder.clone();
        let chains = self.simulated_chains.clone();
        tokio::spawn(async move {
            let phase_tx = tx.clone();
            let result = builder
                .build(connection, &chains, token, move |phase| {
                    // Phase updates are advisory; a full queue drops them
                    let _ = phase_tx.try_send(ControlMessage::Input(SessionInput::BuildPhase {
                        generation,
                        phase,
                    }));
                })
                .await;

            let input = match result {
                Ok(instance) => SessionInput::BuildSucceeded {
                    generation,
                    instance,
                },
                Err(error) => SessionInput::BuildFailed { generation, error },
            };
            let _ = tx.send(ControlMessage::Input(input)).await;
        });
    }

    /// Follow notifications of the current provider connection, if any
    fn sync_provider_watch(&mut self) {
        let wanted = match self.machine.connection() {
            Some(Connection::Provider(handle)) => Some(handle.clone()),
            _ => None,
        };

        let watched = self.provider_watch.as_ref().map(|(id, _)| *id);
        if watched == wanted.as_ref().map(|h| h.id()) {
            return;
        }
        self.stop_provider_watch();

        let Some(handle) = wanted else {
            return;
        };
        let provider_id = handle.id();
        let mut events = handle.subscribe();
        let weak_tx = self.weak_tx.clone();
        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(provider_id, skipped, "Provider event stream lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let Some(tx) = weak_tx.upgrade() else {
                    break;
                };
                if tx
                    .send(ControlMessage::Provider { provider_id, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        self.provider_watch = Some((provider_id, task));
    }

    fn stop_provider_watch(&mut self) {
        if let Some((_, task)) = self.provider_watch.take() {
            task.abort();
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.machine.snapshot());
    }
}
