//! Engine Bootstrap Tests
//!
//! Sessions sharing one bootstrap fetch and initialize the engine at most
//! once between them.

use crate::common::{FakeChain, FakeConnector, FakeEngine, FakeLoader, SEPOLIA_RPC_URL};
use fhevm_session::config::SimulatedChains;
use fhevm_session::environment::EnvironmentResolver;
use fhevm_session::keystore::KeyMaterialStore;
use fhevm_session::rpc::Connection;
use fhevm_session::sdk::SdkBootstrap;
use fhevm_session::session::SessionBuilder;
use fhevm_session::SessionError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn builder(connector: &Arc<FakeConnector>, bootstrap: &Arc<SdkBootstrap>) -> SessionBuilder {
    SessionBuilder::new(
        Arc::new(EnvironmentResolver::new(connector.clone())),
        connector.clone(),
        bootstrap.clone(),
        KeyMaterialStore::disabled(),
    )
}

#[tokio::test]
async fn test_two_sessions_share_bootstrap() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let engine = FakeEngine::new();
    let loader = FakeLoader::new(engine.clone());
    let bootstrap = Arc::new(SdkBootstrap::new(loader.clone()));

    let first = builder(&connector, &bootstrap);
    let second = builder(&connector, &bootstrap);
    let chains = SimulatedChains::local();

    let (a, b) = tokio::join!(
        first.build(
            Connection::url(SEPOLIA_RPC_URL),
            &chains,
            CancellationToken::new(),
            |_| {}
        ),
        second.build(
            Connection::url(SEPOLIA_RPC_URL),
            &chains,
            CancellationToken::new(),
            |_| {}
        ),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(loader.loads(), 1);
    assert_eq!(engine.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.creates(), 2);
}

#[tokio::test]
async fn test_failed_load_in_one_session_is_retried_by_the_next() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let engine = FakeEngine::new();
    let loader = FakeLoader::new(engine.clone());
    let bootstrap = Arc::new(SdkBootstrap::new(loader.clone()));
    let chains = SimulatedChains::local();

    loader.set_fail(true);
    let failed = builder(&connector, &bootstrap)
        .build(
            Connection::url(SEPOLIA_RPC_URL),
            &chains,
            CancellationToken::new(),
            |_| {},
        )
        .await;
    assert!(matches!(failed, Err(SessionError::EngineLoad { .. })));
    assert!(!bootstrap.is_loaded());

    loader.set_fail(false);
    let ready = builder(&connector, &bootstrap)
        .build(
            Connection::url(SEPOLIA_RPC_URL),
            &chains,
            CancellationToken::new(),
            |_| {},
        )
        .await;
    assert!(ready.is_ok());
    assert_eq!(loader.loads(), 2);
    assert_eq!(engine.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.creates(), 1);
}
