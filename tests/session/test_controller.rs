//! Session Controller Tests
//!
//! Lifecycle scenarios driven through `SessionHandle`: readiness, disable
//! during a build, sticky failures, deduplicated enables and superseding
//! connection changes.

use crate::common::{
    settle, wait_for, FakeEngine, FakeInstance, SessionHarness, LOCAL_RPC_URL, SEPOLIA_RPC_URL,
};
use fhevm_session::error::ErrorKind;
use fhevm_session::rpc::Connection;
use fhevm_session::session::{BuildPhase, SessionStatus};
use std::time::Duration;

#[tokio::test]
async fn test_new_session_is_idle() {
    let harness = SessionHarness::start(FakeEngine::new());
    let snapshot = harness.session.snapshot();

    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.instance.is_none());
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_enable_without_connection_stays_idle() {
    let harness = SessionHarness::start(FakeEngine::new());
    harness.session.enable().await;

    let snapshot = settle(&harness.session).await;
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert_eq!(harness.engine.creates(), 0);
}

#[tokio::test]
async fn test_simulated_session_becomes_ready() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(LOCAL_RPC_URL)), Some(31337))
        .await;
    session.enable().await;

    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(snapshot.phase, Some(BuildPhase::Ready));
    assert_eq!(snapshot.generation, 1);
    assert!(snapshot.error.is_none());

    let instance = snapshot.instance.expect("ready session carries an instance");
    assert!(instance.get_public_key().is_none());
    assert_eq!(harness.loader.loads(), 0);
    assert_eq!(harness.local.call_count("web3_clientVersion"), 1);
}

#[tokio::test]
async fn test_production_session_becomes_ready() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;

    let snapshot = settle(session).await;
    assert!(snapshot.is_ready());
    let instance = snapshot.instance.unwrap();
    assert_eq!(FakeInstance::label_of(&instance).as_deref(), Some("pk-1"));
    assert_eq!(harness.medium.len().await, 2);
}

#[tokio::test]
async fn test_disable_during_build_discards_late_result() {
    let (harness, gate) = SessionHarness::gated();
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;
    assert!(harness.wait_for_creates(1).await);
    assert_eq!(session.snapshot().status, SessionStatus::Loading);

    session.disable().await;
    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Idle);

    // Let the abandoned build finish
    gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.instance.is_none());
    assert!(snapshot.error.is_none());
    assert_eq!(
        harness.medium.len().await,
        0,
        "Cancelled build must not persist key material"
    );
}

#[tokio::test]
async fn test_failure_is_sticky_until_refresh() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = &harness.session;
    harness.loader.set_fail(true);

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;

    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Error);
    let error = snapshot.error.expect("error state carries the failure");
    assert_eq!(error.kind(), ErrorKind::EngineLoad);
    assert!(!error.to_string().is_empty());
    assert!(snapshot.instance.is_none());

    // No automatic retry
    harness.loader.set_fail(false);
    session.enable().await;
    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(harness.loader.loads(), 1);

    session.refresh().await;
    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Idle);

    session.enable().await;
    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert_eq!(harness.loader.loads(), 2);
}

#[tokio::test]
async fn test_repeated_enable_starts_one_build() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;
    session.enable().await;
    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;

    let snapshot = settle(session).await;
    assert!(snapshot.is_ready());
    assert_eq!(snapshot.generation, 1);
    assert_eq!(harness.engine.creates(), 1);
}

#[tokio::test]
async fn test_ready_session_ignores_same_connection() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;
    let first = settle(session).await;

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    let second = settle(session).await;

    assert!(second.is_ready());
    assert_eq!(second.generation, first.generation);
    assert_eq!(harness.engine.creates(), 1);
}

#[tokio::test]
async fn test_chain_change_supersedes_in_flight_build() {
    let (harness, gate) = SessionHarness::gated();
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;
    assert!(harness.wait_for_creates(1).await);

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(1))
        .await;
    assert!(harness.wait_for_creates(2).await);

    gate.add_permits(2);
    let snapshot = settle(session).await;

    assert!(snapshot.is_ready());
    assert_eq!(snapshot.generation, 2);
    let instance = snapshot.instance.unwrap();
    assert_eq!(FakeInstance::label_of(&instance).as_deref(), Some("pk-2"));
}

#[tokio::test]
async fn test_disconnect_returns_to_idle() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(LOCAL_RPC_URL)), Some(31337))
        .await;
    session.enable().await;
    assert!(settle(session).await.is_ready());

    session.set_connection(None, None).await;
    let snapshot = settle(session).await;
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.instance.is_none());
}

#[tokio::test]
async fn test_refresh_rebuilds_fresh_instance() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = &harness.session;

    session
        .set_connection(Some(Connection::url(SEPOLIA_RPC_URL)), Some(11155111))
        .await;
    session.enable().await;
    let first = settle(session).await.instance.unwrap();

    session.refresh().await;
    session.enable().await;
    let second = settle(session).await.instance.unwrap();

    assert_eq!(FakeInstance::label_of(&first).as_deref(), Some("pk-1"));
    assert_eq!(FakeInstance::label_of(&second).as_deref(), Some("pk-2"));
}

#[tokio::test]
async fn test_shutdown_publishes_idle() {
    let harness = SessionHarness::start(FakeEngine::new());
    let session = harness.session.clone();

    session
        .set_connection(Some(Connection::url(LOCAL_RPC_URL)), Some(31337))
        .await;
    session.enable().await;
    assert!(settle(&session).await.is_ready());

    session.shutdown().await;
    let observer = session.clone();
    assert!(
        wait_for(
            move || observer.snapshot().status == SessionStatus::Idle,
            Duration::from_secs(5)
        )
        .await
    );
}
