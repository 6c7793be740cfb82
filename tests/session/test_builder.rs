//! Session Builder Tests
//!
//! One build attempt against fake chains and a fake production engine:
//! simulated and production paths, phase reporting, key material caching,
//! cancellation and each failure kind.

use crate::common::{FakeChain, FakeConnector, FakeEngine, FakeLoader, LOCAL_RPC_URL, SEPOLIA_RPC_URL};
use fhevm_session::config::SimulatedChains;
use fhevm_session::environment::EnvironmentResolver;
use fhevm_session::keystore::{KeyMaterialStore, MemoryKeyMaterialMedium};
use fhevm_session::rpc::Connection;
use fhevm_session::sdk::SdkBootstrap;
use fhevm_session::session::{BuildPhase, SessionBuilder};
use fhevm_session::{NetworkConfig, SessionError};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

struct Fixture {
    builder: SessionBuilder,
    loader: Arc<FakeLoader>,
    engine: Arc<FakeEngine>,
    medium: Arc<MemoryKeyMaterialMedium>,
}

fn fixture(connector: Arc<FakeConnector>) -> Fixture {
    let engine = FakeEngine::new();
    let loader = FakeLoader::new(engine.clone());
    let medium = Arc::new(MemoryKeyMaterialMedium::new());
    let bootstrap = Arc::new(SdkBootstrap::new(loader.clone()));

    let resolver = Arc::new(EnvironmentResolver::new(connector.clone()));
    let builder = SessionBuilder::new(
        resolver,
        connector,
        bootstrap,
        KeyMaterialStore::new(medium.clone(), 2048),
    );

    Fixture {
        builder,
        loader,
        engine,
        medium,
    }
}

async fn build_with_phases(
    builder: &SessionBuilder,
    connection: Connection,
    chains: &SimulatedChains,
    token: CancellationToken,
) -> (
    Result<Arc<dyn fhevm_session::FheInstance>, SessionError>,
    Vec<BuildPhase>,
) {
    let phases = Arc::new(Mutex::new(Vec::new()));
    let recorded = phases.clone();
    let result = builder
        .build(connection, chains, token, move |phase| {
            recorded.lock().unwrap().push(phase)
        })
        .await;
    let phases = phases.lock().unwrap().clone();
    (result, phases)
}

#[tokio::test]
async fn test_simulated_build_skips_engine_and_key_store() {
    let connector = FakeConnector::new().add(LOCAL_RPC_URL, FakeChain::hardhat(31337));
    let fx = fixture(connector);

    let (result, phases) = build_with_phases(
        &fx.builder,
        Connection::url(LOCAL_RPC_URL),
        &SimulatedChains::local(),
        CancellationToken::new(),
    )
    .await;

    let instance = result.expect("simulated build should succeed");
    assert!(instance.get_public_key().is_none());
    assert_eq!(phases, vec![BuildPhase::Creating, BuildPhase::Ready]);
    assert_eq!(fx.loader.loads(), 0, "Engine must not be fetched");
    assert_eq!(fx.medium.len().await, 0, "Key store must not be touched");
}

#[tokio::test]
async fn test_simulated_provider_on_reserved_chain_uses_local_endpoint() {
    let local = FakeChain::hardhat(31337);
    let connector = FakeConnector::new().add(LOCAL_RPC_URL, local.clone());
    let fx = fixture(connector);

    // Provider reports the reserved chain id; table is empty
    let wallet_provider = FakeChain::hardhat(31337);
    let (result, _) = build_with_phases(
        &fx.builder,
        Connection::provider(wallet_provider.clone()),
        &SimulatedChains::new(),
        CancellationToken::new(),
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(wallet_provider.call_count("eth_chainId"), 1);
    assert_eq!(local.call_count("web3_clientVersion"), 1);
    assert_eq!(local.call_count("fhevm_relayer_metadata"), 1);
}

#[tokio::test]
async fn test_incompatible_simulated_node_fails_closed() {
    let connector = FakeConnector::new().add(LOCAL_RPC_URL, FakeChain::anvil(31337));
    let fx = fixture(connector);

    let (result, phases) = build_with_phases(
        &fx.builder,
        Connection::url(LOCAL_RPC_URL),
        &SimulatedChains::local(),
        CancellationToken::new(),
    )
    .await;

    match result {
        Err(SessionError::IncompatibleSimulatedNode { rpc_url, .. }) => {
            assert_eq!(rpc_url, LOCAL_RPC_URL)
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("build should fail"),
    }
    assert!(phases.is_empty());
    assert_eq!(fx.loader.loads(), 0);
}

#[tokio::test]
async fn test_production_build_reports_phases_and_caches_material() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let fx = fixture(connector);
    let chains = SimulatedChains::local();

    let (first, phases) = build_with_phases(
        &fx.builder,
        Connection::url(SEPOLIA_RPC_URL),
        &chains,
        CancellationToken::new(),
    )
    .await;
    assert!(first.is_ok());
    assert_eq!(
        phases,
        vec![
            BuildPhase::SdkLoading,
            BuildPhase::SdkInitializing,
            BuildPhase::Creating,
            BuildPhase::Ready
        ]
    );
    assert_eq!(fx.medium.len().await, 2, "Public key and params persisted");
    assert_eq!(fx.engine.cached_key_seen.load(Ordering::SeqCst), 0);

    // Second build: engine already initialized, cached material supplied
    let (second, phases) = build_with_phases(
        &fx.builder,
        Connection::url(SEPOLIA_RPC_URL),
        &chains,
        CancellationToken::new(),
    )
    .await;
    assert!(second.is_ok());
    assert_eq!(
        phases,
        vec![BuildPhase::SdkLoading, BuildPhase::Creating, BuildPhase::Ready]
    );
    assert_eq!(fx.engine.cached_key_seen.load(Ordering::SeqCst), 1);
    assert_eq!(fx.engine.init_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.loader.loads(), 1);
}

#[tokio::test]
async fn test_key_material_is_stored_under_engine_acl() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let fx = fixture(connector);

    let (result, _) = build_with_phases(
        &fx.builder,
        Connection::url(SEPOLIA_RPC_URL),
        &SimulatedChains::local(),
        CancellationToken::new(),
    )
    .await;
    assert!(result.is_ok());

    let store = KeyMaterialStore::new(fx.medium.clone(), 2048);
    let material = store
        .get(NetworkConfig::sepolia().acl_contract_address)
        .await
        .unwrap();
    assert_eq!(material.public_key.unwrap().id, "pk-1");
    assert_eq!(
        material.public_params.unwrap().get(&2048).unwrap().id,
        "crs-2048-1"
    );
}

#[tokio::test]
async fn test_engine_init_failure() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let fx = fixture(connector);
    fx.engine.set_init_ok(false);

    let (result, phases) = build_with_phases(
        &fx.builder,
        Connection::url(SEPOLIA_RPC_URL),
        &SimulatedChains::local(),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(SessionError::EngineInit { .. })));
    assert_eq!(phases, vec![BuildPhase::SdkLoading, BuildPhase::SdkInitializing]);
    assert!(!fx.builder.bootstrap().is_initialized());
}

#[tokio::test]
async fn test_engine_load_failure() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let loader = FakeLoader::failing();
    let resolver = Arc::new(EnvironmentResolver::new(connector.clone()));
    let builder = SessionBuilder::new(
        resolver,
        connector,
        Arc::new(SdkBootstrap::new(loader.clone())),
        KeyMaterialStore::disabled(),
    );

    let (result, _) = build_with_phases(
        &builder,
        Connection::url(SEPOLIA_RPC_URL),
        &SimulatedChains::local(),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(SessionError::EngineLoad { .. })));
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn test_instance_construction_failure_persists_nothing() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let fx = fixture(connector);
    fx.engine.set_fail_create(true);

    let (result, _) = build_with_phases(
        &fx.builder,
        Connection::url(SEPOLIA_RPC_URL),
        &SimulatedChains::local(),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(SessionError::InstanceConstruction { .. })
    ));
    assert_eq!(fx.medium.len().await, 0);
}

#[tokio::test]
async fn test_cancelled_build_has_no_side_effects() {
    let connector = FakeConnector::new().add(SEPOLIA_RPC_URL, FakeChain::production(11155111));
    let fx = fixture(connector);

    let token = CancellationToken::new();
    token.cancel();

    let (result, phases) = build_with_phases(
        &fx.builder,
        Connection::url(SEPOLIA_RPC_URL),
        &SimulatedChains::local(),
        token,
    )
    .await;

    assert!(matches!(result, Err(SessionError::Cancelled)));
    assert!(phases.is_empty());
    assert_eq!(fx.loader.loads(), 0);
    assert_eq!(fx.medium.len().await, 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_resolution_error() {
    let fx = fixture(FakeConnector::new());

    let (result, _) = build_with_phases(
        &fx.builder,
        Connection::url("http://nowhere.invalid"),
        &SimulatedChains::local(),
        CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(SessionError::Resolution { .. })));
}
