// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Args;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::authorization::{AuthorizationCache, AuthorizationSigner, FileStringStorage};
use crate::config::chains::DEFAULT_SIMULATED_RPC_URL;
use crate::config::SessionConfig;
use crate::environment::EnvironmentResolver;
use crate::rpc::{Connection, HttpConnector, RpcConnector};
use crate::sdk::SdkBootstrap;
use crate::session::{SessionBuilder, SessionController, SessionStatus};
use crate::simulated::probe_simulated_node;

const DEFAULT_AUTHORIZATION_DIR: &str = ".fhevm/authorizations";

/// Arguments for resolve command
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// RPC endpoint to inspect
    #[arg(long, default_value = DEFAULT_SIMULATED_RPC_URL)]
    pub rpc_url: String,
}

/// Arguments for probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// RPC endpoint of the local node
    #[arg(long, default_value = DEFAULT_SIMULATED_RPC_URL)]
    pub rpc_url: String,
}

/// Arguments for authorize command
#[derive(Args, Debug)]
pub struct AuthorizeArgs {
    /// RPC endpoint to build the session against
    #[arg(long, default_value = DEFAULT_SIMULATED_RPC_URL)]
    pub rpc_url: String,

    /// Comma-separated contract addresses to authorize
    #[arg(long = "contract", value_delimiter = ',', required = true)]
    pub contracts: Vec<String>,

    /// User wallet private key (can also be set via FHEVM_USER_PRIVATE_KEY env var)
    #[arg(long, env = "FHEVM_USER_PRIVATE_KEY")]
    pub private_key: Option<String>,

    /// Directory for stored authorizations (overrides FHEVM_AUTHORIZATION_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,
}

fn load_config() -> Result<SessionConfig> {
    dotenv::dotenv().ok();
    SessionConfig::from_env().map_err(|e| anyhow!("Invalid configuration: {}", e))
}

/// Resolve the environment behind an RPC URL
pub async fn resolve(args: ResolveArgs) -> Result<()> {
    let config = load_config()?;
    let resolver = EnvironmentResolver::new(Arc::new(HttpConnector))
        .with_fallback_rpc_url(config.fallback_rpc_url.clone());

    println!("🔍 Resolving {}...", args.rpc_url);
    let environment = resolver
        .resolve(&Connection::url(args.rpc_url.clone()), &config.simulated_chains)
        .await?;

    println!("  Chain ID:  {}", environment.chain_id);
    println!(
        "  Endpoint:  {}",
        environment.rpc_url.as_deref().unwrap_or("<none>")
    );
    println!(
        "  Kind:      {}",
        if environment.is_simulated {
            "simulated"
        } else {
            "production"
        }
    );
    Ok(())
}

/// Check that a local node speaks the simulated FHE protocol
pub async fn probe(args: ProbeArgs) -> Result<()> {
    let rpc = HttpConnector.connect(&args.rpc_url)?;

    println!("🧪 Probing {}...", args.rpc_url);
    let metadata = probe_simulated_node(rpc.as_ref(), &args.rpc_url).await?;

    println!("✅ Simulated FHE node is running");
    println!("  ACL:            {:?}", metadata.acl_address);
    println!("  Input verifier: {:?}", metadata.input_verifier_address);
    println!("  KMS verifier:   {:?}", metadata.kms_verifier_address);
    Ok(())
}

/// Build a session for the endpoint and load or sign an authorization
pub async fn authorize(args: AuthorizeArgs) -> Result<()> {
    let config = load_config()?;

    let private_key = args.private_key.ok_or_else(|| {
        anyhow!("Private key required. Use --private-key or set FHEVM_USER_PRIVATE_KEY env var")
    })?;
    let wallet = LocalWallet::from_str(private_key.trim_start_matches("0x"))
        .map_err(|e| anyhow!("Invalid private key: {}", e))?;

    let contracts = args
        .contracts
        .iter()
        .map(|c| Address::from_str(c).map_err(|e| anyhow!("Invalid contract address {}: {}", c, e)))
        .collect::<Result<Vec<_>>>()?;

    let builder = SessionBuilder::from_config(&config, Arc::new(HttpConnector), SdkBootstrap::global());
    let session = SessionController::spawn(builder, config.simulated_chains.clone());
    session
        .set_connection(Some(Connection::url(args.rpc_url.clone())), None)
        .await;
    session.enable().await;

    println!("⏳ Building FHE session for {}...", args.rpc_url);
    let snapshot = session.wait_until_settled().await;
    session.shutdown().await;

    let instance = match (snapshot.status, snapshot.instance) {
        (SessionStatus::Ready, Some(instance)) => instance,
        (_, _) => {
            let reason = snapshot
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("session ended in state {}", snapshot.status));
            return Err(anyhow!("FHE session failed: {}", reason));
        }
    };

    let storage_dir = args
        .storage_dir
        .or(config.authorization_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_AUTHORIZATION_DIR));
    info!(dir = %storage_dir.display(), "Using authorization storage");

    let cache = AuthorizationCache::new(Arc::new(FileStringStorage::new(storage_dir)))
        .with_signer(AuthorizationSigner::new(config.authorization_duration_days));

    let credential = cache
        .load_or_sign(instance.as_ref(), &contracts, &wallet, None)
        .await
        .ok_or_else(|| anyhow!("Failed to obtain decryption authorization"))?;

    println!("✅ Decryption authorization ready");
    println!("  User:       {:?}", wallet.address());
    println!("  Contracts:  {}", credential.contract_addresses().len());
    println!(
        "  Valid from: {}",
        chrono::DateTime::from_timestamp(credential.start_timestamp() as i64, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| credential.start_timestamp().to_string())
    );
    println!("  Expires:    {}", credential.expires_at());
    Ok(())
}
