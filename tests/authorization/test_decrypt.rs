//! User Decryption Tests
//!
//! Feeding cached credentials to a simulated instance.

use crate::common::{simulated_instance, CountingSigner, FakeChain};
use ethers::types::{Address, U256};
use fhevm_session::authorization::{decrypt_handles, AuthorizationCache, InMemoryStringStorage};
use fhevm_session::sdk::{ClearValue, HandleContractPair};
use serde_json::json;
use std::sync::Arc;

const BALANCE_HANDLE: &str = "0x01aa";
const FLAG_HANDLE: &str = "0x02bb";
const OWNER_HANDLE: &str = "0x03cc";

fn token_contract() -> Address {
    Address::from_low_u64_be(0x70cc)
}

fn pair(handle: &str, contract_address: Address) -> HandleContractPair {
    HandleContractPair {
        handle: handle.to_string(),
        contract_address,
    }
}

#[tokio::test]
async fn test_decrypt_with_cached_credential() {
    let chain = FakeChain::hardhat(31337);
    chain.set_clear_value(BALANCE_HANDLE, json!("0x2a"));
    chain.set_clear_value(FLAG_HANDLE, json!(true));
    chain.set_clear_value(OWNER_HANDLE, json!("0x2546BcD3c84621e976D8185a91A922aE77ECEc30"));

    let instance = simulated_instance(&chain).await;
    let signer = CountingSigner::random();
    let credential = AuthorizationCache::new(Arc::new(InMemoryStringStorage::new()))
        .load_or_sign(&instance, &[token_contract()], &signer, None)
        .await
        .unwrap();

    let values = decrypt_handles(
        &instance,
        &credential,
        &[
            pair(BALANCE_HANDLE, token_contract()),
            pair(FLAG_HANDLE, token_contract()),
            pair(OWNER_HANDLE, token_contract()),
        ],
    )
    .await
    .unwrap();

    assert_eq!(values[BALANCE_HANDLE], ClearValue::Uint(U256::from(42)));
    assert_eq!(values[FLAG_HANDLE], ClearValue::Bool(true));
    assert_eq!(
        values[OWNER_HANDLE],
        ClearValue::Address(
            "0x2546BcD3c84621e976D8185a91A922aE77ECEc30"
                .parse()
                .unwrap()
        )
    );
    assert_eq!(chain.call_count("fhevm_getClearText"), 3);
}

#[tokio::test]
async fn test_uncovered_contract_is_rejected() {
    let chain = FakeChain::hardhat(31337);
    chain.set_clear_value(BALANCE_HANDLE, json!(7));

    let instance = simulated_instance(&chain).await;
    let signer = CountingSigner::random();
    let credential = AuthorizationCache::new(Arc::new(InMemoryStringStorage::new()))
        .load_or_sign(&instance, &[token_contract()], &signer, None)
        .await
        .unwrap();

    let result = decrypt_handles(
        &instance,
        &credential,
        &[pair(BALANCE_HANDLE, Address::from_low_u64_be(0xbad))],
    )
    .await;

    assert!(result.is_err());
    assert_eq!(chain.call_count("fhevm_getClearText"), 0);
}

#[tokio::test]
async fn test_no_handles_needs_no_round_trip() {
    let chain = FakeChain::hardhat(31337);
    let instance = simulated_instance(&chain).await;
    let signer = CountingSigner::random();
    let credential = AuthorizationCache::new(Arc::new(InMemoryStringStorage::new()))
        .load_or_sign(&instance, &[token_contract()], &signer, None)
        .await
        .unwrap();

    let values = decrypt_handles(&instance, &credential, &[]).await.unwrap();
    assert!(values.is_empty());
    assert_eq!(chain.call_count("fhevm_getClearText"), 0);
}
