//! Credential Tests
//!
//! Credentials signed against a simulated instance: signature recovery,
//! persisted JSON shape and the validity window.

use crate::common::{simulated_instance, CountingSigner, FakeChain};
use ethers::types::transaction::eip712::Eip712;
use ethers::types::{Address, Signature, H256};
use fhevm_session::authorization::{AuthorizationCredential, AuthorizationSigner};
use fhevm_session::sdk::FheInstance;
use serde_json::Value;
use std::str::FromStr;

async fn signed(start_timestamp: u64, duration_days: u64) -> (AuthorizationCredential, CountingSigner) {
    let instance = simulated_instance(&FakeChain::hardhat(31337)).await;
    let signer = CountingSigner::random();
    let key_pair = instance.generate_keypair();

    let credential = AuthorizationSigner::new(duration_days)
        .create_at(
            &instance,
            &[Address::from_low_u64_be(0xfeed)],
            &key_pair.public_key,
            &key_pair.private_key,
            &signer,
            start_timestamp,
        )
        .await
        .expect("credential is signed");
    (credential, signer)
}

#[tokio::test]
async fn test_signature_recovers_to_wallet() {
    let (credential, signer) = signed(1_800_000_000, 365).await;

    let digest = credential.eip712().encode_eip712().unwrap();
    let signature = Signature::from_str(credential.signature()).unwrap();
    assert_eq!(
        signature.recover(H256::from(digest)).unwrap(),
        signer.wallet_address()
    );
}

#[tokio::test]
async fn test_payload_carries_window_and_key() {
    let (credential, _) = signed(1_800_000_000, 30).await;
    let message = &credential.eip712().message;

    assert_eq!(message["startTimestamp"], Value::from("1800000000"));
    assert_eq!(message["durationDays"], Value::from("30"));
    assert_eq!(
        message["publicKey"],
        Value::from(format!("0x{}", credential.public_key()))
    );
    assert_eq!(credential.eip712().primary_type, "UserDecryptRequestVerification");
}

#[tokio::test]
async fn test_json_round_trip_preserves_credential() {
    let (credential, _) = signed(1_800_000_000, 365).await;

    let json = credential.to_json().unwrap();
    let parsed: Value = serde_json::from_str(&json).unwrap();
    for field in [
        "publicKey",
        "privateKey",
        "signature",
        "contractAddresses",
        "userAddress",
        "startTimestamp",
        "durationDays",
        "eip712",
    ] {
        assert!(parsed.get(field).is_some(), "missing field {}", field);
    }

    let restored = AuthorizationCredential::from_json(&json).unwrap();
    assert_eq!(restored, credential);
}

#[tokio::test]
async fn test_validity_window() {
    let start = 1_800_000_000;
    let (credential, _) = signed(start, 1).await;

    assert_eq!(credential.expires_at(), start + 86_400);
    assert!(credential.is_valid_at(start));
    assert!(credential.is_valid_at(start + 86_399));
    assert!(!credential.is_valid_at(start + 86_400));
}

#[tokio::test]
async fn test_freshly_signed_credential_is_valid() {
    let instance = simulated_instance(&FakeChain::hardhat(31337)).await;
    let signer = CountingSigner::random();
    let key_pair = instance.generate_keypair();

    let credential = AuthorizationSigner::default()
        .create(
            &instance,
            &[Address::from_low_u64_be(0xfeed)],
            &key_pair.public_key,
            &key_pair.private_key,
            &signer,
        )
        .await
        .unwrap();

    assert!(credential.is_valid());
    assert_eq!(credential.duration_days(), 365);
}
