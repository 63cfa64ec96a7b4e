// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Key parsing, payload hashing and signature recovery.
//!
//! Every signature the relay accepts is an EIP-191 personal-message
//! signature over a 32-byte payload hash (what `signer.signMessage(bytes)`
//! produces in ethers/viem). The payload hashes are keccak256 over the
//! packed ABI encoding of the signed fields, so contracts can rebuild them.

use std::str::FromStr;

use alloy::{
    primitives::{keccak256, Address, Signature, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
    sol_types::SolValue,
};

/// Errors from key, address and signature handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Strip an optional `0x`/`0X` prefix.
fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Create a signer from a hex private key (with or without 0x prefix).
///
/// The key must be exactly 32 bytes and a valid secp256k1 scalar
/// (non-zero, below the curve order).
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, SigningError> {
    let hex_part = strip_hex_prefix(private_key_hex.trim());
    if hex_part.len() != 64 {
        return Err(SigningError::InvalidPrivateKey(
            "expected 32 bytes (64 hex characters)".to_string(),
        ));
    }

    let key_bytes = alloy::hex::decode(hex_part)
        .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?;

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))
}

/// Generate a fresh signer from the OS CSPRNG.
pub fn random_signer() -> PrivateKeySigner {
    use k256::ecdsa::SigningKey;
    use k256::elliptic_curve::rand_core::OsRng;

    PrivateKeySigner::from_signing_key(SigningKey::random(&mut OsRng))
}

/// Parse a 0x-prefixed, 20-byte hex address.
///
/// Mixed-case input is accepted without enforcing the EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<Address, SigningError> {
    let address = address.trim();
    if !address.starts_with("0x") {
        return Err(SigningError::InvalidAddress(
            "address must start with 0x".to_string(),
        ));
    }
    if address.len() != 42 {
        return Err(SigningError::InvalidAddress(
            "address must be 42 characters (0x + 40 hex)".to_string(),
        ));
    }
    if !address[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SigningError::InvalidAddress(
            "address must contain only hex characters".to_string(),
        ));
    }
    Address::from_str(address).map_err(|e| SigningError::InvalidAddress(e.to_string()))
}

/// Normalize a transaction hash to bytes32.
///
/// Accepts `0x` followed by 1 to 64 hex digits; shorter values are
/// left-padded with zeros, so `0xabc` and `0x0abc` name the same hash.
pub fn normalize_tx_hash(tx_hash: &str) -> Result<B256, SigningError> {
    let tx_hash = tx_hash.trim();
    let Some(hex_part) = tx_hash
        .strip_prefix("0x")
        .or_else(|| tx_hash.strip_prefix("0X"))
    else {
        return Err(SigningError::InvalidTxHash(
            "transaction hash must start with 0x".to_string(),
        ));
    };
    if hex_part.is_empty() || hex_part.len() > 64 {
        return Err(SigningError::InvalidTxHash(
            "transaction hash must have 1 to 64 hex digits".to_string(),
        ));
    }
    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SigningError::InvalidTxHash(
            "transaction hash must contain only hex characters".to_string(),
        ));
    }

    let padded = format!("{:0>64}", hex_part);
    B256::from_str(&padded).map_err(|e| SigningError::InvalidTxHash(e.to_string()))
}

/// Parse a 65-byte `r || s || v` signature from hex.
pub fn parse_signature(signature: &str) -> Result<Signature, SigningError> {
    let bytes = alloy::hex::decode(strip_hex_prefix(signature.trim()))
        .map_err(|e| SigningError::InvalidSignature(e.to_string()))?;
    if bytes.len() != 65 {
        return Err(SigningError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }
    Signature::try_from(bytes.as_slice()).map_err(|e| SigningError::InvalidSignature(e.to_string()))
}

/// Recover the EIP-191 signer of a payload hash.
pub fn recover_signer(signature: &Signature, payload: B256) -> Result<Address, SigningError> {
    signature
        .recover_address_from_msg(payload.as_slice())
        .map_err(|e| SigningError::InvalidSignature(e.to_string()))
}

/// Sign a payload hash as an EIP-191 personal message, returning 0x hex.
pub fn sign_payload(signer: &PrivateKeySigner, payload: B256) -> Result<String, SigningError> {
    let signature = signer
        .sign_message_sync(payload.as_slice())
        .map_err(|e| SigningError::SigningFailed(e.to_string()))?;
    Ok(alloy::hex::encode_prefixed(signature.as_bytes()))
}

/// Canonical lowercase hex of a signature, used as a replay key.
///
/// The low-s form is used so a malleated copy maps to the same key.
pub fn signature_key(signature: &Signature) -> String {
    let canonical = signature.normalize_s().unwrap_or(*signature);
    alloy::hex::encode(canonical.as_bytes())
}

/// Tag of owner-signed session key registrations.
const SESSION_CREATE_TAG: &str = "vyra.session.create";

/// Tag of owner-signed session key revocations.
const SESSION_REVOKE_TAG: &str = "vyra.session.revoke";

/// keccak256(abi.encodePacked(address user, uint256 gasUsed, uint256 deadline))
pub fn sponsorship_payload(user: Address, gas_used: U256, deadline: u64) -> B256 {
    keccak256((user, gas_used, U256::from(deadline)).abi_encode_packed())
}

/// keccak256(abi.encodePacked(address from, address to, uint256 amount, uint256 deadline))
pub fn transfer_payload(from: Address, to: Address, amount: U256, deadline: u64) -> B256 {
    keccak256((from, to, amount, U256::from(deadline)).abi_encode_packed())
}

/// keccak256(abi.encodePacked(keccak256(tag), address owner, uint256 expiry, uint256 deadline))
pub fn session_key_payload(owner: Address, expiry: u64, deadline: u64) -> B256 {
    keccak256(
        (
            keccak256(SESSION_CREATE_TAG),
            owner,
            U256::from(expiry),
            U256::from(deadline),
        )
            .abi_encode_packed(),
    )
}

/// keccak256(abi.encodePacked(keccak256(tag), address owner, uint256 deadline))
pub fn session_revoke_payload(owner: Address, deadline: u64) -> B256 {
    keccak256((keccak256(SESSION_REVOKE_TAG), owner, U256::from(deadline)).abi_encode_packed())
}

/// keccak256(abi.encodePacked(uint256 amount, bytes32 sourceTxHash))
pub fn withdrawal_payload(amount: U256, source_tx_hash: B256) -> B256 {
    keccak256((amount, source_tx_hash).abi_encode_packed())
}
