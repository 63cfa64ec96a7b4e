// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Gas sponsorship relay and owner-signed session key actions.
//!
//! A user (or their session key) signs `(user, gasUsed, deadline)`; the
//! relay checks the signature, reserves it against replay until the
//! deadline and submits `sponsorGas` to the paymaster contract from the
//! service funding account. Creating or revoking a session key needs a
//! signature by the owner key itself.

use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256, U256};
use chrono::DateTime;

use crate::blockchain::client::{ChainClient, ChainClientError};
use crate::blockchain::contracts::sponsor_gas_calldata;
use crate::blockchain::retry::{submit_with_retry, RetryPolicy};
use crate::blockchain::signing::{
    parse_address, parse_signature, recover_signer, session_key_payload, session_revoke_payload,
    signature_key, sponsorship_payload,
};
use crate::blockchain::types::ContractCall;
use crate::error::{DomainError, ErrorKind};
use crate::services::session::{IssuedSessionKey, SessionError, SessionKeyManager};
use crate::storage::dedup::{ReplayError, RequestDedup};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymasterError {
    #[error("invalid user address: {0}")]
    InvalidAddress(String),

    #[error("gasUsed must be a non-negative integer")]
    InvalidGasAmount,

    #[error("gasUsed {requested} exceeds the sponsorship limit of {max}")]
    GasLimitExceeded { requested: U256, max: u64 },

    #[error("signature is not valid for this user")]
    Unauthorized,

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("sponsorship submission failed: {0}")]
    SubmissionFailed(ChainClientError),
}

impl DomainError for PaymasterError {
    fn kind(&self) -> ErrorKind {
        match self {
            PaymasterError::InvalidAddress(_)
            | PaymasterError::InvalidGasAmount
            | PaymasterError::GasLimitExceeded { .. } => ErrorKind::Validation,
            PaymasterError::Unauthorized => ErrorKind::Unauthorized,
            PaymasterError::Replay(e) => e.kind(),
            PaymasterError::Session(e) => e.kind(),
            PaymasterError::SubmissionFailed(_) => ErrorKind::Chain,
        }
    }
}

/// Parse a base-10 unsigned integer string.
fn parse_gas_amount(gas_used: &str) -> Result<U256, PaymasterError> {
    let gas_used = gas_used.trim();
    if gas_used.is_empty() || !gas_used.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PaymasterError::InvalidGasAmount);
    }
    U256::from_str_radix(gas_used, 10).map_err(|_| PaymasterError::InvalidGasAmount)
}

fn parse_owner(owner: &str) -> Result<Address, PaymasterError> {
    parse_address(owner).map_err(|e| PaymasterError::InvalidAddress(e.to_string()))
}

/// Check that `signature` over `payload` is by `owner` itself and return
/// its replay key. Session keys cannot manage session keys.
fn owner_signature_key(owner: Address, signature: &str, payload: B256) -> Result<String, PaymasterError> {
    let parsed = parse_signature(signature).map_err(|_| PaymasterError::Unauthorized)?;
    match recover_signer(&parsed, payload) {
        Ok(signer) if signer == owner => Ok(signature_key(&parsed)),
        _ => {
            tracing::warn!(owner = %owner, "Rejected session key action not signed by owner");
            Err(PaymasterError::Unauthorized)
        }
    }
}

pub struct PaymasterRelay {
    sessions: Arc<SessionKeyManager>,
    chain: Arc<dyn ChainClient>,
    dedup: Arc<RequestDedup>,
    paymaster: Address,
    max_sponsored_gas: u64,
    retry: RetryPolicy,
}

impl PaymasterRelay {
    pub fn new(
        sessions: Arc<SessionKeyManager>,
        chain: Arc<dyn ChainClient>,
        dedup: Arc<RequestDedup>,
        paymaster: Address,
        max_sponsored_gas: u64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            sessions,
            chain,
            dedup,
            paymaster,
            max_sponsored_gas,
            retry,
        }
    }

    /// Validate and relay a sponsorship request, returning the tx hash.
    pub async fn sponsor(
        &self,
        user: &str,
        gas_used: &str,
        deadline: u64,
        signature: &str,
    ) -> Result<B256, PaymasterError> {
        let user = parse_owner(user)?;
        let gas = parse_gas_amount(gas_used)?;
        if gas > U256::from(self.max_sponsored_gas) {
            return Err(PaymasterError::GasLimitExceeded {
                requested: gas,
                max: self.max_sponsored_gas,
            });
        }
        let expires_at = self.dedup.check_deadline(deadline)?;

        let payload = sponsorship_payload(user, gas, deadline);
        if !self.sessions.is_authorized(user, signature, payload) {
            tracing::warn!(user = %user, "Rejected sponsorship with invalid signature");
            return Err(PaymasterError::Unauthorized);
        }
        let parsed = parse_signature(signature).map_err(|_| PaymasterError::Unauthorized)?;
        let dedup_key = signature_key(&parsed);

        if let Err(e) = self.dedup.reserve(&dedup_key, expires_at) {
            tracing::warn!(user = %user, error = %e, "Sponsorship request not reserved");
            return Err(e.into());
        }

        let call = ContractCall::new(
            self.paymaster,
            sponsor_gas_calldata(user, gas),
            keccak256(dedup_key.as_bytes()),
        );
        match submit_with_retry(self.chain.as_ref(), call, &self.retry).await {
            Ok(tx_hash) => {
                self.dedup.complete(&dedup_key, Some(tx_hash));
                tracing::info!(user = %user, gas_used = %gas, tx_hash = %tx_hash, "Gas sponsored");
                Ok(tx_hash)
            }
            Err(e) => {
                self.dedup.release(&dedup_key);
                Err(PaymasterError::SubmissionFailed(e))
            }
        }
    }

    /// Create a session key for `owner` on the owner's own signature over
    /// `(owner, expiry, deadline)`.
    pub fn create_session_key(
        &self,
        owner: &str,
        expiry: u64,
        deadline: u64,
        signature: &str,
    ) -> Result<IssuedSessionKey, PaymasterError> {
        let owner = parse_owner(owner)?;
        let expires_at = i64::try_from(expiry)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| SessionError::InvalidExpiry("expiry is out of range".to_string()))?;
        let until = self.dedup.check_deadline(deadline)?;
        let key = owner_signature_key(owner, signature, session_key_payload(owner, expiry, deadline))?;

        self.dedup.reserve(&key, until)?;
        match self.sessions.create_session_key(owner, expires_at) {
            Ok(issued) => {
                self.dedup.complete(&key, None);
                Ok(issued)
            }
            Err(e) => {
                self.dedup.release(&key);
                Err(e.into())
            }
        }
    }

    /// Revoke the active session key of `owner` on the owner's own
    /// signature over `(owner, deadline)`. Returns whether one was revoked.
    pub fn revoke_session_key(
        &self,
        owner: &str,
        deadline: u64,
        signature: &str,
    ) -> Result<bool, PaymasterError> {
        let owner = parse_owner(owner)?;
        let until = self.dedup.check_deadline(deadline)?;
        let key = owner_signature_key(owner, signature, session_revoke_payload(owner, deadline))?;

        self.dedup.reserve(&key, until)?;
        let revoked = self.sessions.revoke_session_key(owner);
        self.dedup.complete(&key, None);
        Ok(revoked)
    }
}
