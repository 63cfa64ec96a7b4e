// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Session keys: short-lived delegated signers bound to a wallet owner.
//!
//! Each owner has at most one active key. The key pair is generated here
//! and handed to the owner once; only its address is kept, in memory. A
//! replaced, revoked or expired key is never reactivated.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::blockchain::signing::{parse_signature, random_signer, recover_signer};
use crate::clock::Clock;
use crate::error::{DomainError, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("no active session key for {0}")]
    NoActiveSessionKey(Address),
}

impl DomainError for SessionError {
    fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidExpiry(_) => ErrorKind::Validation,
            SessionError::NoActiveSessionKey(_) => ErrorKind::NotFound,
        }
    }
}

/// Public view of a session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyInfo {
    pub owner: Address,
    pub address: Address,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly created key. The signer is not retained by the manager.
pub struct IssuedSessionKey {
    pub info: SessionKeyInfo,
    pub signer: PrivateKeySigner,
}

struct SessionKey {
    address: Address,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl SessionKey {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }

    fn info(&self, owner: Address) -> SessionKeyInfo {
        SessionKeyInfo {
            owner,
            address: self.address,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

pub struct SessionKeyManager {
    keys: DashMap<Address, SessionKey>,
    clock: Arc<dyn Clock>,
    max_ttl: Duration,
}

impl SessionKeyManager {
    pub fn new(clock: Arc<dyn Clock>, max_ttl: Duration) -> Self {
        Self {
            keys: DashMap::new(),
            clock,
            max_ttl,
        }
    }

    /// Create a session key for `owner`, replacing the previous one.
    ///
    /// The owner's slot is swapped under its shard lock, so concurrent
    /// creates for one owner still leave a single active key.
    pub fn create_session_key(
        &self,
        owner: Address,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedSessionKey, SessionError> {
        let now = self.clock.now();
        if expires_at <= now {
            return Err(SessionError::InvalidExpiry(
                "expiry must be in the future".to_string(),
            ));
        }
        if expires_at - now > self.max_ttl {
            return Err(SessionError::InvalidExpiry(format!(
                "expiry must be within {} seconds",
                self.max_ttl.num_seconds()
            )));
        }

        let signer = random_signer();
        let key = SessionKey {
            address: signer.address(),
            created_at: now,
            expires_at,
            revoked: false,
        };
        let info = key.info(owner);

        if let Some(previous) = self.keys.insert(owner, key) {
            if previous.is_active(now) {
                tracing::info!(
                    owner = %owner,
                    session_key = %previous.address,
                    "Session key replaced"
                );
            }
        }

        tracing::info!(
            owner = %owner,
            session_key = %info.address,
            expires_at = %info.expires_at,
            "Session key created"
        );
        Ok(IssuedSessionKey { info, signer })
    }

    /// Revoke the active key of `owner`. Returns whether one was revoked.
    pub fn revoke_session_key(&self, owner: Address) -> bool {
        let now = self.clock.now();
        let Some(mut key) = self.keys.get_mut(&owner) else {
            return false;
        };
        if !key.is_active(now) {
            return false;
        }
        key.revoked = true;
        tracing::info!(owner = %owner, session_key = %key.address, "Session key revoked");
        true
    }

    /// Whether `signature` over `payload` comes from `owner` or from the
    /// owner's currently active session key.
    pub fn is_authorized(&self, owner: Address, signature: &str, payload: B256) -> bool {
        let Ok(signature) = parse_signature(signature) else {
            return false;
        };
        let Ok(signer) = recover_signer(&signature, payload) else {
            return false;
        };
        if signer == owner {
            return true;
        }

        let now = self.clock.now();
        self.keys
            .get(&owner)
            .is_some_and(|key| key.is_active(now) && key.address == signer)
    }

    pub fn active_session_key(&self, owner: Address) -> Option<SessionKeyInfo> {
        let now = self.clock.now();
        self.keys
            .get(&owner)
            .filter(|key| key.is_active(now))
            .map(|key| key.info(owner))
    }
}
