// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Replay records for signed relay requests.
//!
//! Every signed request carries a deadline no further away than the
//! configured window. Its signature is reserved before the chain submission
//! and the record lives until the deadline; after that the request itself
//! is rejected as expired, so a signature is accepted at most once. Live
//! records are never evicted: a full table refuses new requests instead.
//! With a ledger store every record is written through and reloaded at
//! startup.

use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::B256;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;

use crate::clock::Clock;
use crate::error::{DomainError, ErrorKind};
use crate::storage::ledger_store::{ConsumedRequest, LedgerStore, LedgerStoreError};

/// State of a known request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupState {
    InFlight,
    /// Accepted; carries the relayed tx hash when there is one
    Completed(Option<B256>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("request deadline has passed")]
    Expired,

    #[error("request deadline must be within {0} seconds")]
    DeadlineTooFar(i64),

    #[error("request was already submitted")]
    Duplicate(DedupState),

    #[error("too many signed requests pending, retry later")]
    Full,

    #[error("could not record request: {0}")]
    Storage(String),
}

impl DomainError for ReplayError {
    fn kind(&self) -> ErrorKind {
        match self {
            ReplayError::Expired | ReplayError::DeadlineTooFar(_) => ErrorKind::Validation,
            ReplayError::Duplicate(_) => ErrorKind::Conflict,
            ReplayError::Full => ErrorKind::Unavailable,
            ReplayError::Storage(_) => ErrorKind::Internal,
        }
    }
}

struct DedupEntry {
    state: DedupState,
    expires_at: DateTime<Utc>,
}

/// Replay table keyed by normalized signature.
pub struct RequestDedup {
    /// Prefix of this table's records in the ledger store
    namespace: &'static str,
    cache: Mutex<LruCache<String, DedupEntry>>,
    capacity: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    store: Option<Arc<LedgerStore>>,
}

impl RequestDedup {
    /// Create a table holding at most `capacity` live records whose
    /// deadlines lie at most `window` ahead.
    pub fn new(
        namespace: &'static str,
        capacity: usize,
        window: Duration,
        clock: Arc<dyn Clock>,
        store: Option<Arc<LedgerStore>>,
    ) -> Self {
        Self {
            namespace,
            cache: Mutex::new(LruCache::unbounded()),
            capacity: capacity.max(1),
            window,
            clock,
            store,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, DedupEntry>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store_key(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    /// Reload live records written before a restart.
    pub fn restore(&self) -> Result<usize, LedgerStoreError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let prefix = self.store_key("");
        let records = store.load_consumed(&prefix, self.clock.now())?;
        let count = records.len();

        let mut cache = self.lock();
        for (key, record) in records {
            let state = match record.tx_hash.as_deref().map(str::parse::<B256>) {
                Some(Ok(tx_hash)) => DedupState::Completed(Some(tx_hash)),
                _ => DedupState::InFlight,
            };
            cache.put(
                key[prefix.len()..].to_string(),
                DedupEntry {
                    state,
                    expires_at: record.expires_at,
                },
            );
        }
        drop(cache);

        tracing::info!(namespace = self.namespace, count, "Restored consumed requests");
        Ok(count)
    }

    /// Check a unix-seconds deadline and return it as a timestamp.
    pub fn check_deadline(&self, deadline: u64) -> Result<DateTime<Utc>, ReplayError> {
        let now = self.clock.now();
        let too_far = ReplayError::DeadlineTooFar(self.window.num_seconds());
        let Some(expires_at) = i64::try_from(deadline)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
        else {
            return Err(too_far);
        };
        if expires_at <= now {
            return Err(ReplayError::Expired);
        }
        if expires_at - now > self.window {
            return Err(too_far);
        }
        Ok(expires_at)
    }

    /// Reserve `key` until `expires_at`.
    ///
    /// Fails with the existing state if the key is still live.
    pub fn reserve(&self, key: &str, expires_at: DateTime<Utc>) -> Result<(), ReplayError> {
        let now = self.clock.now();
        {
            let mut cache = self.lock();
            let live = cache
                .peek(key)
                .filter(|entry| entry.expires_at > now)
                .map(|entry| entry.state);
            if let Some(state) = live {
                return Err(ReplayError::Duplicate(state));
            }
            if !cache.contains(key) && cache.len() >= self.capacity {
                let expired: Vec<String> = cache
                    .iter()
                    .filter(|(_, entry)| entry.expires_at <= now)
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &expired {
                    cache.pop(key);
                }
                if cache.len() >= self.capacity {
                    tracing::warn!(namespace = self.namespace, "Replay table is full");
                    return Err(ReplayError::Full);
                }
            }
            cache.put(
                key.to_string(),
                DedupEntry {
                    state: DedupState::InFlight,
                    expires_at,
                },
            );
        }

        let record = ConsumedRequest {
            expires_at,
            tx_hash: None,
        };
        if let Err(e) = self.write_through(key, &record) {
            self.lock().pop(key);
            return Err(ReplayError::Storage(e.to_string()));
        }
        Ok(())
    }

    /// Mark a reserved request as accepted.
    pub fn complete(&self, key: &str, tx_hash: Option<B256>) {
        let expires_at = {
            let mut cache = self.lock();
            let Some(entry) = cache.get_mut(key) else {
                return;
            };
            entry.state = DedupState::Completed(tx_hash);
            entry.expires_at
        };

        let record = ConsumedRequest {
            expires_at,
            tx_hash: tx_hash.map(|hash| hash.to_string()),
        };
        // The in-flight record is already stored and keeps blocking replays.
        if let Err(e) = self.write_through(key, &record) {
            tracing::warn!(namespace = self.namespace, error = %e, "Could not store completed request");
        }
    }

    /// Drop a reservation so the caller may retry the request.
    pub fn release(&self, key: &str) {
        {
            let mut cache = self.lock();
            if !matches!(cache.peek(key).map(|e| e.state), Some(DedupState::InFlight)) {
                return;
            }
            cache.pop(key);
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.remove_consumed(&self.store_key(key)) {
                tracing::warn!(namespace = self.namespace, error = %e, "Could not release stored request");
            }
        }
    }

    fn write_through(&self, key: &str, record: &ConsumedRequest) -> Result<(), LedgerStoreError> {
        match &self.store {
            Some(store) => store.put_consumed(&self.store_key(key), record),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self, key: &str) -> Option<DedupState> {
        let now = self.clock.now();
        self.lock()
            .peek(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.state)
    }
}
