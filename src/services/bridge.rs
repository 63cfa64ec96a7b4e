// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Bridge transfer coordination between the home chain (L1) and L2.
//!
//! Transfers move `pending -> confirmed -> settled`, or to `failed` from
//! either non-terminal state. A withdrawal only leaves `pending` once
//! enough distinct bridge validators have signed
//! `keccak256(abi.encodePacked(amountWei, sourceTxHash))`, and each source
//! transaction hash backs at most one withdrawal: the first request that
//! cites it claims it for good.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use crate::blockchain::amounts::{format_amount, parse_positive_amount, AmountError};
use crate::blockchain::signing::{normalize_tx_hash, parse_signature, recover_signer, withdrawal_payload};
use crate::blockchain::types::VYRA_DECIMALS;
use crate::clock::Clock;
use crate::error::{DomainError, ErrorKind};
use crate::ids::random_id;
use crate::storage::ledger_store::LedgerStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid amount: {0}")]
    InvalidAmount(AmountError),

    #[error("invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("at least one validator signature is required")]
    MissingSignatures,

    #[error("signature {index} is invalid: {reason}")]
    InvalidSignature { index: usize, reason: String },

    #[error("validator {0} signed more than once")]
    DuplicateSignature(Address),

    #[error("source transaction {source_tx_hash} already backs a withdrawal")]
    AlreadyClaimed { source_tx_hash: B256 },

    #[error("withdrawal {transfer_id} has {have} of {need} required validator signatures")]
    InsufficientSignatures {
        transfer_id: String,
        have: usize,
        need: usize,
    },

    #[error("transfer not found: {0}")]
    NotFound(String),

    #[error("cannot {action} transfer {id} in status {status}")]
    InvalidTransition {
        id: String,
        status: TransferStatus,
        action: &'static str,
    },

    #[error("invalid validator set: {0}")]
    InvalidValidatorSet(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError for BridgeError {
    fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidAmount(_)
            | BridgeError::InvalidTxHash(_)
            | BridgeError::MissingSignatures
            | BridgeError::InvalidSignature { .. }
            | BridgeError::DuplicateSignature(_) => ErrorKind::Validation,
            BridgeError::AlreadyClaimed { .. } | BridgeError::InvalidTransition { .. } => {
                ErrorKind::Conflict
            }
            BridgeError::InsufficientSignatures { .. } => ErrorKind::InsufficientSignatures,
            BridgeError::NotFound(_) => ErrorKind::NotFound,
            BridgeError::InvalidValidatorSet(_) | BridgeError::Storage(_) => ErrorKind::Internal,
        }
    }

    fn details(&self) -> Option<Map<String, Value>> {
        match self {
            BridgeError::InsufficientSignatures {
                transfer_id,
                have,
                need,
            } => {
                let mut details = Map::new();
                details.insert("withdrawalId".into(), json!(transfer_id));
                details.insert("status".into(), json!(TransferStatus::Pending));
                details.insert("validSignatures".into(), json!(have));
                details.insert("threshold".into(), json!(need));
                Some(details)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Confirmed,
    Settled,
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Settled | TransferStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Confirmed => "confirmed",
            TransferStatus::Settled => "settled",
            TransferStatus::Failed => "failed",
        }
    }

    fn can_become(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed) | (Confirmed, Settled) | (Pending, Failed) | (Confirmed, Failed)
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Deposit,
    Withdrawal,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Deposit => "deposit",
            TransferDirection::Withdrawal => "withdrawal",
        }
    }
}

/// A cross-chain transfer as stored by the coordinator.
///
/// Amounts and hashes are kept as strings so the record serializes the
/// same way it is shown over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransfer {
    pub id: String,
    pub direction: TransferDirection,
    /// Normalized decimal amount ("10", "1.5")
    pub amount: String,
    /// Amount in base units, decimal
    pub amount_wei: String,
    /// Deposit: L1 transaction; withdrawal: L2 transaction
    pub source_tx_hash: Option<String>,
    /// Validators whose signatures were accepted, in acceptance order
    pub validators: Vec<String>,
    /// Accepted signatures, aligned with `validators`
    pub signatures: Vec<String>,
    pub settlement_tx_hash: Option<String>,
    pub status: TransferStatus,
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub settlement_attempts: u32,
    #[serde(default)]
    pub settlement_in_flight: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BridgeTransfer {
    pub fn amount_wei(&self) -> U256 {
        U256::from_str_radix(&self.amount_wei, 10).unwrap_or_default()
    }

    pub fn source_hash(&self) -> Option<B256> {
        self.source_tx_hash
            .as_deref()
            .and_then(|h| normalize_tx_hash(h).ok())
    }

    pub fn settlement_hash(&self) -> Option<B256> {
        self.settlement_tx_hash
            .as_deref()
            .and_then(|h| normalize_tx_hash(h).ok())
    }

    fn transition(&mut self, next: TransferStatus, action: &'static str) -> Result<(), BridgeError> {
        if !self.status.can_become(next) {
            return Err(BridgeError::InvalidTransition {
                id: self.id.clone(),
                status: self.status,
                action,
            });
        }
        self.status = next;
        Ok(())
    }

    fn view(&self) -> TransferView {
        TransferView {
            id: self.id.clone(),
            status: self.status,
            direction: self.direction,
            amount: self.amount.clone(),
        }
    }
}

/// Status summary returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferView {
    pub id: String,
    pub status: TransferStatus,
    pub direction: TransferDirection,
    pub amount: String,
}

/// Bridge validators and the number of distinct signatures required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    members: HashSet<Address>,
    threshold: usize,
}

impl ValidatorSet {
    /// Build a set; `threshold` defaults to a simple majority.
    pub fn new(members: Vec<Address>, threshold: Option<usize>) -> Result<Self, BridgeError> {
        let count = members.len();
        let members: HashSet<Address> = members.into_iter().collect();
        if members.is_empty() {
            return Err(BridgeError::InvalidValidatorSet(
                "at least one validator is required".to_string(),
            ));
        }
        if members.len() != count {
            return Err(BridgeError::InvalidValidatorSet(
                "validators must be distinct".to_string(),
            ));
        }
        let threshold = threshold.unwrap_or(members.len() / 2 + 1);
        if threshold == 0 || threshold > members.len() {
            return Err(BridgeError::InvalidValidatorSet(format!(
                "threshold must be between 1 and {}",
                members.len()
            )));
        }
        Ok(Self { members, threshold })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.members.contains(address)
    }
}

pub struct BridgeCoordinator {
    transfers: DashMap<String, Arc<Mutex<BridgeTransfer>>>,
    /// L2 tx hash -> withdrawal id
    withdrawal_claims: DashMap<B256, String>,
    /// L1 tx hash -> deposit id
    deposit_sources: DashMap<B256, String>,
    validators: ValidatorSet,
    clock: Arc<dyn Clock>,
    store: Option<Arc<LedgerStore>>,
}

impl BridgeCoordinator {
    pub fn new(
        validators: ValidatorSet,
        clock: Arc<dyn Clock>,
        store: Option<Arc<LedgerStore>>,
    ) -> Self {
        Self {
            transfers: DashMap::new(),
            withdrawal_claims: DashMap::new(),
            deposit_sources: DashMap::new(),
            validators,
            clock,
            store,
        }
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// Load previously stored transfers and rebuild the hash claims.
    ///
    /// Settlement that was in flight when the process stopped is cleared so
    /// the worker re-examines it.
    pub fn restore(&self, transfers: Vec<BridgeTransfer>) {
        for mut transfer in transfers {
            if transfer.settlement_in_flight {
                tracing::warn!(
                    transfer_id = %transfer.id,
                    "Clearing interrupted settlement after restart"
                );
                transfer.settlement_in_flight = false;
            }
            if let Some(hash) = transfer.source_hash() {
                let claims = match transfer.direction {
                    TransferDirection::Withdrawal => &self.withdrawal_claims,
                    TransferDirection::Deposit => &self.deposit_sources,
                };
                claims.insert(hash, transfer.id.clone());
            }
            self.transfers
                .insert(transfer.id.clone(), Arc::new(Mutex::new(transfer)));
        }
        tracing::info!(count = self.transfers.len(), "Restored bridge transfers");
    }

    fn persist(&self, transfer: &BridgeTransfer) -> Result<(), BridgeError> {
        if let Some(store) = &self.store {
            store
                .put_transfer(transfer)
                .map_err(|e| BridgeError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<BridgeTransfer>>, BridgeError> {
        self.transfers
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))
    }

    /// Apply `change` to a copy of the transfer, persist it, then commit.
    async fn update<F>(&self, id: &str, change: F) -> Result<BridgeTransfer, BridgeError>
    where
        F: FnOnce(&mut BridgeTransfer) -> Result<(), BridgeError>,
    {
        let entry = self.entry(id)?;
        let mut current = entry.lock().await;
        let mut next = current.clone();
        change(&mut next)?;
        next.updated_at = self.clock.now();
        self.persist(&next)?;
        *current = next.clone();
        Ok(next)
    }

    fn new_transfer(
        &self,
        direction: TransferDirection,
        amount_wei: U256,
        status: TransferStatus,
    ) -> BridgeTransfer {
        let now = self.clock.now();
        BridgeTransfer {
            id: random_id(),
            direction,
            amount: format_amount(amount_wei, VYRA_DECIMALS),
            amount_wei: amount_wei.to_string(),
            source_tx_hash: None,
            validators: Vec::new(),
            signatures: Vec::new(),
            settlement_tx_hash: None,
            status,
            failure_reason: None,
            settlement_attempts: 0,
            settlement_in_flight: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Verify validator signatures over a withdrawal.
    ///
    /// Returns `(validator, signature hex)` pairs in request order.
    fn verify_attestations(
        &self,
        amount_wei: U256,
        source_tx_hash: B256,
        signatures: &[String],
    ) -> Result<Vec<(Address, String)>, BridgeError> {
        if signatures.is_empty() {
            return Err(BridgeError::MissingSignatures);
        }
        let payload = withdrawal_payload(amount_wei, source_tx_hash);
        let mut seen = HashSet::new();
        let mut attestations = Vec::with_capacity(signatures.len());

        for (index, signature) in signatures.iter().enumerate() {
            let parsed = parse_signature(signature).map_err(|e| BridgeError::InvalidSignature {
                index,
                reason: e.to_string(),
            })?;
            let signer = recover_signer(&parsed, payload).map_err(|e| {
                BridgeError::InvalidSignature {
                    index,
                    reason: e.to_string(),
                }
            })?;
            if !self.validators.contains(&signer) {
                return Err(BridgeError::InvalidSignature {
                    index,
                    reason: "signer is not a bridge validator".to_string(),
                });
            }
            if !seen.insert(signer) {
                return Err(BridgeError::DuplicateSignature(signer));
            }
            attestations.push((signer, alloy::hex::encode_prefixed(parsed.as_bytes())));
        }
        Ok(attestations)
    }

    /// Record a pending deposit.
    pub async fn deposit(&self, amount: &str) -> Result<String, BridgeError> {
        let amount_wei =
            parse_positive_amount(amount, VYRA_DECIMALS).map_err(BridgeError::InvalidAmount)?;
        let transfer = self.new_transfer(TransferDirection::Deposit, amount_wei, TransferStatus::Pending);
        let id = transfer.id.clone();

        self.persist(&transfer)?;
        self.transfers
            .insert(id.clone(), Arc::new(Mutex::new(transfer)));

        tracing::info!(transfer_id = %id, amount = %amount_wei, "Deposit created");
        Ok(id)
    }

    /// Bind the L1 transaction that funds a pending deposit.
    pub async fn attach_deposit_source(
        &self,
        id: &str,
        source_tx_hash: &str,
    ) -> Result<TransferView, BridgeError> {
        let hash =
            normalize_tx_hash(source_tx_hash).map_err(|e| BridgeError::InvalidTxHash(e.to_string()))?;

        let entry = self.entry(id)?;
        let mut current = entry.lock().await;
        if current.direction != TransferDirection::Deposit
            || current.status != TransferStatus::Pending
            || current.source_tx_hash.is_some()
        {
            return Err(BridgeError::InvalidTransition {
                id: id.to_string(),
                status: current.status,
                action: "attach a source to",
            });
        }

        match self.deposit_sources.entry(hash) {
            Entry::Occupied(_) => {
                return Err(BridgeError::AlreadyClaimed {
                    source_tx_hash: hash,
                })
            }
            Entry::Vacant(vacant) => {
                vacant.insert(id.to_string());
            }
        }

        // The claim is already visible, so the write happens outside the map shard.
        let mut next = current.clone();
        next.source_tx_hash = Some(hash.to_string());
        next.updated_at = self.clock.now();
        if let Err(e) = self.persist(&next) {
            self.deposit_sources.remove(&hash);
            return Err(e);
        }
        *current = next;

        tracing::info!(transfer_id = %id, source_tx_hash = %hash, "Deposit source attached");
        Ok(current.view())
    }

    /// Request a withdrawal backed by an L2 transaction.
    ///
    /// Below the signature threshold the withdrawal is still recorded (and
    /// the source hash claimed) as `pending`, and the returned
    /// `InsufficientSignatures` error carries its id.
    pub async fn withdraw(
        &self,
        amount: &str,
        source_tx_hash: &str,
        signatures: &[String],
    ) -> Result<String, BridgeError> {
        let amount_wei =
            parse_positive_amount(amount, VYRA_DECIMALS).map_err(BridgeError::InvalidAmount)?;
        let hash =
            normalize_tx_hash(source_tx_hash).map_err(|e| BridgeError::InvalidTxHash(e.to_string()))?;

        if self.withdrawal_claims.contains_key(&hash) {
            tracing::warn!(source_tx_hash = %hash, "Withdrawal source already claimed");
            return Err(BridgeError::AlreadyClaimed {
                source_tx_hash: hash,
            });
        }

        let attestations = self.verify_attestations(amount_wei, hash, signatures)?;
        let need = self.validators.threshold();
        let have = attestations.len();
        let status = if have >= need {
            TransferStatus::Confirmed
        } else {
            TransferStatus::Pending
        };

        let mut transfer = self.new_transfer(TransferDirection::Withdrawal, amount_wei, status);
        transfer.source_tx_hash = Some(hash.to_string());
        for (validator, signature) in attestations {
            transfer.validators.push(validator.to_string());
            transfer.signatures.push(signature);
        }
        let id = transfer.id.clone();

        match self.withdrawal_claims.entry(hash) {
            Entry::Occupied(_) => {
                return Err(BridgeError::AlreadyClaimed {
                    source_tx_hash: hash,
                })
            }
            Entry::Vacant(vacant) => {
                vacant.insert(id.clone());
            }
        }
        if let Err(e) = self.persist(&transfer) {
            self.withdrawal_claims.remove(&hash);
            return Err(e);
        }
        self.transfers
            .insert(id.clone(), Arc::new(Mutex::new(transfer)));

        tracing::info!(
            transfer_id = %id,
            source_tx_hash = %hash,
            valid_signatures = have,
            threshold = need,
            status = %status,
            "Withdrawal recorded"
        );

        if status == TransferStatus::Pending {
            return Err(BridgeError::InsufficientSignatures {
                transfer_id: id,
                have,
                need,
            });
        }
        Ok(id)
    }

    /// Add validator signatures to a pending withdrawal.
    ///
    /// Signers already counted are skipped.
    pub async fn submit_signatures(
        &self,
        id: &str,
        signatures: &[String],
    ) -> Result<TransferView, BridgeError> {
        let need = self.validators.threshold();
        let updated = self
            .update(id, |transfer| {
                if transfer.direction != TransferDirection::Withdrawal
                    || transfer.status != TransferStatus::Pending
                {
                    return Err(BridgeError::InvalidTransition {
                        id: transfer.id.clone(),
                        status: transfer.status,
                        action: "add signatures to",
                    });
                }
                let hash = transfer.source_hash().ok_or_else(|| {
                    BridgeError::InvalidTxHash("withdrawal has no source hash".to_string())
                })?;
                let attestations =
                    self.verify_attestations(transfer.amount_wei(), hash, signatures)?;

                for (validator, signature) in attestations {
                    let validator = validator.to_string();
                    if !transfer.validators.contains(&validator) {
                        transfer.validators.push(validator);
                        transfer.signatures.push(signature);
                    }
                }
                if transfer.validators.len() >= need {
                    transfer.transition(TransferStatus::Confirmed, "confirm")?;
                }
                Ok(())
            })
            .await?;

        let have = updated.validators.len();
        tracing::info!(
            transfer_id = %id,
            valid_signatures = have,
            threshold = need,
            status = %updated.status,
            "Withdrawal signatures added"
        );

        if updated.status == TransferStatus::Pending {
            return Err(BridgeError::InsufficientSignatures {
                transfer_id: id.to_string(),
                have,
                need,
            });
        }
        Ok(updated.view())
    }

    pub async fn get_status(&self, id: &str) -> Result<TransferView, BridgeError> {
        let entry = self.entry(id)?;
        let transfer = entry.lock().await;
        Ok(transfer.view())
    }

    /// Full snapshot of a transfer.
    pub async fn get_transfer(&self, id: &str) -> Result<BridgeTransfer, BridgeError> {
        let entry = self.entry(id)?;
        let transfer = entry.lock().await;
        Ok(transfer.clone())
    }

    /// Snapshots of all non-terminal transfers.
    pub async fn list_in_flight(&self) -> Vec<BridgeTransfer> {
        let entries: Vec<_> = self
            .transfers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut in_flight = Vec::new();
        for entry in entries {
            let transfer = entry.lock().await;
            if !transfer.status.is_terminal() {
                in_flight.push(transfer.clone());
            }
        }
        in_flight.sort_by_key(|t| t.created_at);
        in_flight
    }

    /// Confirm a deposit whose L1 source transaction succeeded.
    pub async fn confirm_deposit(&self, id: &str) -> Result<TransferView, BridgeError> {
        let updated = self
            .update(id, |transfer| {
                if transfer.direction != TransferDirection::Deposit
                    || transfer.source_tx_hash.is_none()
                {
                    return Err(BridgeError::InvalidTransition {
                        id: transfer.id.clone(),
                        status: transfer.status,
                        action: "confirm",
                    });
                }
                transfer.transition(TransferStatus::Confirmed, "confirm")
            })
            .await?;
        tracing::info!(transfer_id = %id, "Deposit confirmed");
        Ok(updated.view())
    }

    /// Take a confirmed transfer for settlement.
    ///
    /// Fails if it is already being settled or was submitted before.
    pub async fn begin_settlement(&self, id: &str) -> Result<BridgeTransfer, BridgeError> {
        self.update(id, |transfer| {
            if transfer.status != TransferStatus::Confirmed
                || transfer.settlement_in_flight
                || transfer.settlement_tx_hash.is_some()
            {
                return Err(BridgeError::InvalidTransition {
                    id: transfer.id.clone(),
                    status: transfer.status,
                    action: "settle",
                });
            }
            transfer.settlement_in_flight = true;
            Ok(())
        })
        .await
    }

    /// Record the submitted settlement transaction.
    pub async fn record_settlement_tx(&self, id: &str, tx_hash: B256) -> Result<(), BridgeError> {
        self.update(id, |transfer| {
            transfer.settlement_in_flight = false;
            transfer.settlement_tx_hash = Some(tx_hash.to_string());
            Ok(())
        })
        .await?;
        tracing::info!(transfer_id = %id, tx_hash = %tx_hash, "Settlement submitted");
        Ok(())
    }

    /// Release a settlement that could not be submitted.
    ///
    /// Returns the number of failed attempts so far.
    pub async fn abort_settlement(&self, id: &str, reason: &str) -> Result<u32, BridgeError> {
        let updated = self
            .update(id, |transfer| {
                transfer.settlement_in_flight = false;
                transfer.settlement_attempts += 1;
                Ok(())
            })
            .await?;
        tracing::warn!(
            transfer_id = %id,
            attempts = updated.settlement_attempts,
            reason,
            "Settlement attempt failed"
        );
        Ok(updated.settlement_attempts)
    }

    pub async fn mark_settled(&self, id: &str, tx_hash: B256) -> Result<TransferView, BridgeError> {
        let updated = self
            .update(id, |transfer| {
                transfer.transition(TransferStatus::Settled, "settle")?;
                transfer.settlement_in_flight = false;
                transfer.settlement_tx_hash = Some(tx_hash.to_string());
                Ok(())
            })
            .await?;
        tracing::info!(transfer_id = %id, tx_hash = %tx_hash, "Transfer settled");
        Ok(updated.view())
    }

    pub async fn mark_failed(&self, id: &str, reason: &str) -> Result<TransferView, BridgeError> {
        let updated = self
            .update(id, |transfer| {
                transfer.transition(TransferStatus::Failed, "fail")?;
                transfer.settlement_in_flight = false;
                transfer.failure_reason = Some(reason.to_string());
                Ok(())
            })
            .await?;
        tracing::warn!(transfer_id = %id, reason, "Transfer failed");
        Ok(updated.view())
    }
}
