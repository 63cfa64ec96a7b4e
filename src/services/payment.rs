// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Invoices paid through the POS contract.
//!
//! An invoice moves `pending -> processing -> paid | failed | expired`.
//! Processing claims the invoice under its lock, releases the lock for the
//! chain call and reacquires it to commit, so one invoice is paid at most
//! once no matter how many callers race on it.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::blockchain::amounts::{format_amount, parse_positive_amount, AmountError};
use crate::blockchain::client::{ChainClient, ChainClientError};
use crate::blockchain::contracts::process_payment_calldata;
use crate::blockchain::retry::{submit_with_retry, RetryPolicy};
use crate::blockchain::signing::parse_address;
use crate::blockchain::types::{ContractCall, VYRA_DECIMALS};
use crate::clock::Clock;
use crate::error::{DomainError, ErrorKind};
use crate::ids::{id_to_bytes32, random_id};
use crate::storage::ledger_store::LedgerStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("invalid amount: {0}")]
    InvalidAmount(AmountError),

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("invalid customer address: {0}")]
    InvalidAddress(String),

    #[error("invoice not found: {0}")]
    NotFound(String),

    #[error("invoice is already {0}")]
    AlreadyFinalized(InvoiceStatus),

    #[error("invoice is already being processed")]
    AlreadyProcessing,

    #[error("invoice has expired")]
    Expired,

    #[error("payment submission failed: {0}")]
    SubmissionFailed(ChainClientError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError for PaymentError {
    fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::InvalidAmount(_)
            | PaymentError::EmptyDescription
            | PaymentError::InvalidExpiry(_)
            | PaymentError::InvalidAddress(_) => ErrorKind::Validation,
            PaymentError::NotFound(_) => ErrorKind::NotFound,
            PaymentError::AlreadyFinalized(_)
            | PaymentError::AlreadyProcessing
            | PaymentError::Expired => ErrorKind::Conflict,
            PaymentError::SubmissionFailed(_) => ErrorKind::Chain,
            PaymentError::Storage(_) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    Expired,
}

impl InvoiceStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Paid | InvoiceStatus::Failed | InvoiceStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Failed => "failed",
            InvoiceStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    /// Normalized decimal amount
    pub amount: String,
    /// Amount in base units, decimal
    pub amount_wei: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub payer: Option<String>,
    pub tx_hash: Option<String>,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn amount_wei(&self) -> U256 {
        U256::from_str_radix(&self.amount_wei, 10).unwrap_or_default()
    }
}

pub struct PaymentLedger {
    invoices: DashMap<String, Arc<Mutex<Invoice>>>,
    chain: Arc<dyn ChainClient>,
    pos_contract: Address,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    retry: RetryPolicy,
    store: Option<Arc<LedgerStore>>,
}

impl PaymentLedger {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        pos_contract: Address,
        clock: Arc<dyn Clock>,
        default_ttl: Duration,
        retry: RetryPolicy,
        store: Option<Arc<LedgerStore>>,
    ) -> Self {
        Self {
            invoices: DashMap::new(),
            chain,
            pos_contract,
            clock,
            default_ttl,
            retry,
            store,
        }
    }

    /// Load stored invoices.
    ///
    /// An invoice left in `processing` by a crash goes back to `pending`;
    /// the contract call reuses the invoice id as its idempotency key.
    pub fn restore(&self, invoices: Vec<Invoice>) {
        for mut invoice in invoices {
            if invoice.status == InvoiceStatus::Processing {
                tracing::warn!(invoice_id = %invoice.id, "Resetting interrupted invoice to pending");
                invoice.status = InvoiceStatus::Pending;
            }
            self.invoices
                .insert(invoice.id.clone(), Arc::new(Mutex::new(invoice)));
        }
        tracing::info!(count = self.invoices.len(), "Restored invoices");
    }

    fn persist(&self, invoice: &Invoice) -> Result<(), PaymentError> {
        if let Some(store) = &self.store {
            store
                .put_invoice(invoice)
                .map_err(|e| PaymentError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<Invoice>>, PaymentError> {
        self.invoices
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))
    }

    /// Create an invoice.
    ///
    /// `expiry` is unix seconds; absent or zero means the default lifetime.
    pub async fn create_invoice(
        &self,
        amount: &str,
        description: &str,
        expiry: Option<i64>,
    ) -> Result<String, PaymentError> {
        let amount_wei =
            parse_positive_amount(amount, VYRA_DECIMALS).map_err(PaymentError::InvalidAmount)?;
        let description = description.trim();
        if description.is_empty() {
            return Err(PaymentError::EmptyDescription);
        }

        let now = self.clock.now();
        let expires_at = match expiry {
            None | Some(0) => now + self.default_ttl,
            Some(secs) => {
                let at = DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| PaymentError::InvalidExpiry("out of range".to_string()))?;
                if at <= now {
                    return Err(PaymentError::InvalidExpiry(
                        "expiry must be in the future".to_string(),
                    ));
                }
                at
            }
        };

        let invoice = Invoice {
            id: random_id(),
            amount: format_amount(amount_wei, VYRA_DECIMALS),
            amount_wei: amount_wei.to_string(),
            description: description.to_string(),
            created_at: now,
            expires_at,
            status: InvoiceStatus::Pending,
            payer: None,
            tx_hash: None,
            failure_reason: None,
            updated_at: now,
        };
        let id = invoice.id.clone();

        self.persist(&invoice)?;
        self.invoices
            .insert(id.clone(), Arc::new(Mutex::new(invoice)));

        tracing::info!(invoice_id = %id, amount = %amount_wei, expires_at = %expires_at, "Invoice created");
        Ok(id)
    }

    pub async fn get_payment(&self, id: &str) -> Result<Invoice, PaymentError> {
        let entry = self.entry(id)?;
        let invoice = entry.lock().await;
        Ok(invoice.clone())
    }

    /// Pay an invoice on behalf of `customer`, returning the tx hash.
    pub async fn process_payment(&self, id: &str, customer: &str) -> Result<B256, PaymentError> {
        let entry = self.entry(id)?;
        let customer =
            parse_address(customer).map_err(|e| PaymentError::InvalidAddress(e.to_string()))?;
        let invoice_key = id_to_bytes32(id).ok_or_else(|| PaymentError::NotFound(id.to_string()))?;

        // Claim
        let amount_wei = {
            let mut invoice = entry.lock().await;
            match invoice.status {
                InvoiceStatus::Processing => return Err(PaymentError::AlreadyProcessing),
                status if status.is_final() => return Err(PaymentError::AlreadyFinalized(status)),
                _ => {}
            }

            let now = self.clock.now();
            let mut next = invoice.clone();
            next.updated_at = now;
            if now > invoice.expires_at {
                next.status = InvoiceStatus::Expired;
                self.persist(&next)?;
                *invoice = next;
                tracing::info!(invoice_id = %id, "Invoice expired");
                return Err(PaymentError::Expired);
            }
            next.status = InvoiceStatus::Processing;
            self.persist(&next)?;
            *invoice = next;
            invoice.amount_wei()
        };

        let call = ContractCall::new(
            self.pos_contract,
            process_payment_calldata(invoice_key, customer, amount_wei),
            invoice_key,
        );
        let result = submit_with_retry(self.chain.as_ref(), call, &self.retry).await;

        // Commit
        let mut invoice = entry.lock().await;
        let mut next = invoice.clone();
        next.updated_at = self.clock.now();
        let outcome = match result {
            Ok(tx_hash) => {
                next.status = InvoiceStatus::Paid;
                next.payer = Some(customer.to_string());
                next.tx_hash = Some(tx_hash.to_string());
                tracing::info!(invoice_id = %id, customer = %customer, tx_hash = %tx_hash, "Invoice paid");
                Ok(tx_hash)
            }
            Err(e) if !e.is_retryable() => {
                next.status = InvoiceStatus::Failed;
                next.failure_reason = Some(e.to_string());
                tracing::warn!(invoice_id = %id, error = %e, "Invoice payment rejected by chain");
                Err(PaymentError::SubmissionFailed(e))
            }
            Err(e) => {
                next.status = InvoiceStatus::Pending;
                tracing::warn!(invoice_id = %id, error = %e, "Invoice payment not submitted, back to pending");
                Err(PaymentError::SubmissionFailed(e))
            }
        };
        // The chain outcome stands even if the write-through fails
        if let Err(e) = self.persist(&next) {
            tracing::error!(invoice_id = %id, error = %e, "Failed to persist invoice outcome");
        }
        *invoice = next;
        outcome
    }
}
