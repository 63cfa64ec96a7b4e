// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! Invoices and bridge transfers are written through on every committed
//! state change and loaded once at startup. Withdrawal claims are rebuilt
//! from the stored withdrawals. Consumed signed requests are kept until
//! their deadline so replays stay rejected across restarts. Session keys
//! are never written here.
//!
//! ## Table Layout
//!
//! - `invoices`: invoice id → JSON `Invoice`
//! - `bridge_transfers`: transfer id → JSON `BridgeTransfer`
//! - `consumed_requests`: `<namespace>:<signature>` → JSON `ConsumedRequest`

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::services::bridge::BridgeTransfer;
use crate::services::payment::Invoice;

/// File name of the database inside `DATA_DIR`.
pub const LEDGER_FILE_NAME: &str = "ledger.redb";

/// id → JSON record
type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

const INVOICES: JsonTable = TableDefinition::new("invoices");

const BRIDGE_TRANSFERS: JsonTable = TableDefinition::new("bridge_transfers");

const CONSUMED_REQUESTS: JsonTable = TableDefinition::new("consumed_requests");

/// A signed request that was accepted, remembered until its deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedRequest {
    pub expires_at: DateTime<Utc>,
    /// Hash of the relayed transaction, once broadcast
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LedgerStoreResult<T> = Result<T, LedgerStoreError>;

/// Durable copy of the invoice and bridge tables.
pub struct LedgerStore {
    db: Database,
}

impl LedgerStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> LedgerStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(INVOICES)?;
            let _ = write_txn.open_table(BRIDGE_TRANSFERS)?;
            let _ = write_txn.open_table(CONSUMED_REQUESTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn put<T: Serialize>(
        &self,
        table: JsonTable,
        key: &str,
        value: &T,
    ) -> LedgerStoreResult<()> {
        let json = serde_json::to_vec(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(table)?;
            table.insert(key, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn load_all<T: DeserializeOwned>(
        &self,
        table: JsonTable,
    ) -> LedgerStoreResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table)?;
        let mut records = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            match serde_json::from_slice(value.value()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(key = key.value(), error = %e, "Skipping malformed ledger record");
                }
            }
        }
        Ok(records)
    }

    pub fn put_invoice(&self, invoice: &Invoice) -> LedgerStoreResult<()> {
        self.put(INVOICES, &invoice.id, invoice)
    }

    pub fn load_invoices(&self) -> LedgerStoreResult<Vec<Invoice>> {
        self.load_all(INVOICES)
    }

    pub fn put_transfer(&self, transfer: &BridgeTransfer) -> LedgerStoreResult<()> {
        self.put(BRIDGE_TRANSFERS, &transfer.id, transfer)
    }

    pub fn load_transfers(&self) -> LedgerStoreResult<Vec<BridgeTransfer>> {
        self.load_all(BRIDGE_TRANSFERS)
    }

    pub fn put_consumed(&self, key: &str, record: &ConsumedRequest) -> LedgerStoreResult<()> {
        self.put(CONSUMED_REQUESTS, key, record)
    }

    pub fn remove_consumed(&self, key: &str) -> LedgerStoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONSUMED_REQUESTS)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Live consumed requests under `prefix`, dropping those expired by `now`.
    pub fn load_consumed(
        &self,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> LedgerStoreResult<Vec<(String, ConsumedRequest)>> {
        let mut live = Vec::new();
        let mut expired = Vec::new();
        {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(CONSUMED_REQUESTS)?;
            for item in table.iter()? {
                let (key, value) = item?;
                let key = key.value();
                if !key.starts_with(prefix) {
                    continue;
                }
                match serde_json::from_slice::<ConsumedRequest>(value.value()) {
                    Ok(record) if record.expires_at > now => live.push((key.to_string(), record)),
                    Ok(_) => expired.push(key.to_string()),
                    Err(e) => {
                        tracing::warn!(key, error = %e, "Skipping malformed consumed request");
                    }
                }
            }
        }

        if !expired.is_empty() {
            let write_txn = self.db.begin_write()?;
            {
                let mut table = write_txn.open_table(CONSUMED_REQUESTS)?;
                for key in &expired {
                    table.remove(key.as_str())?;
                }
            }
            write_txn.commit()?;
            tracing::debug!(count = expired.len(), prefix, "Pruned expired consumed requests");
        }
        Ok(live)
    }

    /// Whether the database answers reads (used by the readiness check).
    pub fn is_healthy(&self) -> bool {
        self.db
            .begin_read()
            .ok()
            .and_then(|txn| txn.open_table(INVOICES).ok())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::bridge::{TransferDirection, TransferStatus};
    use crate::services::payment::InvoiceStatus;
    use chrono::Utc;

    fn temp_store() -> (LedgerStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(&dir.path().join("ledger.redb")).unwrap();
        (store, dir)
    }

    fn sample_invoice(id: &str) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: id.to_string(),
            amount: "1.5".to_string(),
            amount_wei: "1500000000000000000".to_string(),
            description: "coffee".to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
            status: InvoiceStatus::Pending,
            payer: None,
            tx_hash: None,
            failure_reason: None,
            updated_at: now,
        }
    }

    fn sample_transfer(id: &str) -> BridgeTransfer {
        let now = Utc::now();
        BridgeTransfer {
            id: id.to_string(),
            direction: TransferDirection::Withdrawal,
            amount: "10".to_string(),
            amount_wei: "10000000000000000000".to_string(),
            source_tx_hash: Some(format!("0x{}", "ab".repeat(32))),
            validators: vec![],
            signatures: vec![],
            settlement_tx_hash: None,
            status: TransferStatus::Pending,
            failure_reason: None,
            settlement_attempts: 0,
            settlement_in_flight: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn invoices_round_trip_through_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.redb");
        {
            let store = LedgerStore::open(&path).unwrap();
            store.put_invoice(&sample_invoice("inv-1")).unwrap();
            let mut paid = sample_invoice("inv-2");
            paid.status = InvoiceStatus::Paid;
            store.put_invoice(&paid).unwrap();
        }

        let store = LedgerStore::open(&path).unwrap();
        let mut invoices = store.load_invoices().unwrap();
        invoices.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[1].status, InvoiceStatus::Paid);
    }

    #[test]
    fn put_overwrites_existing_record() {
        let (store, _dir) = temp_store();
        let mut transfer = sample_transfer("t-1");
        store.put_transfer(&transfer).unwrap();

        transfer.status = TransferStatus::Confirmed;
        store.put_transfer(&transfer).unwrap();

        let transfers = store.load_transfers().unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].status, TransferStatus::Confirmed);
    }

    #[test]
    fn consumed_requests_load_by_prefix_and_prune_expired() {
        let (store, _dir) = temp_store();
        let now = Utc::now();
        let live = ConsumedRequest {
            expires_at: now + chrono::Duration::minutes(5),
            tx_hash: Some(format!("0x{}", "cd".repeat(32))),
        };
        let stale = ConsumedRequest {
            expires_at: now - chrono::Duration::seconds(1),
            tx_hash: None,
        };
        store.put_consumed("sponsor:aa", &live).unwrap();
        store.put_consumed("sponsor:bb", &stale).unwrap();
        store.put_consumed("send:cc", &live).unwrap();

        let loaded = store.load_consumed("sponsor:", now).unwrap();
        assert_eq!(loaded, vec![("sponsor:aa".to_string(), live.clone())]);

        // The expired record is gone for good
        let later = store.load_consumed("sponsor:", now - chrono::Duration::minutes(1)).unwrap();
        assert_eq!(later.len(), 1);

        store.remove_consumed("send:cc").unwrap();
        assert!(store.load_consumed("send:", now).unwrap().is_empty());
    }

    #[test]
    fn empty_store_loads_nothing() {
        let (store, _dir) = temp_store();
        assert!(store.load_invoices().unwrap().is_empty());
        assert!(store.load_transfers().unwrap().is_empty());
        assert!(store.is_healthy());
    }
}
