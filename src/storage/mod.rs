// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! # Storage
//!
//! - [`dedup`]: replay records of signed relay requests, kept until each
//!   request's deadline
//! - [`ledger_store`]: optional redb database for invoices, bridge
//!   transfers and replay records, enabled by `DATA_DIR`
//!
//! ```text
//! $DATA_DIR/
//!   ledger.redb
//! ```

pub mod dedup;
pub mod ledger_store;

pub use dedup::{DedupState, ReplayError, RequestDedup};
pub use ledger_store::{LedgerStore, LedgerStoreError};
