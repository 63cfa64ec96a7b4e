// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Vyra Relay Server - transaction authorization and settlement backend
//!
//! This crate authorizes and relays value transfers on behalf of key-holding
//! users: session-key signatures, sponsored gas, invoices paid through the
//! POS contract, and bridge withdrawals attested by a validator threshold.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - EVM chain access, contract calldata and signatures
//! - `services` - Identity, session keys, paymaster, bridge and payments
//! - `settlement` - Background worker driving bridge transfers to completion
//! - `storage` - Request dedup and the optional redb ledger

pub mod api;
pub mod blockchain;
pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod services;
pub mod settlement;
pub mod state;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test_support;
