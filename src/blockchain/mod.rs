// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Blockchain integration for the Vyra home chain (L1) and remote chain (L2).
//!
//! This module provides functionality for:
//! - Querying native and VYR token balances
//! - Building calldata for the paymaster, POS and bridge contracts
//! - Signature recovery for user, session-key and validator signatures
//! - Submitting contract calls from the funding account, with retry

pub mod amounts;
pub mod client;
pub mod contracts;
pub mod retry;
pub mod signing;
pub mod types;

pub use amounts::{format_amount, parse_amount, parse_positive_amount, AmountError};
pub use client::{ChainClient, ChainClientError, EvmChainClient};
pub use retry::{submit_with_retry, RetryPolicy};
pub use signing::SigningError;
pub use types::*;
