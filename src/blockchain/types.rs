// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Blockchain types shared by the chain client and the core components.

use alloy::primitives::{Address, Bytes, Log, B256, U256};

/// Decimals of the native coin and of the VYR token.
pub const VYRA_DECIMALS: u8 = 18;

/// EVM network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Network name for display and logs
    pub name: String,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: String,
}

/// Network named after its chain id.
pub fn local_network(rpc_url: impl Into<String>, chain_id: u64) -> NetworkConfig {
    NetworkConfig {
        name: format!("chain-{chain_id}"),
        chain_id,
        rpc_url: rpc_url.into(),
    }
}

/// A contract call the service submits from its funding account.
///
/// `idempotency_key` identifies the logical request; resubmitting a call
/// with the same key must not broadcast a second transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    /// Target contract
    pub to: Address,
    /// ABI-encoded calldata
    pub data: Bytes,
    /// Native value attached to the call
    pub value: U256,
    /// Request-scoped dedup key
    pub idempotency_key: B256,
}

impl ContractCall {
    pub fn new(to: Address, data: impl Into<Bytes>, idempotency_key: B256) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::ZERO,
            idempotency_key,
        }
    }
}

/// Transaction receipt as observed on chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: B256,
    /// Block number where transaction was included
    pub block_number: u64,
    /// Gas actually used
    pub gas_used: u64,
    /// Whether the transaction was successful
    pub success: bool,
    /// Called contract, `None` for contract creations
    pub to: Option<Address>,
    /// Emitted logs
    pub logs: Vec<Log>,
}
