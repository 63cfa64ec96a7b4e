// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Shared test fixtures: an in-memory chain client and validator keys.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{keccak256, Address, Log, B256, U256};
use alloy::sol_types::SolEvent;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::blockchain::client::{ChainClient, ChainClientError};
use crate::blockchain::contracts::IVyraBridge;
use crate::blockchain::signing::{random_signer, sign_payload, withdrawal_payload};
use crate::blockchain::types::{local_network, ContractCall, NetworkConfig, TxReceipt};

#[derive(Default)]
struct MockState {
    attempts: usize,
    submitted: Vec<ContractCall>,
    failures: VecDeque<ChainClientError>,
    receipts: HashMap<B256, TxReceipt>,
    native_balances: HashMap<Address, U256>,
    token_balances: HashMap<(Address, Address), U256>,
    rpc_down: bool,
}

/// In-memory [`ChainClient`].
///
/// Submissions succeed unless failures were scripted with
/// [`MockChainClient::fail_next`]; the tx hash is derived from the
/// idempotency key so a resubmitted call yields the same hash. Submitted
/// calls are mined successfully unless a receipt was set explicitly.
pub struct MockChainClient {
    network: NetworkConfig,
    sender: Address,
    delay: Option<Duration>,
    state: Mutex<MockState>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::with_chain_id(31337)
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            network: local_network("http://localhost:8545", chain_id),
            sender: Address::repeat_byte(0xfe),
            delay: None,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Delay every submission, to widen race windows in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `times` submissions with `error`.
    pub fn fail_next(&self, times: usize, error: ChainClientError) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..times {
            state.failures.push_back(error.clone());
        }
    }

    /// Simulate an unreachable RPC endpoint for reads.
    pub fn set_rpc_down(&self, down: bool) {
        self.state.lock().unwrap().rpc_down = down;
    }

    /// Mined receipt for `tx_hash` with the given contract and logs.
    pub fn set_receipt(&self, tx_hash: B256, success: bool, to: Option<Address>, logs: Vec<Log>) {
        self.state.lock().unwrap().receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block_number: 1,
                gas_used: 21_000,
                success,
                to,
                logs,
            },
        );
    }

    /// Successful `deposit(depositId, amount)` call on `bridge`.
    pub fn set_deposit_receipt(&self, tx_hash: B256, bridge: Address, deposit_id: B256, amount: U256) {
        let event = IVyraBridge::Deposited {
            depositId: deposit_id,
            sender: Address::repeat_byte(0xde),
            amount,
        };
        let log = Log {
            address: bridge,
            data: event.encode_log_data(),
        };
        self.set_receipt(tx_hash, true, Some(bridge), vec![log]);
    }

    pub fn set_native_balance(&self, address: Address, balance: U256) {
        self.state
            .lock()
            .unwrap()
            .native_balances
            .insert(address, balance);
    }

    pub fn set_token_balance(&self, token: Address, holder: Address, balance: U256) {
        self.state
            .lock()
            .unwrap()
            .token_balances
            .insert((token, holder), balance);
    }

    /// Calls that were accepted, in order.
    pub fn submitted(&self) -> Vec<ContractCall> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Number of `submit` invocations, including failed ones.
    pub fn submit_attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    /// Hash the mock assigns to a call with this idempotency key.
    pub fn tx_hash_for(key: B256) -> B256 {
        keccak256(key)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn block_number(&self) -> Result<u64, ChainClientError> {
        let state = self.state.lock().unwrap();
        if state.rpc_down {
            return Err(ChainClientError::Rpc("connection refused".into()));
        }
        Ok(state.submitted.len() as u64 + 1)
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainClientError> {
        let state = self.state.lock().unwrap();
        if state.rpc_down {
            return Err(ChainClientError::Rpc("connection refused".into()));
        }
        Ok(state
            .native_balances
            .get(&address)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn token_balance(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainClientError> {
        let state = self.state.lock().unwrap();
        if state.rpc_down {
            return Err(ChainClientError::Rpc("connection refused".into()));
        }
        Ok(state
            .token_balances
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn submit(&self, call: ContractCall) -> Result<B256, ChainClientError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        let tx_hash = Self::tx_hash_for(call.idempotency_key);
        if !state.submitted.iter().any(|c| c.idempotency_key == call.idempotency_key) {
            state.submitted.push(call);
        }
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainClientError> {
        let state = self.state.lock().unwrap();
        if state.rpc_down {
            return Err(ChainClientError::Rpc("connection refused".into()));
        }
        if let Some(receipt) = state.receipts.get(&tx_hash) {
            return Ok(Some(receipt.clone()));
        }
        let mined = state
            .submitted
            .iter()
            .find(|c| Self::tx_hash_for(c.idempotency_key) == tx_hash);
        Ok(mined.map(|call| TxReceipt {
            tx_hash,
            block_number: 1,
            gas_used: 21_000,
            success: true,
            to: Some(call.to),
            logs: Vec::new(),
        }))
    }
}

/// A validator set of fresh random keys.
pub fn validator_keys(count: usize) -> Vec<PrivateKeySigner> {
    (0..count).map(|_| random_signer()).collect()
}

/// Validator signature over a withdrawal of `amount` backed by `tx_hash`.
pub fn sign_withdrawal(signer: &PrivateKeySigner, amount: U256, tx_hash: B256) -> String {
    sign_payload(signer, withdrawal_payload(amount, tx_hash)).unwrap()
}
