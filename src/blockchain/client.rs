// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Chain client abstraction and its alloy-backed EVM implementation.
//!
//! Core components only see [`ChainClient`]: balance reads, contract-call
//! submission from the service's funding account, and receipt lookups.
//! One client exists per chain (home/L1 and remote/L2).

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, B256, U256},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use lru::LruCache;

use super::contracts::IERC20;
use super::types::{ContractCall, NetworkConfig, TxReceipt};

/// Errors that can occur during blockchain operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl ChainClientError {
    /// Whether resubmitting the same call may succeed.
    ///
    /// A revert is a verdict from the chain; everything else is transport.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ChainClientError::Reverted(_) | ChainClientError::InvalidRpcUrl(_)
        )
    }
}

/// Read and submit access to one chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Network this client talks to.
    fn network(&self) -> &NetworkConfig;

    /// Account that signs and pays for submitted calls.
    fn sender(&self) -> Address;

    /// Current block number (used for health checks).
    async fn block_number(&self) -> Result<u64, ChainClientError>;

    /// Native coin balance in wei.
    async fn native_balance(&self, address: Address) -> Result<U256, ChainClientError>;

    /// ERC-20 balance in token base units.
    async fn token_balance(&self, token: Address, holder: Address)
        -> Result<U256, ChainClientError>;

    /// Sign and broadcast a contract call, returning the transaction hash.
    async fn submit(&self, call: ContractCall) -> Result<B256, ChainClientError>;

    /// Receipt for a transaction, `None` while it is not yet mined.
    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainClientError>;
}

/// HTTP provider with nonce/gas/chain-id fillers and the funding wallet.
type SigningProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Number of idempotency keys remembered per client.
const RECENT_SUBMISSIONS: usize = 4096;

/// Default bound on a single broadcast.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// EVM chain client signing with the service funding account.
pub struct EvmChainClient {
    network: NetworkConfig,
    sender: Address,
    provider: SigningProvider,
    submit_timeout: Duration,
    /// Serializes broadcasts from the funding account so nonces never race.
    submit_lock: tokio::sync::Mutex<()>,
    /// idempotency key → tx hash of calls already broadcast
    recent_submissions: Mutex<LruCache<B256, B256>>,
}

impl EvmChainClient {
    /// Create a client for `network` that signs with `funding`.
    pub fn new(
        network: NetworkConfig,
        funding: PrivateKeySigner,
        submit_timeout: Duration,
    ) -> Result<Self, ChainClientError> {
        let url: url::Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let sender = funding.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(funding))
            .connect_http(url);

        Ok(Self {
            network,
            sender,
            provider,
            submit_timeout,
            submit_lock: tokio::sync::Mutex::new(()),
            recent_submissions: Mutex::new(LruCache::new(
                NonZeroUsize::new(RECENT_SUBMISSIONS).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    fn recent(&self) -> MutexGuard<'_, LruCache<B256, B256>> {
        self.recent_submissions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn remembered(&self, key: &B256) -> Option<B256> {
        self.recent().get(key).copied()
    }

    fn remember(&self, key: B256, tx_hash: B256) {
        self.recent().put(key, tx_hash);
    }

    /// Get current EIP-1559 fees from the network.
    async fn gas_prices(&self) -> Result<(u128, u128), ChainClientError> {
        let block = self
            .provider
            .get_block_by_number(alloy::eips::BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainClientError::Rpc(format!("Failed to get block: {}", e)))?
            .ok_or_else(|| ChainClientError::Rpc("No latest block".to_string()))?;

        let base_fee: u128 = block
            .header
            .base_fee_per_gas
            .map(|f| f as u128)
            .unwrap_or(25_000_000_000u128); // 25 gwei default

        let priority_fee: u128 = 1_500_000_000; // 1.5 gwei

        // Max fee = 2 * base_fee + priority_fee (allows for base fee increase)
        let max_fee = base_fee.saturating_mul(2).saturating_add(priority_fee);

        Ok((max_fee, priority_fee))
    }
}

/// Map a broadcast failure, separating reverts from transport errors.
fn classify_send_error(message: String) -> ChainClientError {
    if message.to_ascii_lowercase().contains("revert") {
        ChainClientError::Reverted(message)
    } else {
        ChainClientError::TransactionFailed(message)
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn block_number(&self) -> Result<u64, ChainClientError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))
    }

    async fn native_balance(&self, address: Address) -> Result<U256, ChainClientError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))
    }

    async fn token_balance(
        &self,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainClientError> {
        let contract = IERC20::new(token, self.provider.clone());
        contract
            .balanceOf(holder)
            .call()
            .await
            .map_err(|e| ChainClientError::Contract(e.to_string()))
    }

    async fn submit(&self, call: ContractCall) -> Result<B256, ChainClientError> {
        if let Some(tx_hash) = self.remembered(&call.idempotency_key) {
            tracing::info!(
                network = %self.network.name,
                tx_hash = %tx_hash,
                "Call already broadcast, returning existing hash"
            );
            return Ok(tx_hash);
        }

        let _guard = self.submit_lock.lock().await;
        // A concurrent duplicate may have finished while we waited.
        if let Some(tx_hash) = self.remembered(&call.idempotency_key) {
            return Ok(tx_hash);
        }

        let (max_fee_per_gas, priority_fee) = self.gas_prices().await?;
        let tx = TransactionRequest::default()
            .to(call.to)
            .input(call.data.into())
            .value(call.value)
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(priority_fee);

        let pending = tokio::time::timeout(self.submit_timeout, self.provider.send_transaction(tx))
            .await
            .map_err(|_| ChainClientError::Timeout(self.submit_timeout))?
            .map_err(|e| classify_send_error(e.to_string()))?;

        let tx_hash = *pending.tx_hash();
        self.remember(call.idempotency_key, tx_hash);

        tracing::info!(
            network = %self.network.name,
            to = %call.to,
            tx_hash = %tx_hash,
            "Broadcast contract call"
        );
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, ChainClientError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainClientError::Rpc(format!("Failed to get receipt: {}", e)))?;

        Ok(receipt.map(|r| TxReceipt {
            tx_hash,
            block_number: r.block_number.unwrap_or(0),
            gas_used: r.gas_used as u64,
            success: r.status(),
            to: r.to,
            logs: r.inner.logs().iter().map(|log| log.inner.clone()).collect(),
        }))
    }
}
