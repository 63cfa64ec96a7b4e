// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Wallet balances and relayed VYR transfers.

use std::sync::Arc;

use alloy::primitives::{keccak256, Address, B256, U256};

use crate::blockchain::amounts::{parse_positive_amount, AmountError};
use crate::blockchain::client::{ChainClient, ChainClientError};
use crate::blockchain::contracts::transfer_from_calldata;
use crate::blockchain::retry::{submit_with_retry, RetryPolicy};
use crate::blockchain::signing::{parse_address, parse_signature, signature_key, transfer_payload};
use crate::blockchain::types::{ContractCall, VYRA_DECIMALS};
use crate::error::{DomainError, ErrorKind};
use crate::services::session::SessionKeyManager;
use crate::storage::dedup::{ReplayError, RequestDedup};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(AmountError),

    #[error("signature is not valid for this wallet")]
    Unauthorized,

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("balance query failed: {0}")]
    Chain(ChainClientError),

    #[error("transfer submission failed: {0}")]
    SubmissionFailed(ChainClientError),
}

impl DomainError for WalletError {
    fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidAddress(_) | WalletError::InvalidAmount(_) => ErrorKind::Validation,
            WalletError::Unauthorized => ErrorKind::Unauthorized,
            WalletError::Replay(e) => e.kind(),
            WalletError::Chain(_) | WalletError::SubmissionFailed(_) => ErrorKind::Chain,
        }
    }
}

fn wallet_address(address: &str) -> Result<Address, WalletError> {
    parse_address(address).map_err(|e| WalletError::InvalidAddress(e.to_string()))
}

pub struct WalletService {
    sessions: Arc<SessionKeyManager>,
    chain: Arc<dyn ChainClient>,
    dedup: Arc<RequestDedup>,
    vyra_token: Address,
    retry: RetryPolicy,
}

impl WalletService {
    pub fn new(
        sessions: Arc<SessionKeyManager>,
        chain: Arc<dyn ChainClient>,
        dedup: Arc<RequestDedup>,
        vyra_token: Address,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            sessions,
            chain,
            dedup,
            vyra_token,
            retry,
        }
    }

    /// Native balance in wei.
    pub async fn balance(&self, address: &str) -> Result<U256, WalletError> {
        let address = wallet_address(address)?;
        self.chain
            .native_balance(address)
            .await
            .map_err(WalletError::Chain)
    }

    /// VYR balance in base units.
    pub async fn vyra_balance(&self, address: &str) -> Result<U256, WalletError> {
        let address = wallet_address(address)?;
        self.chain
            .token_balance(self.vyra_token, address)
            .await
            .map_err(WalletError::Chain)
    }

    /// Relay a VYR `transferFrom(from, to, amount)` signed by `from` or its
    /// session key over `(from, to, amount, deadline)`.
    pub async fn send(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        deadline: u64,
        signature: &str,
    ) -> Result<B256, WalletError> {
        let from = wallet_address(from)?;
        let to = wallet_address(to)?;
        let amount_wei =
            parse_positive_amount(amount, VYRA_DECIMALS).map_err(WalletError::InvalidAmount)?;
        let expires_at = self.dedup.check_deadline(deadline)?;

        let payload = transfer_payload(from, to, amount_wei, deadline);
        if !self.sessions.is_authorized(from, signature, payload) {
            tracing::warn!(from = %from, "Rejected transfer with invalid signature");
            return Err(WalletError::Unauthorized);
        }
        let parsed = parse_signature(signature).map_err(|_| WalletError::Unauthorized)?;
        let dedup_key = signature_key(&parsed);
        self.dedup.reserve(&dedup_key, expires_at)?;

        let call = ContractCall::new(
            self.vyra_token,
            transfer_from_calldata(from, to, amount_wei),
            keccak256(dedup_key.as_bytes()),
        );
        match submit_with_retry(self.chain.as_ref(), call, &self.retry).await {
            Ok(tx_hash) => {
                self.dedup.complete(&dedup_key, Some(tx_hash));
                tracing::info!(from = %from, to = %to, amount = %amount_wei, tx_hash = %tx_hash, "Transfer relayed");
                Ok(tx_hash)
            }
            Err(e) => {
                self.dedup.release(&dedup_key);
                Err(WalletError::SubmissionFailed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::contracts::IERC20;
    use crate::blockchain::signing::{random_signer, sign_payload};
    use crate::clock::{Clock, SystemClock};
    use crate::test_support::MockChainClient;
    use alloy::sol_types::SolCall;
    use std::time::Duration;

    fn token() -> Address {
        Address::repeat_byte(0x7a)
    }

    fn soon() -> u64 {
        (SystemClock.now() + chrono::Duration::minutes(5)).timestamp() as u64
    }

    fn service() -> (WalletService, Arc<MockChainClient>) {
        let chain = Arc::new(MockChainClient::new());
        let sessions = Arc::new(SessionKeyManager::new(
            Arc::new(SystemClock),
            chrono::Duration::days(30),
        ));
        let dedup = RequestDedup::new(
            "send",
            100,
            chrono::Duration::minutes(10),
            Arc::new(SystemClock),
            None,
        );
        let service = WalletService::new(
            sessions,
            chain.clone(),
            Arc::new(dedup),
            token(),
            RetryPolicy::new(1, Duration::from_millis(1)),
        );
        (service, chain)
    }

    #[tokio::test]
    async fn balances_come_from_chain() {
        let (service, chain) = service();
        let holder = Address::repeat_byte(0x01);
        chain.set_native_balance(holder, U256::from(5u64));
        chain.set_token_balance(token(), holder, U256::from(7u64));

        let address = holder.to_string();
        assert_eq!(service.balance(&address).await.unwrap(), U256::from(5u64));
        assert_eq!(service.vyra_balance(&address).await.unwrap(), U256::from(7u64));
        assert!(matches!(
            service.balance("0xnope").await,
            Err(WalletError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn rpc_failure_is_chain_error() {
        let (service, chain) = service();
        chain.set_rpc_down(true);
        let err = service
            .balance(&Address::repeat_byte(1).to_string())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Chain);
    }

    #[tokio::test]
    async fn signed_send_is_relayed_once() {
        let (service, chain) = service();
        let owner = random_signer();
        let to = Address::repeat_byte(0x02);
        let amount = U256::from(2u64) * U256::from(10u64).pow(U256::from(18u64));
        let deadline = soon();
        let signature =
            sign_payload(&owner, transfer_payload(owner.address(), to, amount, deadline)).unwrap();

        let from = owner.address().to_string();
        service
            .send(&from, &to.to_string(), "2", deadline, &signature)
            .await
            .unwrap();

        let submitted = chain.submitted();
        assert_eq!(submitted[0].to, token());
        let decoded = IERC20::transferFromCall::abi_decode(&submitted[0].data).unwrap();
        assert_eq!(decoded.from, owner.address());
        assert_eq!(decoded.to, to);
        assert_eq!(decoded.amount, amount);

        let err = service
            .send(&from, &to.to_string(), "2", deadline, &signature)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Replay(ReplayError::Duplicate(_))));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(chain.submitted().len(), 1);
    }

    #[tokio::test]
    async fn send_to_other_recipient_is_unauthorized() {
        let (service, _) = service();
        let owner = random_signer();
        let amount = U256::from(10u64).pow(U256::from(18u64));
        let deadline = soon();
        let signature = sign_payload(
            &owner,
            transfer_payload(owner.address(), Address::repeat_byte(0x02), amount, deadline),
        )
        .unwrap();

        assert_eq!(
            service
                .send(
                    &owner.address().to_string(),
                    &Address::repeat_byte(0x03).to_string(),
                    "1",
                    deadline,
                    &signature
                )
                .await,
            Err(WalletError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn expired_send_is_rejected_before_submission() {
        let (service, chain) = service();
        let owner = random_signer();
        let to = Address::repeat_byte(0x02);
        let deadline = (SystemClock.now() - chrono::Duration::seconds(1)).timestamp() as u64;
        let amount = U256::from(10u64).pow(U256::from(18u64));
        let signature =
            sign_payload(&owner, transfer_payload(owner.address(), to, amount, deadline)).unwrap();

        assert_eq!(
            service
                .send(&owner.address().to_string(), &to.to_string(), "1", deadline, &signature)
                .await,
            Err(WalletError::Replay(ReplayError::Expired))
        );
        assert!(chain.submitted().is_empty());
    }
}
