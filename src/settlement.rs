// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! # Bridge Settlement Worker
//!
//! Background task that drives confirmed bridge transfers to completion.
//!
//! ## Strategy
//!
//! Every `poll_interval` (default 15 s) the worker lists all non-terminal
//! transfers and, for each:
//! 1. Pending deposit with a source hash: looks up the L1 receipt. The
//!    deposit is confirmed only if the transaction called the home bridge
//!    and logged `Deposited` with this transfer's id and amount; a revert
//!    or any other transaction fails it.
//! 2. Confirmed transfer not yet submitted: submits the destination call
//!    (`processDeposit` on L2, `releaseWithdrawal` on L1) from the funding
//!    account. After `MAX_SETTLEMENT_ATTEMPTS` failed sweeps the transfer
//!    is failed.
//! 3. Confirmed transfer with a settlement hash: looks up the destination
//!    receipt; success settles it, a revert fails it.
//!
//! Pending withdrawals are left alone until enough signatures arrive.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::blockchain::client::ChainClient;
use crate::blockchain::contracts::{
    deposited_events, process_deposit_calldata, release_withdrawal_calldata,
};
use crate::blockchain::retry::{submit_with_retry, RetryPolicy};
use crate::blockchain::types::{ContractCall, TxReceipt};
use crate::ids::id_to_bytes32;
use crate::services::bridge::{
    BridgeCoordinator, BridgeError, BridgeTransfer, TransferDirection, TransferStatus,
};

/// Default interval between settlement sweeps.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Failed submission sweeps before a transfer is given up.
pub const MAX_SETTLEMENT_ATTEMPTS: u32 = 5;

/// A chain client together with the bridge contract deployed on it.
#[derive(Clone)]
pub struct ChainEndpoint {
    pub client: Arc<dyn ChainClient>,
    pub bridge: Address,
}

/// What a single sweep changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub confirmed: usize,
    pub submitted: usize,
    pub settled: usize,
    pub failed: usize,
}

pub struct SettlementWorker {
    bridge: Arc<BridgeCoordinator>,
    /// Home chain: deposit sources, withdrawal releases
    l1: ChainEndpoint,
    /// Remote chain: deposit settlement
    l2: ChainEndpoint,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl SettlementWorker {
    pub fn new(
        bridge: Arc<BridgeCoordinator>,
        l1: ChainEndpoint,
        l2: ChainEndpoint,
        poll_interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            bridge,
            l1,
            l2,
            poll_interval,
            retry,
        }
    }

    /// Run the worker loop until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "Settlement worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Settlement worker shutting down");
                return;
            }

            let report = self.step().await;
            if report != SweepReport::default() {
                info!(
                    confirmed = report.confirmed,
                    submitted = report.submitted,
                    settled = report.settled,
                    failed = report.failed,
                    "Settlement sweep"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Settlement worker shutting down");
                    return;
                }
            }
        }
    }

    fn destination(&self, direction: TransferDirection) -> &ChainEndpoint {
        match direction {
            TransferDirection::Deposit => &self.l2,
            TransferDirection::Withdrawal => &self.l1,
        }
    }

    /// Execute one sweep over all in-flight transfers.
    pub async fn step(&self) -> SweepReport {
        let mut report = SweepReport::default();
        for transfer in self.bridge.list_in_flight().await {
            let result = match transfer.status {
                TransferStatus::Pending if transfer.direction == TransferDirection::Deposit => {
                    self.observe_deposit_source(&transfer, &mut report).await
                }
                TransferStatus::Confirmed if transfer.settlement_tx_hash.is_some() => {
                    self.observe_settlement(&transfer, &mut report).await
                }
                TransferStatus::Confirmed if !transfer.settlement_in_flight => {
                    self.submit_settlement(&transfer, &mut report).await
                }
                _ => Ok(()),
            };
            if let Err(e) = result {
                warn!(transfer_id = %transfer.id, error = %e, "Settlement step failed");
            }
        }
        report
    }

    async fn observe_deposit_source(
        &self,
        transfer: &BridgeTransfer,
        report: &mut SweepReport,
    ) -> Result<(), BridgeError> {
        let Some(source) = transfer.source_hash() else {
            return Ok(());
        };
        match self.l1.client.receipt(source).await {
            Ok(Some(receipt)) if receipt.success => {
                if self.deposit_matches(transfer, &receipt) {
                    self.bridge.confirm_deposit(&transfer.id).await?;
                    report.confirmed += 1;
                } else {
                    warn!(
                        transfer_id = %transfer.id,
                        source_tx = %source,
                        "Deposit source does not lock this transfer on the home bridge"
                    );
                    self.bridge
                        .mark_failed(&transfer.id, "deposit source does not match this transfer")
                        .await?;
                    report.failed += 1;
                }
            }
            Ok(Some(_)) => {
                self.bridge
                    .mark_failed(&transfer.id, "deposit source transaction reverted")
                    .await?;
                report.failed += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(transfer_id = %transfer.id, error = %e, "Could not fetch deposit receipt");
            }
        }
        Ok(())
    }

    /// Whether `receipt` is a call to the home bridge that emitted a
    /// `Deposited` event for this transfer's id and exact amount.
    fn deposit_matches(&self, transfer: &BridgeTransfer, receipt: &TxReceipt) -> bool {
        let Some(deposit_id) = id_to_bytes32(&transfer.id) else {
            return false;
        };
        receipt.to == Some(self.l1.bridge)
            && deposited_events(&receipt.logs, self.l1.bridge)
                .iter()
                .any(|event| event.depositId == deposit_id && event.amount == transfer.amount_wei())
    }

    async fn observe_settlement(
        &self,
        transfer: &BridgeTransfer,
        report: &mut SweepReport,
    ) -> Result<(), BridgeError> {
        let Some(tx_hash) = transfer.settlement_hash() else {
            return Ok(());
        };
        let destination = self.destination(transfer.direction);
        match destination.client.receipt(tx_hash).await {
            Ok(Some(receipt)) if receipt.success => {
                self.bridge.mark_settled(&transfer.id, tx_hash).await?;
                report.settled += 1;
            }
            Ok(Some(_)) => {
                self.bridge
                    .mark_failed(&transfer.id, "settlement transaction reverted")
                    .await?;
                report.failed += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(transfer_id = %transfer.id, error = %e, "Could not fetch settlement receipt");
            }
        }
        Ok(())
    }

    fn settlement_call(&self, transfer: &BridgeTransfer) -> Result<ContractCall, BridgeError> {
        let key = id_to_bytes32(&transfer.id).ok_or_else(|| BridgeError::NotFound(transfer.id.clone()))?;
        let destination = self.destination(transfer.direction);
        let data = match transfer.direction {
            TransferDirection::Deposit => process_deposit_calldata(key, transfer.amount_wei()),
            TransferDirection::Withdrawal => {
                let source = transfer.source_hash().ok_or_else(|| {
                    BridgeError::InvalidTxHash("withdrawal has no source hash".to_string())
                })?;
                let signatures = transfer
                    .signatures
                    .iter()
                    .filter_map(|s| alloy::hex::decode(s).ok().map(Bytes::from))
                    .collect();
                release_withdrawal_calldata(transfer.amount_wei(), source, signatures)
            }
        };
        Ok(ContractCall::new(destination.bridge, data, key))
    }

    async fn submit_settlement(
        &self,
        transfer: &BridgeTransfer,
        report: &mut SweepReport,
    ) -> Result<(), BridgeError> {
        let call = self.settlement_call(transfer)?;
        let transfer = self.bridge.begin_settlement(&transfer.id).await?;
        let destination = self.destination(transfer.direction);

        match submit_with_retry(destination.client.as_ref(), call, &self.retry).await {
            Ok(tx_hash) => {
                self.bridge.record_settlement_tx(&transfer.id, tx_hash).await?;
                report.submitted += 1;
            }
            Err(e) if !e.is_retryable() => {
                self.bridge
                    .mark_failed(&transfer.id, &format!("settlement rejected: {e}"))
                    .await?;
                report.failed += 1;
            }
            Err(e) => {
                let attempts = self
                    .bridge
                    .abort_settlement(&transfer.id, &e.to_string())
                    .await?;
                if attempts >= MAX_SETTLEMENT_ATTEMPTS {
                    self.bridge
                        .mark_failed(
                            &transfer.id,
                            &format!("settlement failed after {attempts} attempts"),
                        )
                        .await?;
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::client::ChainClientError;
    use crate::blockchain::contracts::IVyraBridge;
    use crate::blockchain::signing::normalize_tx_hash;
    use crate::clock::SystemClock;
    use crate::services::bridge::ValidatorSet;
    use crate::test_support::{sign_withdrawal, validator_keys, MockChainClient};
    use alloy::primitives::U256;
    use alloy::sol_types::SolCall;
    use alloy::signers::local::PrivateKeySigner;

    struct Fixture {
        worker: SettlementWorker,
        bridge: Arc<BridgeCoordinator>,
        l1: Arc<MockChainClient>,
        l2: Arc<MockChainClient>,
        keys: Vec<PrivateKeySigner>,
    }

    fn fixture() -> Fixture {
        let keys = validator_keys(2);
        let set = ValidatorSet::new(keys.iter().map(|k| k.address()).collect(), Some(1)).unwrap();
        let bridge = Arc::new(BridgeCoordinator::new(set, Arc::new(SystemClock), None));
        let l1 = Arc::new(MockChainClient::with_chain_id(1));
        let l2 = Arc::new(MockChainClient::with_chain_id(2));
        let worker = SettlementWorker::new(
            bridge.clone(),
            ChainEndpoint {
                client: l1.clone(),
                bridge: Address::repeat_byte(0x11),
            },
            ChainEndpoint {
                client: l2.clone(),
                bridge: Address::repeat_byte(0x22),
            },
            Duration::from_millis(10),
            RetryPolicy::new(1, Duration::from_millis(1)),
        );
        Fixture {
            worker,
            bridge,
            l1,
            l2,
            keys,
        }
    }

    fn home_bridge() -> Address {
        Address::repeat_byte(0x11)
    }

    /// Make `source` a successful home-bridge deposit for transfer `id`.
    async fn lock_on_home_chain(f: &Fixture, id: &str, source: &str) {
        let transfer = f.bridge.get_transfer(id).await.unwrap();
        f.l1.set_deposit_receipt(
            normalize_tx_hash(source).unwrap(),
            home_bridge(),
            id_to_bytes32(id).unwrap(),
            transfer.amount_wei(),
        );
    }

    #[tokio::test]
    async fn deposit_is_confirmed_submitted_and_settled() {
        let f = fixture();
        let id = f.bridge.deposit("3").await.unwrap();
        f.bridge.attach_deposit_source(&id, "0xd1").await.unwrap();

        // Source not mined yet
        assert_eq!(f.worker.step().await, SweepReport::default());

        lock_on_home_chain(&f, &id, "0xd1").await;
        assert_eq!(f.worker.step().await.confirmed, 1);
        assert_eq!(f.worker.step().await.submitted, 1);
        assert_eq!(f.worker.step().await.settled, 1);

        let transfer = f.bridge.get_transfer(&id).await.unwrap();
        assert_eq!(transfer.status, TransferStatus::Settled);
        let submitted = f.l2.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].to, Address::repeat_byte(0x22));
        assert!(f.l1.submitted().is_empty());
    }

    #[tokio::test]
    async fn reverted_deposit_source_fails_transfer() {
        let f = fixture();
        let id = f.bridge.deposit("3").await.unwrap();
        f.bridge.attach_deposit_source(&id, "0xd2").await.unwrap();
        f.l1.set_receipt(normalize_tx_hash("0xd2").unwrap(), false, Some(home_bridge()), Vec::new());

        assert_eq!(f.worker.step().await.failed, 1);
        assert_eq!(
            f.bridge.get_status(&id).await.unwrap().status,
            TransferStatus::Failed
        );
    }

    #[tokio::test]
    async fn unrelated_source_transaction_fails_deposit() {
        let f = fixture();
        let id = f.bridge.deposit("1000000").await.unwrap();
        f.bridge.attach_deposit_source(&id, "0x5eed").await.unwrap();
        f.l1.set_receipt(
            normalize_tx_hash("0x5eed").unwrap(),
            true,
            Some(Address::repeat_byte(0x77)),
            Vec::new(),
        );

        assert_eq!(f.worker.step().await.failed, 1);
        f.worker.step().await;

        let transfer = f.bridge.get_transfer(&id).await.unwrap();
        assert_eq!(transfer.status, TransferStatus::Failed);
        assert!(f.l2.submitted().is_empty());
    }

    #[tokio::test]
    async fn home_bridge_deposit_for_other_amount_or_id_fails() {
        let f = fixture();
        let short = f.bridge.deposit("5").await.unwrap();
        f.bridge.attach_deposit_source(&short, "0xe1").await.unwrap();
        f.l1.set_deposit_receipt(
            normalize_tx_hash("0xe1").unwrap(),
            home_bridge(),
            id_to_bytes32(&short).unwrap(),
            U256::from(1u64),
        );

        let other = f.bridge.deposit("1").await.unwrap();
        let misrouted = f.bridge.deposit("1").await.unwrap();
        f.bridge.attach_deposit_source(&misrouted, "0xe2").await.unwrap();
        lock_on_home_chain(&f, &other, "0xe2").await;

        let report = f.worker.step().await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.confirmed, 0);
        assert!(f.l2.submitted().is_empty());
        for id in [&short, &misrouted] {
            assert_eq!(
                f.bridge.get_status(id).await.unwrap().status,
                TransferStatus::Failed
            );
        }
    }

    #[tokio::test]
    async fn confirmed_withdrawal_is_released_on_l1() {
        let f = fixture();
        let amount = U256::from(10u64).pow(U256::from(18u64));
        let source = normalize_tx_hash("0xabc").unwrap();
        let sig = sign_withdrawal(&f.keys[0], amount, source);
        let id = f.bridge.withdraw("1", "0xabc", &[sig]).await.unwrap();

        assert_eq!(f.worker.step().await.submitted, 1);
        let submitted = f.l1.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].to, Address::repeat_byte(0x11));
        let decoded = IVyraBridge::releaseWithdrawalCall::abi_decode(&submitted[0].data).unwrap();
        assert_eq!(decoded.amount, amount);
        assert_eq!(decoded.l2TxHash, source);
        assert_eq!(decoded.signatures.len(), 1);

        assert_eq!(f.worker.step().await.settled, 1);
        assert_eq!(
            f.bridge.get_status(&id).await.unwrap().status,
            TransferStatus::Settled
        );
    }

    #[tokio::test]
    async fn repeated_submission_failures_fail_transfer() {
        let f = fixture();
        let id = f.bridge.deposit("1").await.unwrap();
        f.bridge.attach_deposit_source(&id, "0xd3").await.unwrap();
        lock_on_home_chain(&f, &id, "0xd3").await;
        f.worker.step().await;

        f.l2.fail_next(
            MAX_SETTLEMENT_ATTEMPTS as usize,
            ChainClientError::Rpc("connection reset".into()),
        );
        for _ in 0..MAX_SETTLEMENT_ATTEMPTS - 1 {
            assert_eq!(f.worker.step().await.failed, 0);
        }
        assert_eq!(f.worker.step().await.failed, 1);

        let transfer = f.bridge.get_transfer(&id).await.unwrap();
        assert_eq!(transfer.status, TransferStatus::Failed);
        assert_eq!(transfer.settlement_attempts, MAX_SETTLEMENT_ATTEMPTS);
    }

    #[tokio::test]
    async fn reverted_settlement_submission_fails_transfer() {
        let f = fixture();
        let id = f.bridge.deposit("1").await.unwrap();
        f.bridge.attach_deposit_source(&id, "0xd4").await.unwrap();
        lock_on_home_chain(&f, &id, "0xd4").await;
        f.worker.step().await;

        f.l2.fail_next(1, ChainClientError::Reverted("already processed".into()));
        assert_eq!(f.worker.step().await.failed, 1);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let f = fixture();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(f.worker.run(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
