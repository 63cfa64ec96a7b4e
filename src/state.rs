// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::client::ChainClient;
use crate::blockchain::retry::RetryPolicy;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::services::{
    BridgeCoordinator, BridgeError, IdentityManager, PaymasterRelay, PaymentLedger,
    SessionKeyManager, ValidatorSet, WalletService,
};
use crate::settlement::ChainEndpoint;
use crate::storage::{LedgerStore, RequestDedup};

/// Live records held by each replay table.
pub const DEDUP_CAPACITY: usize = 10_000;

/// First backoff delay of chain submission retries.
pub const SUBMIT_BASE_DELAY: Duration = Duration::from_millis(200);

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Shared handles for the HTTP handlers and the settlement worker.
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityManager,
    pub sessions: Arc<SessionKeyManager>,
    pub paymaster: Arc<PaymasterRelay>,
    pub bridge: Arc<BridgeCoordinator>,
    pub payments: Arc<PaymentLedger>,
    pub wallets: Arc<WalletService>,
    /// Home chain
    pub l1: ChainEndpoint,
    /// Remote chain
    pub l2: ChainEndpoint,
    pub store: Option<Arc<LedgerStore>>,
    /// Replay tables of the paymaster and wallet relays
    pub replay_tables: [Arc<RequestDedup>; 2],
    pub retry: RetryPolicy,
}

impl AppState {
    /// Wire every component from configuration and the two chain clients.
    pub fn build(
        config: &AppConfig,
        l1: Arc<dyn ChainClient>,
        l2: Arc<dyn ChainClient>,
        clock: Arc<dyn Clock>,
        store: Option<Arc<LedgerStore>>,
    ) -> Result<Self, BridgeError> {
        let retry = RetryPolicy::new(config.submit_max_attempts, SUBMIT_BASE_DELAY);
        let contracts = &config.contracts;

        let sessions = Arc::new(SessionKeyManager::new(
            clock.clone(),
            to_chrono(config.session_key_max_ttl),
        ));
        let replay_table = |namespace| {
            Arc::new(RequestDedup::new(
                namespace,
                DEDUP_CAPACITY,
                to_chrono(config.request_deadline_window),
                clock.clone(),
                store.clone(),
            ))
        };
        let replay_tables = [replay_table("sponsor"), replay_table("send")];
        let paymaster = PaymasterRelay::new(
            sessions.clone(),
            l1.clone(),
            replay_tables[0].clone(),
            contracts.paymaster,
            config.max_sponsored_gas,
            retry,
        );
        let wallets = WalletService::new(
            sessions.clone(),
            l1.clone(),
            replay_tables[1].clone(),
            contracts.vyra_token,
            retry,
        );
        let validators = ValidatorSet::new(config.bridge_validators.clone(), config.bridge_threshold)?;
        let bridge = BridgeCoordinator::new(validators, clock.clone(), store.clone());
        let payments = PaymentLedger::new(
            l1.clone(),
            contracts.pos,
            clock,
            to_chrono(config.invoice_default_ttl),
            retry,
            store.clone(),
        );

        Ok(Self {
            identity: IdentityManager::new(),
            sessions,
            paymaster: Arc::new(paymaster),
            bridge: Arc::new(bridge),
            payments: Arc::new(payments),
            wallets: Arc::new(wallets),
            l1: ChainEndpoint {
                client: l1,
                bridge: contracts.bridge,
            },
            l2: ChainEndpoint {
                client: l2,
                bridge: contracts.l2_bridge,
            },
            store,
            replay_tables,
            retry,
        })
    }
}
