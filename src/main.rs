// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;

use vyra_relay_server::{
    api::router,
    blockchain::{
        client::{ChainClient, EvmChainClient, DEFAULT_SUBMIT_TIMEOUT},
        signing::signer_from_hex,
    },
    clock::SystemClock,
    config::AppConfig,
    settlement::SettlementWorker,
    state::AppState,
    storage::{ledger_store::LEDGER_FILE_NAME, LedgerStore},
    telemetry::init_tracing,
};

/// Time in-flight requests get to finish after a shutdown signal.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolve on Ctrl-C and cancel background workers.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        init_tracing(AppConfig::log_format_from_env()).ok();
        tracing::error!(error = %e, "Invalid configuration");
        panic!("Invalid configuration: {e}");
    });
    init_tracing(config.log_format).expect("Failed to install tracing subscriber");

    let funding = signer_from_hex(config.funding_private_key.expose())
        .expect("FUNDING_PRIVATE_KEY is not a valid private key");
    tracing::info!(funding_account = %funding.address(), "Loaded funding account");

    let l1: Arc<dyn ChainClient> = Arc::new(
        EvmChainClient::new(config.l1.clone(), funding.clone(), DEFAULT_SUBMIT_TIMEOUT)
            .expect("Failed to create home chain client"),
    );
    let l2: Arc<dyn ChainClient> = Arc::new(
        EvmChainClient::new(config.l2.clone(), funding, DEFAULT_SUBMIT_TIMEOUT)
            .expect("Failed to create remote chain client"),
    );

    let store = config.data_dir.as_ref().map(|dir| {
        let path = dir.join(LEDGER_FILE_NAME);
        tracing::info!(path = %path.display(), "Opening ledger database");
        Arc::new(LedgerStore::open(&path).expect("Failed to open ledger database"))
    });
    if store.is_none() {
        tracing::warn!("DATA_DIR not set; invoices and bridge transfers are kept in memory only");
    }

    let state = AppState::build(&config, l1, l2, Arc::new(SystemClock), store.clone())
        .expect("Invalid bridge validator configuration");

    if let Some(store) = &store {
        state
            .payments
            .restore(store.load_invoices().expect("Failed to load invoices"));
        state
            .bridge
            .restore(store.load_transfers().expect("Failed to load bridge transfers"));
        for table in &state.replay_tables {
            table.restore().expect("Failed to load consumed requests");
        }
    }

    let shutdown = CancellationToken::new();
    let worker = SettlementWorker::new(
        state.bridge.clone(),
        state.l1.clone(),
        state.l2.clone(),
        config.settlement_poll_interval,
        state.retry,
    );
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let app = router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    match &config.tls {
        Some((cert_path, key_path)) => {
            // Must be installed before any TLS operation
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .expect("Failed to load TLS certificate and key");

            let handle = axum_server::Handle::new();
            tokio::spawn({
                let handle = handle.clone();
                let shutdown = shutdown.clone();
                async move {
                    shutdown_signal(shutdown).await;
                    handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
                }
            });

            tracing::info!(%addr, chain_id = config.l1.chain_id, "Vyra relay listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind listener");
            tracing::info!(%addr, chain_id = config.l1.chain_id, "Vyra relay listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
                .await
                .expect("HTTP server failed");
        }
    }

    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Settlement worker panicked");
    }
    tracing::info!("Vyra relay stopped");
}
