// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

use std::time::Duration;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::blockchain::client::ChainClient;
use crate::state::AppState;

/// How long a health check waits for an RPC endpoint.
const RPC_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub service: String,
    pub version: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    /// Home chain RPC ("ok" or "unreachable").
    pub l1_rpc: String,
    /// Remote chain RPC ("ok" or "unreachable").
    pub l2_rpc: String,
    /// Latest home chain block, if reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l1_block: Option<u64>,
    /// Latest remote chain block, if reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2_block: Option<u64>,
    /// Ledger database status (only present when `DATA_DIR` is set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_store: Option<String>,
}

/// Simple health check response for liveness checks.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

async fn check_rpc(client: &dyn ChainClient) -> Option<u64> {
    match tokio::time::timeout(RPC_CHECK_TIMEOUT, client.block_number()).await {
        Ok(Ok(block)) => Some(block),
        Ok(Err(e)) => {
            tracing::warn!(chain_id = client.network().chain_id, error = %e, "RPC health check failed");
            None
        }
        Err(_) => {
            tracing::warn!(chain_id = client.network().chain_id, "RPC health check timed out");
            None
        }
    }
}

fn reachability(block: Option<u64>) -> String {
    if block.is_some() { "ok" } else { "unreachable" }.to_string()
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let (l1_block, l2_block) = tokio::join!(
        check_rpc(state.l1.client.as_ref()),
        check_rpc(state.l2.client.as_ref())
    );
    let ledger_store = state
        .store
        .as_ref()
        .map(|store| if store.is_healthy() { "ok" } else { "unavailable" }.to_string());

    let store_ok = ledger_store.as_ref().map(|s| s == "ok").unwrap_or(true);
    let all_ok = l1_block.is_some() && l2_block.is_some() && store_ok;

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        service: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        checks: HealthChecks {
            l1_rpc: reachability(l1_block),
            l2_rpc: reachability(l2_block),
            l1_block,
            l2_block,
            ledger_store,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness check handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check handler.
///
/// Returns 200 only if both RPC endpoints (and the ledger store, when
/// configured) are available.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}
