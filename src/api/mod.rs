// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{ids::random_id, state::AppState};

pub mod bridge;
pub mod health;
pub mod paymaster;
pub mod payments;
pub mod wallets;

/// Tags requests without an `x-request-id` header with a random id.
#[derive(Debug, Clone, Copy, Default)]
struct MakeRandomRequestId;

impl MakeRequestId for MakeRandomRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&random_id()).ok().map(RequestId::new)
    }
}

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        // Wallets
        .route("/wallets/connect", post(wallets::connect_wallet))
        .route("/wallets/{address}/balance", get(wallets::get_balance))
        .route("/wallets/{address}/vyra-balance", get(wallets::get_vyra_balance))
        .route("/wallets/{address}/send", post(wallets::send_vyra))
        // Payments
        .route("/payments/invoice", post(payments::create_invoice))
        .route("/payments/{invoice_id}", get(payments::get_payment))
        .route("/payments/{invoice_id}/process", post(payments::process_payment))
        // Bridge
        .route("/bridge/deposit", post(bridge::deposit))
        .route("/bridge/deposit/{transfer_id}/source", post(bridge::attach_deposit_source))
        .route("/bridge/withdraw", post(bridge::withdraw))
        .route(
            "/bridge/withdraw/{transfer_id}/signatures",
            post(bridge::submit_signatures),
        )
        .route("/bridge/status/{transfer_id}", get(bridge::get_status))
        // Paymaster
        .route(
            "/paymaster/session-key",
            get(paymaster::get_session_key)
                .post(paymaster::create_session_key)
                .delete(paymaster::revoke_session_key),
        )
        .route("/paymaster/sponsor", post(paymaster::sponsor));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRandomRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        health::liveness,
        health::readiness,
        // Wallets
        wallets::connect_wallet,
        wallets::get_balance,
        wallets::get_vyra_balance,
        wallets::send_vyra,
        // Payments
        payments::create_invoice,
        payments::get_payment,
        payments::process_payment,
        // Bridge
        bridge::deposit,
        bridge::attach_deposit_source,
        bridge::withdraw,
        bridge::submit_signatures,
        bridge::get_status,
        // Paymaster
        paymaster::get_session_key,
        paymaster::create_session_key,
        paymaster::revoke_session_key,
        paymaster::sponsor
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            wallets::ConnectWalletRequest,
            wallets::ConnectWalletResponse,
            wallets::BalanceResponse,
            wallets::VyraBalanceResponse,
            wallets::SendRequest,
            payments::CreateInvoiceRequest,
            payments::CreateInvoiceResponse,
            payments::InvoiceResponse,
            payments::ProcessPaymentRequest,
            bridge::DepositRequest,
            bridge::DepositResponse,
            bridge::DepositSourceRequest,
            bridge::WithdrawRequest,
            bridge::SignaturesRequest,
            bridge::WithdrawalResponse,
            bridge::PendingWithdrawalResponse,
            bridge::TransferStatusResponse,
            paymaster::CreateSessionKeyRequest,
            paymaster::RevokeSessionKeyRequest,
            paymaster::SessionKeyResponse,
            paymaster::ActiveSessionKeyResponse,
            paymaster::SponsorRequest,
            TxResponse,
            MessageResponse,
            ErrorBody
        )
    ),
    tags(
        (name = "Health", description = "Liveness and dependency checks"),
        (name = "Wallets", description = "Wallet connection, balances and relayed transfers"),
        (name = "Payments", description = "Invoices settled through the POS contract"),
        (name = "Bridge", description = "Deposits and validator-attested withdrawals"),
        (name = "Paymaster", description = "Session keys and sponsored gas")
    )
)]
pub struct ApiDoc;

/// Response carrying the hash of a submitted transaction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TxResponse {
    pub tx_hash: String,
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Human readable message
    pub error: String,
    /// Stable machine readable code
    pub error_code: String,
}
