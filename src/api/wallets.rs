// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Wallet endpoints.
//!
//! Connecting only derives the address; no key material is kept. Sends are
//! relayed `transferFrom` calls authorized by the owner or its session key.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::TxResponse,
    blockchain::{amounts::format_amount, types::VYRA_DECIMALS},
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWalletRequest {
    /// `privateKey` or `mnemonic`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    /// Accepted for compatibility; mnemonic derivation is not supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectWalletResponse {
    pub address: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    /// Native balance as a decimal string
    pub balance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VyraBalanceResponse {
    pub address: String,
    /// VYR balance as a decimal string
    pub vyra_balance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to: String,
    /// Decimal VYR amount
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unix seconds after which the signature is no longer accepted
    pub deadline: u64,
    /// Signature over keccak256(abi.encodePacked(from, to, amountWei, deadline))
    pub signature: String,
}

/// Derive the address of a wallet.
#[utoipa::path(
    post,
    path = "/api/v1/wallets/connect",
    tag = "Wallets",
    request_body = ConnectWalletRequest,
    responses(
        (status = 200, description = "Wallet connected", body = ConnectWalletResponse),
        (status = 400, description = "Invalid key material", body = crate::api::ErrorBody),
        (status = 501, description = "Connection type not supported", body = crate::api::ErrorBody)
    )
)]
pub async fn connect_wallet(
    State(state): State<AppState>,
    Json(request): Json<ConnectWalletRequest>,
) -> Result<Json<ConnectWalletResponse>, ApiError> {
    let material = match request.kind.as_str() {
        "mnemonic" => request.mnemonic.as_deref(),
        _ => request.private_key.as_deref(),
    };
    let address = state.identity.connect(&request.kind, material)?;

    Ok(Json(ConnectWalletResponse {
        address: address.to_string(),
        message: "Wallet connected successfully".to_string(),
    }))
}

/// Native coin balance.
#[utoipa::path(
    get,
    path = "/api/v1/wallets/{address}/balance",
    tag = "Wallets",
    params(
        ("address" = String, Path, description = "0x-prefixed wallet address")
    ),
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 400, description = "Invalid address", body = crate::api::ErrorBody),
        (status = 502, description = "RPC failure", body = crate::api::ErrorBody)
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.wallets.balance(&address).await?;
    Ok(Json(BalanceResponse {
        address,
        balance: format_amount(balance, VYRA_DECIMALS),
    }))
}

/// VYR token balance.
#[utoipa::path(
    get,
    path = "/api/v1/wallets/{address}/vyra-balance",
    tag = "Wallets",
    params(
        ("address" = String, Path, description = "0x-prefixed wallet address")
    ),
    responses(
        (status = 200, description = "VYR balance", body = VyraBalanceResponse),
        (status = 400, description = "Invalid address", body = crate::api::ErrorBody),
        (status = 502, description = "RPC failure", body = crate::api::ErrorBody)
    )
)]
pub async fn get_vyra_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<VyraBalanceResponse>, ApiError> {
    let balance = state.wallets.vyra_balance(&address).await?;
    Ok(Json(VyraBalanceResponse {
        address,
        vyra_balance: format_amount(balance, VYRA_DECIMALS),
    }))
}

/// Relay a signed VYR transfer from `address`.
#[utoipa::path(
    post,
    path = "/api/v1/wallets/{address}/send",
    tag = "Wallets",
    params(
        ("address" = String, Path, description = "Sender address")
    ),
    request_body = SendRequest,
    responses(
        (status = 200, description = "Transfer submitted", body = TxResponse),
        (status = 400, description = "Invalid request or deadline", body = crate::api::ErrorBody),
        (status = 401, description = "Signature not valid for sender", body = crate::api::ErrorBody),
        (status = 409, description = "Request already submitted", body = crate::api::ErrorBody),
        (status = 502, description = "Chain submission failed", body = crate::api::ErrorBody),
        (status = 503, description = "Too many pending signed requests", body = crate::api::ErrorBody)
    )
)]
pub async fn send_vyra(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(request): Json<SendRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    let tx_hash = state
        .wallets
        .send(
            &address,
            &request.to,
            &request.amount,
            request.deadline,
            &request.signature,
        )
        .await?;
    if let Some(description) = request.description.as_deref() {
        tracing::debug!(tx_hash = %tx_hash, description, "Transfer description");
    }

    Ok(Json(TxResponse {
        tx_hash: tx_hash.to_string(),
        message: "Transfer submitted".to_string(),
    }))
}
