// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Bridge endpoints.
//!
//! A withdrawal below the validator threshold is answered with 202 and the
//! withdrawal id; more signatures go to
//! `POST /bridge/withdraw/{id}/signatures`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    services::bridge::{TransferStatus, TransferView},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Decimal VYR amount
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub deposit_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepositSourceRequest {
    /// Home chain transaction that locked the funds
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    /// Decimal VYR amount
    pub amount: String,
    /// Remote chain transaction that burned the funds
    pub l2_tx_hash: String,
    /// Validator signatures over keccak256(abi.encodePacked(amountWei, l2TxHash))
    #[serde(default)]
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignaturesRequest {
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub withdrawal_id: String,
    pub status: String,
}

/// Body of a 202 answer: the withdrawal exists but needs more signatures.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingWithdrawalResponse {
    pub withdrawal_id: String,
    pub status: String,
    pub valid_signatures: usize,
    pub threshold: usize,
    pub error: String,
    #[serde(rename = "error_code")]
    pub error_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferStatusResponse {
    pub id: String,
    /// pending, confirmed, settled or failed
    pub status: String,
    /// deposit or withdrawal
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: String,
}

impl From<TransferView> for TransferStatusResponse {
    fn from(view: TransferView) -> Self {
        Self {
            id: view.id,
            status: view.status.as_str().to_string(),
            kind: view.direction.as_str().to_string(),
            amount: view.amount,
        }
    }
}

/// Open a deposit from the home chain.
#[utoipa::path(
    post,
    path = "/api/v1/bridge/deposit",
    tag = "Bridge",
    request_body = DepositRequest,
    responses(
        (status = 201, description = "Deposit recorded", body = DepositResponse),
        (status = 400, description = "Invalid amount", body = crate::api::ErrorBody)
    )
)]
pub async fn deposit(
    State(state): State<AppState>,
    Json(request): Json<DepositRequest>,
) -> Result<(StatusCode, Json<DepositResponse>), ApiError> {
    let deposit_id = state.bridge.deposit(&request.amount).await?;

    Ok((
        StatusCode::CREATED,
        Json(DepositResponse {
            deposit_id,
            message: "Deposit initiated".to_string(),
        }),
    ))
}

/// Bind the locking transaction to a pending deposit.
#[utoipa::path(
    post,
    path = "/api/v1/bridge/deposit/{transfer_id}/source",
    tag = "Bridge",
    params(
        ("transfer_id" = String, Path, description = "Deposit ID")
    ),
    request_body = DepositSourceRequest,
    responses(
        (status = 200, description = "Source attached", body = TransferStatusResponse),
        (status = 400, description = "Invalid transaction hash", body = crate::api::ErrorBody),
        (status = 404, description = "Deposit not found", body = crate::api::ErrorBody),
        (status = 409, description = "Source already attached or hash already used", body = crate::api::ErrorBody)
    )
)]
pub async fn attach_deposit_source(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
    Json(request): Json<DepositSourceRequest>,
) -> Result<Json<TransferStatusResponse>, ApiError> {
    let view = state
        .bridge
        .attach_deposit_source(&transfer_id, &request.tx_hash)
        .await?;
    Ok(Json(view.into()))
}

/// Request a withdrawal attested by bridge validators.
#[utoipa::path(
    post,
    path = "/api/v1/bridge/withdraw",
    tag = "Bridge",
    request_body = WithdrawRequest,
    responses(
        (status = 201, description = "Withdrawal confirmed", body = WithdrawalResponse),
        (status = 202, description = "Withdrawal recorded, more signatures needed", body = PendingWithdrawalResponse),
        (status = 400, description = "Invalid amount, hash or signature", body = crate::api::ErrorBody),
        (status = 409, description = "Source transaction already claimed", body = crate::api::ErrorBody)
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    Json(request): Json<WithdrawRequest>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), ApiError> {
    let withdrawal_id = state
        .bridge
        .withdraw(&request.amount, &request.l2_tx_hash, &request.signatures)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(WithdrawalResponse {
            withdrawal_id,
            status: TransferStatus::Confirmed.as_str().to_string(),
        }),
    ))
}

/// Add validator signatures to a pending withdrawal.
#[utoipa::path(
    post,
    path = "/api/v1/bridge/withdraw/{transfer_id}/signatures",
    tag = "Bridge",
    params(
        ("transfer_id" = String, Path, description = "Withdrawal ID")
    ),
    request_body = SignaturesRequest,
    responses(
        (status = 200, description = "Withdrawal confirmed", body = WithdrawalResponse),
        (status = 202, description = "Still below threshold", body = PendingWithdrawalResponse),
        (status = 400, description = "Invalid signature", body = crate::api::ErrorBody),
        (status = 404, description = "Withdrawal not found", body = crate::api::ErrorBody),
        (status = 409, description = "Withdrawal is not pending", body = crate::api::ErrorBody)
    )
)]
pub async fn submit_signatures(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
    Json(request): Json<SignaturesRequest>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let view = state
        .bridge
        .submit_signatures(&transfer_id, &request.signatures)
        .await?;

    Ok(Json(WithdrawalResponse {
        withdrawal_id: view.id,
        status: view.status.as_str().to_string(),
    }))
}

/// Status of a deposit or withdrawal.
#[utoipa::path(
    get,
    path = "/api/v1/bridge/status/{transfer_id}",
    tag = "Bridge",
    params(
        ("transfer_id" = String, Path, description = "Deposit or withdrawal ID")
    ),
    responses(
        (status = 200, description = "Transfer status", body = TransferStatusResponse),
        (status = 404, description = "Transfer not found", body = crate::api::ErrorBody)
    )
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(transfer_id): Path<String>,
) -> Result<Json<TransferStatusResponse>, ApiError> {
    let view = state.bridge.get_status(&transfer_id).await?;
    Ok(Json(view.into()))
}
