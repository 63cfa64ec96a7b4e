// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Invoice endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    api::TxResponse,
    error::ApiError,
    services::payment::Invoice,
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    /// Decimal VYR amount, e.g. "1.5"
    pub amount: String,
    pub description: String,
    /// Unix seconds; omitted or 0 means 24 hours from now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceResponse {
    pub invoice_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: String,
    pub amount: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// pending, processing, paid, failed or expired
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        Self {
            id: invoice.id,
            amount: invoice.amount,
            description: invoice.description,
            created_at: invoice.created_at,
            expires_at: invoice.expires_at,
            status: invoice.status.as_str().to_string(),
            payer: invoice.payer,
            tx_hash: invoice.tx_hash,
            failure_reason: invoice.failure_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessPaymentRequest {
    /// Paying customer address
    pub customer: String,
}

/// Create an invoice.
#[utoipa::path(
    post,
    path = "/api/v1/payments/invoice",
    tag = "Payments",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = CreateInvoiceResponse),
        (status = 400, description = "Invalid amount, description or expiry", body = crate::api::ErrorBody)
    )
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<CreateInvoiceResponse>), ApiError> {
    let invoice_id = state
        .payments
        .create_invoice(&request.amount, &request.description, request.expiry)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateInvoiceResponse {
            invoice_id,
            message: "Invoice created".to_string(),
        }),
    ))
}

/// Look up an invoice.
#[utoipa::path(
    get,
    path = "/api/v1/payments/{invoice_id}",
    tag = "Payments",
    params(
        ("invoice_id" = String, Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, description = "Invoice", body = InvoiceResponse),
        (status = 404, description = "Invoice not found", body = crate::api::ErrorBody)
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    let invoice = state.payments.get_payment(&invoice_id).await?;
    Ok(Json(invoice.into()))
}

/// Pay an invoice through the POS contract.
#[utoipa::path(
    post,
    path = "/api/v1/payments/{invoice_id}/process",
    tag = "Payments",
    params(
        ("invoice_id" = String, Path, description = "Invoice ID")
    ),
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Payment submitted", body = TxResponse),
        (status = 400, description = "Invalid customer address", body = crate::api::ErrorBody),
        (status = 404, description = "Invoice not found", body = crate::api::ErrorBody),
        (status = 409, description = "Invoice already paid, processing or expired", body = crate::api::ErrorBody),
        (status = 502, description = "Chain submission failed", body = crate::api::ErrorBody)
    )
)]
pub async fn process_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    let tx_hash = state
        .payments
        .process_payment(&invoice_id, &request.customer)
        .await?;

    Ok(Json(TxResponse {
        tx_hash: tx_hash.to_string(),
        message: "Payment processed".to_string(),
    }))
}
