// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Session key and gas sponsorship endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{MessageResponse, TxResponse},
    blockchain::signing::parse_address,
    error::ApiError,
    services::SessionError,
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionKeyRequest {
    /// Account the session key acts for
    pub owner: String,
    /// Unix seconds
    pub expiry: u64,
    /// Unix seconds after which the signature is no longer accepted
    pub deadline: u64,
    /// Owner signature over keccak256(abi.encodePacked(keccak256("vyra.session.create"),
    /// owner, expiry, deadline))
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevokeSessionKeyRequest {
    pub owner: String,
    /// Unix seconds after which the signature is no longer accepted
    pub deadline: u64,
    /// Owner signature over keccak256(abi.encodePacked(keccak256("vyra.session.revoke"),
    /// owner, deadline))
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionKeyResponse {
    /// Address of the new session key
    pub session_key: String,
    /// Private key of the new session key. Returned once and not kept.
    pub session_private_key: String,
    /// Unix seconds
    pub expiry: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessionKeyResponse {
    pub owner: String,
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OwnerQuery {
    /// Session key owner address
    pub owner: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SponsorRequest {
    pub user: String,
    /// Base-10 gas amount
    pub gas_used: String,
    /// Unix seconds after which the signature is no longer accepted
    pub deadline: u64,
    /// Signature over keccak256(abi.encodePacked(user, gasUsed, deadline))
    pub signature: String,
}

/// Active session key of an owner.
#[utoipa::path(
    get,
    path = "/api/v1/paymaster/session-key",
    tag = "Paymaster",
    params(OwnerQuery),
    responses(
        (status = 200, description = "Active session key", body = ActiveSessionKeyResponse),
        (status = 400, description = "Invalid owner address", body = crate::api::ErrorBody),
        (status = 404, description = "No active session key", body = crate::api::ErrorBody)
    )
)]
pub async fn get_session_key(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ActiveSessionKeyResponse>, ApiError> {
    let owner = parse_address(&query.owner)?;
    let info = state
        .sessions
        .active_session_key(owner)
        .ok_or(SessionError::NoActiveSessionKey(owner))?;

    Ok(Json(ActiveSessionKeyResponse {
        owner: info.owner.to_string(),
        session_key: info.address.to_string(),
        created_at: info.created_at,
        expires_at: info.expires_at,
    }))
}

/// Create a session key, replacing the owner's active one.
#[utoipa::path(
    post,
    path = "/api/v1/paymaster/session-key",
    tag = "Paymaster",
    request_body = CreateSessionKeyRequest,
    responses(
        (status = 201, description = "Session key created", body = SessionKeyResponse),
        (status = 400, description = "Invalid owner, expiry or deadline", body = crate::api::ErrorBody),
        (status = 401, description = "Not signed by the owner", body = crate::api::ErrorBody),
        (status = 409, description = "Request already submitted", body = crate::api::ErrorBody)
    )
)]
pub async fn create_session_key(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionKeyRequest>,
) -> Result<(StatusCode, Json<SessionKeyResponse>), ApiError> {
    let issued = state.paymaster.create_session_key(
        &request.owner,
        request.expiry,
        request.deadline,
        &request.signature,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(SessionKeyResponse {
            session_key: issued.info.address.to_string(),
            session_private_key: issued.signer.to_bytes().to_string(),
            expiry: issued.info.expires_at.timestamp(),
            message: "Session key created".to_string(),
        }),
    ))
}

/// Revoke the owner's active session key. Idempotent.
#[utoipa::path(
    delete,
    path = "/api/v1/paymaster/session-key",
    tag = "Paymaster",
    request_body = RevokeSessionKeyRequest,
    responses(
        (status = 200, description = "Session key revoked (or none was active)", body = MessageResponse),
        (status = 400, description = "Invalid owner or deadline", body = crate::api::ErrorBody),
        (status = 401, description = "Not signed by the owner", body = crate::api::ErrorBody),
        (status = 409, description = "Request already submitted", body = crate::api::ErrorBody)
    )
)]
pub async fn revoke_session_key(
    State(state): State<AppState>,
    Json(request): Json<RevokeSessionKeyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let revoked =
        state
            .paymaster
            .revoke_session_key(&request.owner, request.deadline, &request.signature)?;
    let message = if revoked {
        "Session key revoked"
    } else {
        "No active session key"
    };

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// Sponsor gas for a user operation.
#[utoipa::path(
    post,
    path = "/api/v1/paymaster/sponsor",
    tag = "Paymaster",
    request_body = SponsorRequest,
    responses(
        (status = 200, description = "Sponsorship submitted", body = TxResponse),
        (status = 400, description = "Invalid user, gas amount or deadline", body = crate::api::ErrorBody),
        (status = 401, description = "Signature not valid for user", body = crate::api::ErrorBody),
        (status = 409, description = "Request already submitted", body = crate::api::ErrorBody),
        (status = 502, description = "Chain submission failed", body = crate::api::ErrorBody),
        (status = 503, description = "Too many pending signed requests", body = crate::api::ErrorBody)
    )
)]
pub async fn sponsor(
    State(state): State<AppState>,
    Json(request): Json<SponsorRequest>,
) -> Result<Json<TxResponse>, ApiError> {
    let tx_hash = state
        .paymaster
        .sponsor(
            &request.user,
            &request.gas_used,
            request.deadline,
            &request.signature,
        )
        .await?;

    Ok(Json(TxResponse {
        tx_hash: tx_hash.to_string(),
        message: "Gas sponsored".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::{
        router,
        tests::{call, deadline},
    };
    use crate::blockchain::contracts::IVyraPaymaster;
    use crate::blockchain::signing::{
        random_signer, session_key_payload, session_revoke_payload, sign_payload, signer_from_hex,
        sponsorship_payload,
    };
    use crate::state::tests::{test_config, test_state};
    use alloy::primitives::U256;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::sol_types::SolCall;
    use axum::http::{Method, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};

    const SESSION_KEY: &str = "/api/v1/paymaster/session-key";

    fn create_body(signer: &PrivateKeySigner, owner: &PrivateKeySigner, expiry: u64) -> Value {
        let deadline = deadline();
        let payload = session_key_payload(owner.address(), expiry, deadline);
        json!({
            "owner": owner.address().to_string(),
            "expiry": expiry,
            "deadline": deadline,
            "signature": sign_payload(signer, payload).unwrap()
        })
    }

    fn revoke_body(signer: &PrivateKeySigner, owner: &PrivateKeySigner) -> Value {
        revoke_body_at(signer, owner, deadline())
    }

    fn revoke_body_at(signer: &PrivateKeySigner, owner: &PrivateKeySigner, deadline: u64) -> Value {
        json!({
            "owner": owner.address().to_string(),
            "deadline": deadline,
            "signature": sign_payload(signer, session_revoke_payload(owner.address(), deadline)).unwrap()
        })
    }

    fn sponsor_body(signer: &PrivateKeySigner, user: &PrivateKeySigner, gas: u64) -> Value {
        let deadline = deadline();
        let payload = sponsorship_payload(user.address(), U256::from(gas), deadline);
        json!({
            "user": user.address().to_string(),
            "gasUsed": gas.to_string(),
            "deadline": deadline,
            "signature": sign_payload(signer, payload).unwrap()
        })
    }

    async fn sponsor(app: &Router, body: Value) -> StatusCode {
        call(app, Method::POST, "/api/v1/paymaster/sponsor", Some(body)).await.0
    }

    fn in_an_hour() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[tokio::test]
    async fn session_key_lifecycle() {
        let (state, _, _) = test_state();
        let app = router(state);
        let owner = random_signer();
        let expiry = in_an_hour();

        let (status, body) =
            call(&app, Method::POST, SESSION_KEY, Some(create_body(&owner, &owner, expiry))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["expiry"], expiry);
        let session_key = body["sessionKey"].as_str().unwrap().to_string();
        let issued = signer_from_hex(body["sessionPrivateKey"].as_str().unwrap()).unwrap();
        assert_eq!(issued.address().to_string(), session_key);

        let query = format!("{SESSION_KEY}?owner={}", owner.address());
        let (status, body) = call(&app, Method::GET, &query, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionKey"], session_key);

        let (status, body) =
            call(&app, Method::DELETE, SESSION_KEY, Some(revoke_body(&owner, &owner))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Session key revoked");

        // A fresh signature is needed for every call
        let again = revoke_body_at(&owner, &owner, deadline() + 1);
        let (status, body) = call(&app, Method::DELETE, SESSION_KEY, Some(again)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No active session key");

        let (status, _) = call(&app, Method::GET, &query, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn issued_session_key_sponsors_until_revoked() {
        let (state, l1, _) = test_state();
        let app = router(state);
        let owner = random_signer();

        let (status, body) = call(
            &app,
            Method::POST,
            SESSION_KEY,
            Some(create_body(&owner, &owner, in_an_hour())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let session = signer_from_hex(body["sessionPrivateKey"].as_str().unwrap()).unwrap();

        assert_eq!(sponsor(&app, sponsor_body(&session, &owner, 21_000)).await, StatusCode::OK);
        assert_eq!(l1.submitted().len(), 1);

        let (status, _) =
            call(&app, Method::DELETE, SESSION_KEY, Some(revoke_body(&owner, &owner))).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(
            sponsor(&app, sponsor_body(&session, &owner, 22_000)).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(l1.submitted().len(), 1);
    }

    #[tokio::test]
    async fn foreign_signer_cannot_manage_session_keys() {
        let (state, _, _) = test_state();
        let app = router(state);
        let owner = random_signer();
        let attacker = random_signer();

        let (status, body) = call(
            &app,
            Method::POST,
            SESSION_KEY,
            Some(create_body(&attacker, &owner, in_an_hour())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "unauthorized");

        let (status, body) = call(
            &app,
            Method::POST,
            SESSION_KEY,
            Some(create_body(&owner, &owner, in_an_hour())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let session = signer_from_hex(body["sessionPrivateKey"].as_str().unwrap()).unwrap();

        // Neither a stranger nor the session key itself may revoke
        for signer in [&attacker, &session] {
            let (status, _) =
                call(&app, Method::DELETE, SESSION_KEY, Some(revoke_body(signer, &owner))).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("{SESSION_KEY}?owner={}", owner.address()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn session_key_rejects_bad_expiry_owner_and_deadline() {
        let (state, _, _) = test_state();
        let app = router(state);
        let owner = random_signer();

        let past = (chrono::Utc::now().timestamp() - 1) as u64;
        let (status, body) =
            call(&app, Method::POST, SESSION_KEY, Some(create_body(&owner, &owner, past))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "validation_error");

        let (status, _) = call(
            &app,
            Method::DELETE,
            SESSION_KEY,
            Some(json!({"owner": "0x1234", "deadline": deadline(), "signature": "0x00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut stale = revoke_body(&owner, &owner);
        stale["deadline"] = json!(1);
        let (status, _) = call(&app, Method::DELETE, SESSION_KEY, Some(stale)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sponsor_relays_to_paymaster_once() {
        let (state, l1, _) = test_state();
        let app = router(state);
        let user = random_signer();
        let body = sponsor_body(&user, &user, 21_000);

        let (status, response) =
            call(&app, Method::POST, "/api/v1/paymaster/sponsor", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(response["txHash"].as_str().unwrap().starts_with("0x"));

        let submitted = l1.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].to, test_config().contracts.paymaster);
        let decoded = IVyraPaymaster::sponsorGasCall::abi_decode(&submitted[0].data).unwrap();
        assert_eq!(decoded.user, user.address());
        assert_eq!(decoded.gasUsed, U256::from(21_000u64));

        assert_eq!(sponsor(&app, body).await, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn sponsor_over_limit_is_400() {
        let (state, l1, _) = test_state();
        let user = random_signer();

        let status = sponsor(&router(state), sponsor_body(&user, &user, 5_000_001)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(l1.submitted().is_empty());
    }
}
