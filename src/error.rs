// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! HTTP error mapping.
//!
//! Every component error classifies itself with an [`ErrorKind`]; the kind
//! picks the status code and the stable `error_code`. Chain and internal
//! failures are logged with their source and answered with a generic
//! message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use crate::blockchain::amounts::AmountError;
use crate::blockchain::client::ChainClientError;
use crate::blockchain::signing::SigningError;

/// Coarse classification of component errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotFound,
    Conflict,
    /// Accepted, but more validator signatures are needed
    InsufficientSignatures,
    Chain,
    Unsupported,
    /// Temporarily unable to accept the request
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InsufficientSignatures => StatusCode::ACCEPTED,
            ErrorKind::Chain => StatusCode::BAD_GATEWAY,
            ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InsufficientSignatures => "insufficient_signatures",
            ErrorKind::Chain => "chain_error",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Implemented by every component error that can reach the HTTP layer.
pub trait DomainError: std::error::Error {
    fn kind(&self) -> ErrorKind;

    /// Extra fields merged into the JSON error body.
    fn details(&self) -> Option<Map<String, Value>> {
        None
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
    pub details: Map<String, Value>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: kind.status_code(),
            error_code: kind.error_code(),
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl<E: DomainError> From<E> for ApiError {
    fn from(err: E) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Chain => {
                tracing::error!(error = %err, "Chain operation failed");
                "chain submission failed".to_string()
            }
            ErrorKind::Internal => {
                tracing::error!(error = %err, "Internal error");
                "internal error".to_string()
            }
            _ => err.to_string(),
        };
        let mut api_error = ApiError::new(kind, message);
        if let Some(details) = err.details() {
            api_error.details = details;
        }
        api_error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = self.details;
        body.insert("error".to_string(), json!(self.message));
        body.insert("error_code".to_string(), json!(self.error_code));
        (self.status, Json(Value::Object(body))).into_response()
    }
}

impl DomainError for ChainClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            ChainClientError::InvalidRpcUrl(_) => ErrorKind::Internal,
            _ => ErrorKind::Chain,
        }
    }
}

impl DomainError for SigningError {
    fn kind(&self) -> ErrorKind {
        match self {
            SigningError::SigningFailed(_) => ErrorKind::Internal,
            _ => ErrorKind::Validation,
        }
    }
}

impl DomainError for AmountError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
