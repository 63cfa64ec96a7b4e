// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Wallet identity derivation.
//!
//! Derives the Ethereum address for supplied key material. Nothing is
//! stored and key material never reaches the logs.

use std::str::FromStr;

use alloy::primitives::Address;

use crate::blockchain::signing::signer_from_hex;
use crate::error::{DomainError, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("unsupported connection type: {0}")]
    UnsupportedConnectionKind(String),
}

impl DomainError for IdentityError {
    fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::InvalidKeyMaterial(_) => ErrorKind::Validation,
            IdentityError::UnsupportedConnectionKind(_) => ErrorKind::Unsupported,
        }
    }
}

/// How a wallet is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    PrivateKey,
    Mnemonic,
}

impl FromStr for ConnectionKind {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "privateKey" => Ok(ConnectionKind::PrivateKey),
            "mnemonic" => Ok(ConnectionKind::Mnemonic),
            other => Err(IdentityError::UnsupportedConnectionKind(other.to_string())),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityManager;

impl IdentityManager {
    pub fn new() -> Self {
        Self
    }

    /// Derive the address for `material` connected as `kind`.
    ///
    /// Mnemonic connections are rejected outright rather than mapped to
    /// some default account.
    pub fn derive_address(
        &self,
        kind: ConnectionKind,
        material: Option<&str>,
    ) -> Result<Address, IdentityError> {
        match kind {
            ConnectionKind::PrivateKey => {
                let key = material
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| {
                        IdentityError::InvalidKeyMaterial("private key is required".to_string())
                    })?;
                let signer = signer_from_hex(key)
                    .map_err(|e| IdentityError::InvalidKeyMaterial(e.to_string()))?;
                Ok(signer.address())
            }
            ConnectionKind::Mnemonic => Err(IdentityError::UnsupportedConnectionKind(
                "mnemonic connections are not supported".to_string(),
            )),
        }
    }

    /// Parse the connection type string and derive the address.
    pub fn connect(&self, kind: &str, material: Option<&str>) -> Result<Address, IdentityError> {
        let kind = ConnectionKind::from_str(kind)?;
        let address = self.derive_address(kind, material)?;
        tracing::info!(address = %address, "Wallet connected");
        Ok(address)
    }
}
