// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! # Runtime Configuration
//!
//! Configuration is loaded once from the environment at startup and is
//! read-only afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RPC_URL` | Home chain (L1) JSON-RPC endpoint | Required |
//! | `CHAIN_ID` | Home chain id | Required |
//! | `L2_RPC_URL` | Remote chain JSON-RPC endpoint | `RPC_URL` |
//! | `L2_CHAIN_ID` | Remote chain id | `CHAIN_ID` |
//! | `VYRA_TOKEN_ADDRESS` | VYR ERC-20 token | Required |
//! | `PAYMASTER_ADDRESS` | Paymaster contract | Required |
//! | `POS_ADDRESS` | POS contract | Required |
//! | `BRIDGE_ADDRESS` | Bridge contract on L1 | Required |
//! | `L2_BRIDGE_ADDRESS` | Bridge contract on L2 | `BRIDGE_ADDRESS` |
//! | `ENTRY_POINT_ADDRESS` | ERC-4337 entry point | Required |
//! | `FUNDING_PRIVATE_KEY` | Key of the account paying for relayed calls | Required |
//! | `BRIDGE_VALIDATORS` | Comma-separated validator addresses | Required |
//! | `BRIDGE_THRESHOLD` | Signatures required for a withdrawal | Majority |
//! | `MAX_SPONSORED_GAS` | Largest sponsorable `gasUsed` | `5000000` |
//! | `REQUEST_DEADLINE_WINDOW_SECS` | Furthest deadline a signed request may carry | `600` |
//! | `SESSION_KEY_MAX_TTL_SECS` | Longest session key lifetime | `2592000` |
//! | `INVOICE_DEFAULT_TTL_SECS` | Invoice lifetime without explicit expiry | `86400` |
//! | `SUBMIT_MAX_ATTEMPTS` | Chain submission attempts per request | `3` |
//! | `SETTLEMENT_POLL_SECS` | Settlement worker interval | `15` |
//! | `DATA_DIR` | Directory for the ledger database; in-memory if unset | unset |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both enable HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::blockchain::signing::parse_address;
use crate::blockchain::types::{local_network, NetworkConfig};

pub const RPC_URL_ENV: &str = "RPC_URL";
pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const L2_RPC_URL_ENV: &str = "L2_RPC_URL";
pub const L2_CHAIN_ID_ENV: &str = "L2_CHAIN_ID";
pub const VYRA_TOKEN_ADDRESS_ENV: &str = "VYRA_TOKEN_ADDRESS";
pub const PAYMASTER_ADDRESS_ENV: &str = "PAYMASTER_ADDRESS";
pub const POS_ADDRESS_ENV: &str = "POS_ADDRESS";
pub const BRIDGE_ADDRESS_ENV: &str = "BRIDGE_ADDRESS";
pub const L2_BRIDGE_ADDRESS_ENV: &str = "L2_BRIDGE_ADDRESS";
pub const ENTRY_POINT_ADDRESS_ENV: &str = "ENTRY_POINT_ADDRESS";
pub const FUNDING_PRIVATE_KEY_ENV: &str = "FUNDING_PRIVATE_KEY";
pub const BRIDGE_VALIDATORS_ENV: &str = "BRIDGE_VALIDATORS";
pub const BRIDGE_THRESHOLD_ENV: &str = "BRIDGE_THRESHOLD";
pub const MAX_SPONSORED_GAS_ENV: &str = "MAX_SPONSORED_GAS";
pub const REQUEST_DEADLINE_WINDOW_ENV: &str = "REQUEST_DEADLINE_WINDOW_SECS";
pub const SESSION_KEY_MAX_TTL_ENV: &str = "SESSION_KEY_MAX_TTL_SECS";
pub const INVOICE_DEFAULT_TTL_ENV: &str = "INVOICE_DEFAULT_TTL_SECS";
pub const SUBMIT_MAX_ATTEMPTS_ENV: &str = "SUBMIT_MAX_ATTEMPTS";
pub const SETTLEMENT_POLL_ENV: &str = "SETTLEMENT_POLL_SECS";
/// Directory holding `ledger.redb`.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_MAX_SPONSORED_GAS: u64 = 5_000_000;
pub const DEFAULT_REQUEST_DEADLINE_WINDOW_SECS: u64 = 600;
pub const DEFAULT_SESSION_KEY_MAX_TTL_SECS: u64 = 30 * 24 * 60 * 60;
pub const DEFAULT_INVOICE_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SUBMIT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SETTLEMENT_POLL_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// A secret that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Contract addresses on the home chain (plus the L2 bridge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAddresses {
    pub vyra_token: Address,
    pub paymaster: Address,
    pub pos: Address,
    pub bridge: Address,
    pub l2_bridge: Address,
    pub entry_point: Address,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub l1: NetworkConfig,
    pub l2: NetworkConfig,
    pub contracts: ContractAddresses,
    pub funding_private_key: Secret,
    pub bridge_validators: Vec<Address>,
    /// `None` means simple majority
    pub bridge_threshold: Option<usize>,
    pub max_sponsored_gas: u64,
    /// Signed requests must expire within this window
    pub request_deadline_window: Duration,
    pub session_key_max_ttl: Duration,
    pub invoice_default_ttl: Duration,
    pub submit_max_attempts: u32,
    pub settlement_poll_interval: Duration,
    pub data_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// `(cert, key)` PEM paths
    pub tls: Option<(PathBuf, PathBuf)>,
    pub log_format: LogFormat,
}

/// Reads variables through a lookup function so tests need no process env.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(name) {
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn address(&self, name: &'static str) -> Result<Address, ConfigError> {
        let value = self.required(name)?;
        parse_address(&value).map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let rpc_url = vars.required(RPC_URL_ENV)?;
        let chain_id: u64 = match vars.optional(CHAIN_ID_ENV) {
            Some(_) => vars.parse(CHAIN_ID_ENV, 0)?,
            None => return Err(ConfigError::Missing(CHAIN_ID_ENV)),
        };
        let l2_rpc_url = vars.optional(L2_RPC_URL_ENV).unwrap_or_else(|| rpc_url.clone());
        let l2_chain_id: u64 = vars.parse(L2_CHAIN_ID_ENV, chain_id)?;

        let bridge = vars.address(BRIDGE_ADDRESS_ENV)?;
        let l2_bridge = match vars.optional(L2_BRIDGE_ADDRESS_ENV) {
            Some(_) => vars.address(L2_BRIDGE_ADDRESS_ENV)?,
            None => bridge,
        };
        let contracts = ContractAddresses {
            vyra_token: vars.address(VYRA_TOKEN_ADDRESS_ENV)?,
            paymaster: vars.address(PAYMASTER_ADDRESS_ENV)?,
            pos: vars.address(POS_ADDRESS_ENV)?,
            bridge,
            l2_bridge,
            entry_point: vars.address(ENTRY_POINT_ADDRESS_ENV)?,
        };

        let funding_private_key = Secret(vars.required(FUNDING_PRIVATE_KEY_ENV)?);

        let bridge_validators = vars
            .required(BRIDGE_VALIDATORS_ENV)?
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                parse_address(v).map_err(|e| ConfigError::Invalid {
                    name: BRIDGE_VALIDATORS_ENV,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if bridge_validators.is_empty() {
            return Err(ConfigError::Missing(BRIDGE_VALIDATORS_ENV));
        }
        let distinct: HashSet<&Address> = bridge_validators.iter().collect();
        if distinct.len() != bridge_validators.len() {
            return Err(ConfigError::Invalid {
                name: BRIDGE_VALIDATORS_ENV,
                reason: "validator addresses must be distinct".to_string(),
            });
        }
        let bridge_threshold = match vars.optional(BRIDGE_THRESHOLD_ENV) {
            Some(_) => {
                let threshold = vars.parse::<usize>(BRIDGE_THRESHOLD_ENV, 0)?;
                if threshold == 0 || threshold > bridge_validators.len() {
                    return Err(ConfigError::Invalid {
                        name: BRIDGE_THRESHOLD_ENV,
                        reason: format!("must be between 1 and {}", bridge_validators.len()),
                    });
                }
                Some(threshold)
            }
            None => None,
        };

        let submit_max_attempts = vars.parse(SUBMIT_MAX_ATTEMPTS_ENV, DEFAULT_SUBMIT_MAX_ATTEMPTS)?;
        if submit_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: SUBMIT_MAX_ATTEMPTS_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        let request_deadline_window = Duration::from_secs(vars.parse(
            REQUEST_DEADLINE_WINDOW_ENV,
            DEFAULT_REQUEST_DEADLINE_WINDOW_SECS,
        )?);
        if request_deadline_window.is_zero() {
            return Err(ConfigError::Invalid {
                name: REQUEST_DEADLINE_WINDOW_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        let tls = match (
            vars.optional(TLS_CERT_PATH_ENV),
            vars.optional(TLS_KEY_PATH_ENV),
        ) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: TLS_CERT_PATH_ENV,
                    reason: format!("{TLS_CERT_PATH_ENV} and {TLS_KEY_PATH_ENV} must be set together"),
                })
            }
        };

        let log_format = match vars.optional(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            l1: local_network(rpc_url, chain_id),
            l2: local_network(l2_rpc_url, l2_chain_id),
            contracts,
            funding_private_key,
            bridge_validators,
            bridge_threshold,
            max_sponsored_gas: vars.parse(MAX_SPONSORED_GAS_ENV, DEFAULT_MAX_SPONSORED_GAS)?,
            request_deadline_window,
            session_key_max_ttl: Duration::from_secs(
                vars.parse(SESSION_KEY_MAX_TTL_ENV, DEFAULT_SESSION_KEY_MAX_TTL_SECS)?,
            ),
            invoice_default_ttl: Duration::from_secs(
                vars.parse(INVOICE_DEFAULT_TTL_ENV, DEFAULT_INVOICE_TTL_SECS)?,
            ),
            submit_max_attempts,
            settlement_poll_interval: Duration::from_secs(
                vars.parse(SETTLEMENT_POLL_ENV, DEFAULT_SETTLEMENT_POLL_SECS)?,
            ),
            data_dir: vars.optional(DATA_DIR_ENV).map(PathBuf::from),
            host: vars.optional(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: vars.parse(PORT_ENV, 8080)?,
            tls,
            log_format,
        })
    }

    /// Log format straight from the environment, before full config loads.
    pub fn log_format_from_env() -> LogFormat {
        match std::env::var(LOG_FORMAT_ENV).as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn base_vars() -> HashMap<&'static str, String> {
        let addr = |b: u8| format!("0x{}", format!("{b:02x}").repeat(20));
        HashMap::from([
            (RPC_URL_ENV, "http://localhost:8545".to_string()),
            (CHAIN_ID_ENV, "31337".to_string()),
            (VYRA_TOKEN_ADDRESS_ENV, addr(1)),
            (PAYMASTER_ADDRESS_ENV, addr(2)),
            (POS_ADDRESS_ENV, addr(3)),
            (BRIDGE_ADDRESS_ENV, addr(4)),
            (ENTRY_POINT_ADDRESS_ENV, addr(5)),
            (
                FUNDING_PRIVATE_KEY_ENV,
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            ),
            (BRIDGE_VALIDATORS_ENV, format!("{}, {}, {}", addr(6), addr(7), addr(8))),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.l1.chain_id, 31337);
        assert_eq!(config.l2, config.l1);
        assert_eq!(config.contracts.l2_bridge, config.contracts.bridge);
        assert_eq!(config.bridge_validators.len(), 3);
        assert_eq!(config.bridge_threshold, None);
        assert_eq!(config.max_sponsored_gas, DEFAULT_MAX_SPONSORED_GAS);
        assert_eq!(config.request_deadline_window, Duration::from_secs(600));
        assert_eq!(config.submit_max_attempts, 3);
        assert_eq!(config.port, 8080);
        assert!(config.tls.is_none());
        assert!(config.data_dir.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn missing_required_variable_is_named() {
        let mut vars = base_vars();
        vars.remove(PAYMASTER_ADDRESS_ENV);
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing(PAYMASTER_ADDRESS_ENV));

        let mut vars = base_vars();
        vars.insert(RPC_URL_ENV, "   ".to_string());
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing(RPC_URL_ENV));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut vars = base_vars();
        vars.insert(CHAIN_ID_ENV, "mainnet".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: CHAIN_ID_ENV, .. })
        ));

        let mut vars = base_vars();
        vars.insert(BRIDGE_VALIDATORS_ENV, "0x1234".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: BRIDGE_VALIDATORS_ENV, .. })
        ));

        let mut vars = base_vars();
        vars.insert(BRIDGE_THRESHOLD_ENV, "4".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: BRIDGE_THRESHOLD_ENV, .. })
        ));

        let mut vars = base_vars();
        let validator = format!("0x{}", "06".repeat(20));
        vars.insert(BRIDGE_VALIDATORS_ENV, format!("{validator},{validator}"));
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: BRIDGE_VALIDATORS_ENV, .. })
        ));

        let mut vars = base_vars();
        vars.insert(REQUEST_DEADLINE_WINDOW_ENV, "0".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: REQUEST_DEADLINE_WINDOW_ENV, .. })
        ));

        let mut vars = base_vars();
        vars.insert(TLS_CERT_PATH_ENV, "/tmp/cert.pem".to_string());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn l2_overrides() {
        let mut vars = base_vars();
        vars.insert(L2_RPC_URL_ENV, "http://localhost:9545".to_string());
        vars.insert(L2_CHAIN_ID_ENV, "31338".to_string());
        vars.insert(L2_BRIDGE_ADDRESS_ENV, format!("0x{}", "99".repeat(20)));
        vars.insert(BRIDGE_THRESHOLD_ENV, "3".to_string());
        vars.insert(LOG_FORMAT_ENV, "json".to_string());

        let config = load(&vars).unwrap();
        assert_eq!(config.l2.chain_id, 31338);
        assert_eq!(config.l2.rpc_url, "http://localhost:9545");
        assert_ne!(config.contracts.l2_bridge, config.contracts.bridge);
        assert_eq!(config.bridge_threshold, Some(3));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let config = load(&base_vars()).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
        assert!(debug.contains("<redacted>"));
    }
}
