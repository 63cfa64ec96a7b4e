// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Bounded retry with exponential backoff around chain submission.

use std::time::Duration;

use alloy::primitives::B256;

use super::client::{ChainClient, ChainClientError};
use super::types::ContractCall;

/// How often and how patiently a submission is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Submit `call`, retrying transport failures per `policy`.
///
/// Reverts are returned immediately. The idempotency key is kept across
/// attempts so the client can recognize a call it already broadcast.
pub async fn submit_with_retry(
    client: &dyn ChainClient,
    call: ContractCall,
    policy: &RetryPolicy,
) -> Result<B256, ChainClientError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match client.submit(call.clone()).await {
            Ok(tx_hash) => return Ok(tx_hash),
            Err(e) if !e.is_retryable() || attempt >= max_attempts => {
                tracing::warn!(
                    network = %client.network().name,
                    attempt,
                    error = %e,
                    "Chain submission failed"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    network = %client.network().name,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Chain submission failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockChainClient;
    use alloy::primitives::Address;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    fn call() -> ContractCall {
        ContractCall::new(Address::repeat_byte(7), vec![1u8, 2, 3], B256::repeat_byte(9))
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let client = MockChainClient::new();
        client.fail_next(2, ChainClientError::Rpc("connection reset".into()));

        let result = submit_with_retry(&client, call(), &fast_policy(3)).await;
        assert!(result.is_ok());
        assert_eq!(client.submit_attempts(), 3);
        assert_eq!(client.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let client = MockChainClient::new();
        client.fail_next(5, ChainClientError::Rpc("connection reset".into()));

        let result = submit_with_retry(&client, call(), &fast_policy(3)).await;
        assert!(matches!(result, Err(ChainClientError::Rpc(_))));
        assert_eq!(client.submit_attempts(), 3);
        assert!(client.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_revert_is_not_retried() {
        let client = MockChainClient::new();
        client.fail_next(1, ChainClientError::Reverted("execution reverted".into()));

        let result = submit_with_retry(&client, call(), &fast_policy(3)).await;
        assert!(matches!(result, Err(ChainClientError::Reverted(_))));
        assert_eq!(client.submit_attempts(), 1);
    }
}
