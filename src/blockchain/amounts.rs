// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Decimal amount handling.
//!
//! Amounts cross the API boundary as decimal strings ("1.5") and are
//! converted to integer base units (wei) here. Floating point is never used.

use alloy::primitives::U256;

/// Errors produced while parsing a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount must be a decimal number (e.g. \"1.5\")")]
    Malformed,

    #[error("too many decimal places (max {0})")]
    TooPrecise(u8),

    #[error("amount is too large")]
    Overflow,

    #[error("amount must be greater than zero")]
    NotPositive,
}

/// Parse a human-readable amount to base units.
///
/// # Arguments
/// * `amount` - Amount as a string (e.g., "1.5")
/// * `decimals` - Number of decimals (18 for native coin and VYR)
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (amount, None),
    };

    // "1." and ".5" are rejected along with signs and exponents
    let digits_only = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(whole) || fraction.is_some_and(|f| !digits_only(f)) {
        return Err(AmountError::Malformed);
    }

    let whole = U256::from_str_radix(whole, 10).map_err(|_| AmountError::Overflow)?;

    let fraction_units = match fraction {
        Some(dec_str) => {
            if dec_str.len() > decimals as usize {
                return Err(AmountError::TooPrecise(decimals));
            }
            // Pad with zeros to match decimals
            let padded = format!("{:0<width$}", dec_str, width = decimals as usize);
            U256::from_str_radix(&padded, 10).map_err(|_| AmountError::Malformed)?
        }
        None => U256::ZERO,
    };

    let multiplier = U256::from(10u64).pow(U256::from(decimals));
    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(fraction_units))
        .ok_or(AmountError::Overflow)
}

/// Parse an amount that must be strictly positive.
pub fn parse_positive_amount(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let value = parse_amount(amount, decimals)?;
    if value.is_zero() {
        return Err(AmountError::NotPositive);
    }
    Ok(value)
}

/// Format base units to a human-readable amount.
pub fn format_amount(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_whole() {
        let result = parse_amount("1", 18).unwrap();
        assert_eq!(result, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_decimal() {
        let result = parse_amount("1.5", 18).unwrap();
        assert_eq!(result, U256::from(1_500_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_small() {
        let result = parse_amount("0.001", 18).unwrap();
        assert_eq!(result, U256::from(1_000_000_000_000_000u64));
    }

    #[test]
    fn test_parse_amount_rejects_malformed_input() {
        assert_eq!(parse_amount("", 18), Err(AmountError::Empty));
        assert_eq!(parse_amount("-1", 18), Err(AmountError::Malformed));
        assert_eq!(parse_amount("+1", 18), Err(AmountError::Malformed));
        assert_eq!(parse_amount("1e18", 18), Err(AmountError::Malformed));
        assert_eq!(parse_amount("1.", 18), Err(AmountError::Malformed));
        assert_eq!(parse_amount(".5", 18), Err(AmountError::Malformed));
        assert_eq!(parse_amount("1.2.3", 18), Err(AmountError::Malformed));
        assert_eq!(parse_amount("0.1234567", 6), Err(AmountError::TooPrecise(6)));
    }

    #[test]
    fn test_parse_positive_amount_rejects_zero() {
        assert_eq!(parse_positive_amount("0", 18), Err(AmountError::NotPositive));
        assert_eq!(parse_positive_amount("0.000", 18), Err(AmountError::NotPositive));
        assert!(parse_positive_amount("10", 18).is_ok());
    }

    #[test]
    fn test_parse_amount_overflow() {
        let huge = "9".repeat(80);
        assert_eq!(parse_amount(&huge, 18), Err(AmountError::Overflow));
    }

    #[test]
    fn test_format_amount() {
        let one = U256::from(1_000_000_000_000_000_000u64);
        assert_eq!(format_amount(one, 18), "1");

        let one_and_half = U256::from(1_500_000_000_000_000_000u64);
        assert_eq!(format_amount(one_and_half, 18), "1.5");

        assert_eq!(format_amount(U256::ZERO, 18), "0");
        assert_eq!(format_amount(U256::from(1u64), 18), "0.000000000000000001");
    }
}
