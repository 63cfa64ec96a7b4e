// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Identifiers for invoices and bridge transfers.
//!
//! Ids are 32 bytes from the OS CSPRNG rendered as 64 lowercase hex
//! characters without prefix. They double as the bytes32 passed to
//! contracts, see [`id_to_bytes32`].

use alloy::primitives::B256;
use k256::elliptic_curve::rand_core::{OsRng, RngCore};

/// Length of an id in hex characters.
pub const ID_HEX_LEN: usize = 64;

/// Generate a fresh random id.
pub fn random_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    alloy::hex::encode(bytes)
}

/// Whether `id` has the shape of a generated id.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_HEX_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// The bytes32 form of an id, `None` for malformed ids.
pub fn id_to_bytes32(id: &str) -> Option<B256> {
    if !is_valid_id(id) {
        return None;
    }
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_well_formed() {
        let ids: Vec<String> = (0..10_000).map(|_| random_id()).collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.iter().all(|id| is_valid_id(id)));
    }

    #[test]
    fn test_consecutive_ids_are_not_sequential() {
        let ids: Vec<U256> = (0..1_000)
            .map(|_| U256::from_be_bytes(id_to_bytes32(&random_id()).unwrap().0))
            .collect();

        // No constant stride between neighbours
        let strides: HashSet<U256> = ids
            .windows(2)
            .map(|pair| pair[1].wrapping_sub(pair[0]))
            .collect();
        assert!(strides.len() > 990);
        assert!(!strides.contains(&U256::from(1u64)));
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id(&"a".repeat(64)));
        assert!(!is_valid_id(&"A".repeat(64)));
        assert!(!is_valid_id(&"a".repeat(63)));
        assert!(!is_valid_id(&format!("0x{}", "a".repeat(62))));
        assert!(id_to_bytes32("nope").is_none());
    }
}
