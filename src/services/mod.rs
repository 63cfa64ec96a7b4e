// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Core components. Each owns its entity table and is shared via `Arc`.

pub mod bridge;
pub mod identity;
pub mod payment;
pub mod paymaster;
pub mod session;
pub mod wallet;

pub use bridge::{BridgeCoordinator, BridgeError, ValidatorSet};
pub use identity::{IdentityError, IdentityManager};
pub use payment::{PaymentError, PaymentLedger};
pub use paymaster::{PaymasterError, PaymasterRelay};
pub use session::{SessionError, SessionKeyManager};
pub use wallet::{WalletError, WalletService};
