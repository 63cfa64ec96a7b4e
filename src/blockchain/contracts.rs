// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Vyra Network

//! Contract interfaces the relay calls and their calldata builders.
//!
//! Only the off-chain side lives here: the functions below produce the
//! ABI-encoded calldata that the funding account submits.

use alloy::{
    primitives::{Address, Bytes, Log, B256, U256},
    sol,
    sol_types::{SolCall, SolEvent},
};

// Define the contract interfaces using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }

    interface IVyraPaymaster {
        function sponsorGas(address user, uint256 gasUsed) external;
    }

    interface IVyraPOS {
        function processPayment(bytes32 invoiceId, address customer, uint256 amount) external returns (bytes32);
    }

    interface IVyraBridge {
        event Deposited(bytes32 indexed depositId, address indexed sender, uint256 amount);

        function deposit(bytes32 depositId, uint256 amount) external;
        function processDeposit(bytes32 depositId, uint256 amount) external;
        function releaseWithdrawal(uint256 amount, bytes32 l2TxHash, bytes[] signatures) external returns (bytes32);
    }
}

/// `sponsorGas(user, gasUsed)` on the paymaster.
pub fn sponsor_gas_calldata(user: Address, gas_used: U256) -> Bytes {
    IVyraPaymaster::sponsorGasCall { user, gasUsed: gas_used }
        .abi_encode()
        .into()
}

/// `transferFrom(from, to, amount)` on the VYR token.
pub fn transfer_from_calldata(from: Address, to: Address, amount: U256) -> Bytes {
    IERC20::transferFromCall { from, to, amount }.abi_encode().into()
}

/// `processPayment(invoiceId, customer, amount)` on the POS contract.
pub fn process_payment_calldata(invoice_id: B256, customer: Address, amount: U256) -> Bytes {
    IVyraPOS::processPaymentCall {
        invoiceId: invoice_id,
        customer,
        amount,
    }
    .abi_encode()
    .into()
}

/// `processDeposit(depositId, amount)` on the destination bridge.
pub fn process_deposit_calldata(deposit_id: B256, amount: U256) -> Bytes {
    IVyraBridge::processDepositCall {
        depositId: deposit_id,
        amount,
    }
    .abi_encode()
    .into()
}

/// `releaseWithdrawal(amount, l2TxHash, signatures)` on the destination bridge.
pub fn release_withdrawal_calldata(amount: U256, l2_tx_hash: B256, signatures: Vec<Bytes>) -> Bytes {
    IVyraBridge::releaseWithdrawalCall {
        amount,
        l2TxHash: l2_tx_hash,
        signatures,
    }
    .abi_encode()
    .into()
}

/// `Deposited` events emitted by `bridge` among `logs`.
pub fn deposited_events(logs: &[Log], bridge: Address) -> Vec<IVyraBridge::Deposited> {
    logs.iter()
        .filter(|log| log.address == bridge)
        .filter_map(|log| IVyraBridge::Deposited::decode_log(log).ok())
        .map(|decoded| decoded.data)
        .collect()
}
