//! Externally observable events.
//!
//! Every state-mutating entry point appends its events to the host
//! environment's log in the order the transitions occur. The log is the
//! audit surface; nothing in the core reads it back.

use alloy_primitives::{Address, U256};

use crate::auction::AuctionStatus;
use crate::types::fixed::Fixed64;

/// One observable state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    AuctionStatusSet {
        epoch: u64,
        status: AuctionStatus,
    },
    OrderAdded {
        epoch: u64,
        id: u64,
        buyer: Address,
        price: Fixed64,
        size: U256,
        is_limit: bool,
    },
    OrderCanceled {
        epoch: u64,
        id: u64,
        buyer: Address,
    },
    OrderWithdrawn {
        epoch: u64,
        buyer: Address,
        refund: U256,
        fill: U256,
    },
    AuctionPricesSet {
        epoch: u64,
        strike: Fixed64,
        offset_strike: Fixed64,
        spot: Fixed64,
        time_to_maturity: Fixed64,
        max_price: Fixed64,
        min_price: Fixed64,
    },
    OptionParametersSet {
        epoch: u64,
        expiry: u64,
        strike: Fixed64,
        long_token_id: U256,
        short_token_id: U256,
    },
    AuctionProcessed {
        epoch: u64,
        collateral_used: U256,
        short_contracts: U256,
        premiums: U256,
    },
    PerformanceFeeCollected {
        epoch: u64,
        net_income: U256,
        fee: U256,
    },
    WithdrawalFeeCollected {
        epoch: u64,
        fee_collateral: U256,
        fee_short_contracts: U256,
    },
    ReservedLiquidityWithdrawn {
        epoch: u64,
        amount: U256,
    },
    DistributionSent {
        epoch: u64,
        collateral: U256,
        short_contracts: U256,
        receiver: Address,
    },
    Withdraw {
        caller: Address,
        receiver: Address,
        owner: Address,
        assets: U256,
        shares: U256,
    },
}
