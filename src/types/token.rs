//! Token-id derivation for pool positions and queue claims.
//!
//! The pool keys its fungible-per-id balances by a 256-bit id whose top byte
//! tags the position kind; the deposit queue keys claim tokens by its own
//! address and the epoch. Both layouts are fixed by the external contracts,
//! so ids are packed bit-exactly rather than hashed.

use alloy_primitives::{Address, U256};

use crate::types::fixed::Fixed64;

/// Position kind carried in the top byte of a pool token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenType {
    UnderlyingFreeLiq = 0,
    BaseFreeLiq = 1,
    UnderlyingReservedLiq = 2,
    BaseReservedLiq = 3,
    LongCall = 4,
    ShortCall = 5,
    LongPut = 6,
    ShortPut = 7,
}

/// Long-side token type for the option kind.
pub fn long_token_type(is_call: bool) -> TokenType {
    if is_call {
        TokenType::LongCall
    } else {
        TokenType::LongPut
    }
}

/// Short-side token type for the option kind.
pub fn short_token_type(is_call: bool) -> TokenType {
    if is_call {
        TokenType::ShortCall
    } else {
        TokenType::ShortPut
    }
}

/// Pool token id: token type in bits 248..256, expiry in bits 128..192,
/// strike (64.64 raw) in bits 0..128.
pub fn option_token_id(token_type: TokenType, expiry: u64, strike: Fixed64) -> U256 {
    (U256::from(token_type as u8) << 248)
        | (U256::from(expiry) << 128)
        | U256::from(strike.0 as u128)
}

/// Reserved-liquidity pool token id for the collateral side.
pub fn reserved_liquidity_id(is_call: bool) -> U256 {
    let tag = if is_call {
        TokenType::UnderlyingReservedLiq
    } else {
        TokenType::BaseReservedLiq
    };
    U256::from(tag as u8) << 248
}

/// Free-liquidity pool token id for the collateral side.
pub fn free_liquidity_id(is_call: bool) -> U256 {
    let tag = if is_call {
        TokenType::UnderlyingFreeLiq
    } else {
        TokenType::BaseFreeLiq
    };
    U256::from(tag as u8) << 248
}

/// Claim token id: queue address in the high 20 bytes, epoch in the next 8,
/// low 4 bytes zero.
pub fn claim_token_id(queue: Address, epoch: u64) -> U256 {
    let mut bytes = [0u8; 32];
    bytes[..20].copy_from_slice(queue.as_slice());
    bytes[20..28].copy_from_slice(&epoch.to_be_bytes());
    U256::from_be_bytes(bytes)
}

/// Recover the queue address and epoch from a claim token id.
pub fn parse_claim_token_id(id: U256) -> (Address, u64) {
    let bytes = id.to_be_bytes::<32>();
    let queue = Address::from_slice(&bytes[..20]);
    let epoch = u64::from_be_bytes(bytes[20..28].try_into().expect("8 byte slice"));
    (queue, epoch)
}

// ============================================================================
// Unit Tests
// ============================================================================
