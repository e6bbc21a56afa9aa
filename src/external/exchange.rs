//! The external exchange-helper contract surface.
//!
//! The helper swaps an arbitrary input token into the vault's collateral
//! token so buyers and depositors can fund orders without holding collateral
//! up front. [`FixedRateExchange`] is the deterministic reference
//! implementation with configurable pair rates.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::error::{Error, Result};
use crate::external::tokens::TokenLedger;
use crate::types::fixed::Fixed64;

/// Swap request attached to the `swap_and_*` entry points.
#[derive(Debug, Clone, Copy)]
pub struct SwapArgs {
    /// Token the caller pays with.
    pub token_in: Address,
    /// Amount of `token_in` to swap.
    pub amount_in: U256,
    /// Minimum acceptable output in the target token.
    pub min_amount_out: U256,
}

/// The swap surface consumed by the queue and auction entry points.
pub trait ExchangeHelper {
    /// Swap `amount_in` of `token_in` into `token_out`, debiting `payer` and
    /// crediting `recipient`. Fails with [`Error::SwapShortfall`] when the
    /// output is below `min_amount_out`.
    #[allow(clippy::too_many_arguments)]
    fn swap_with_token(
        &mut self,
        tokens: &mut TokenLedger,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        min_amount_out: U256,
        payer: Address,
        recipient: Address,
    ) -> Result<U256>;
}

/// Reference exchange quoting fixed pair rates.
#[derive(Debug, Clone)]
pub struct FixedRateExchange {
    addr: Address,
    /// (token_in, token_out) -> output units per input unit (64.64).
    rates: BTreeMap<(Address, Address), Fixed64>,
}

impl FixedRateExchange {
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            rates: BTreeMap::new(),
        }
    }

    /// Quote `rate` output units per input unit for a pair.
    pub fn set_rate(&mut self, token_in: Address, token_out: Address, rate: Fixed64) {
        self.rates.insert((token_in, token_out), rate);
    }
}

impl ExchangeHelper for FixedRateExchange {
    fn swap_with_token(
        &mut self,
        tokens: &mut TokenLedger,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        min_amount_out: U256,
        payer: Address,
        recipient: Address,
    ) -> Result<U256> {
        let rate = self
            .rates
            .get(&(token_in, token_out))
            .copied()
            .ok_or(Error::InvalidArgument)?;
        let amount_out = rate.mulu(amount_in)?;
        if amount_out < min_amount_out {
            return Err(Error::SwapShortfall);
        }
        tokens.transfer(token_in, payer, self.addr, amount_in)?;
        tokens.mint(token_out, recipient, amount_out);
        Ok(amount_out)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
