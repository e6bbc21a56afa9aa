//! The external options pool contract surface.
//!
//! The pool issues long/short position tokens (fungible per id), custodies
//! the collateral backing written options, holds reserved liquidity for the
//! vault, and publishes a settlement spot after expiry. Only this interface
//! is contracted; [`ReferencePool`] is the deterministic in-memory
//! implementation used by tests and the demo driver.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::error::{Error, Result};
use crate::external::tokens::TokenLedger;
use crate::types::fixed::{self, Fixed64};
use crate::types::token;

/// Pool asset configuration.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub base: Address,
    pub underlying: Address,
    pub base_oracle: Address,
    pub underlying_oracle: Address,
}

/// The pool surface the vault and auction consume.
pub trait OptionPool {
    /// The pool's own account address.
    fn address(&self) -> Address;

    /// Asset configuration.
    fn settings(&self) -> PoolSettings;

    /// Underwrite `size` contracts: pull collateral from `from` (against its
    /// allowance), mint long tokens to `to` and short tokens to `from`.
    fn write_from(
        &mut self,
        tokens: &mut TokenLedger,
        from: Address,
        to: Address,
        expiry: u64,
        strike: Fixed64,
        size: U256,
        is_call: bool,
    ) -> Result<()>;

    /// Schedule divestment of the writer's free liquidity.
    fn set_divestment_timestamp(&mut self, timestamp: u64, is_call: bool);

    /// Sweep reserved liquidity back to `to` as collateral.
    fn withdraw(
        &mut self,
        tokens: &mut TokenLedger,
        to: Address,
        amount: U256,
        is_call: bool,
    ) -> Result<()>;

    /// Settlement spot recorded at `expiry`.
    fn price_after(&self, expiry: u64) -> Result<Fixed64>;

    /// Fungible-per-id balance of `holder`.
    fn balance_of(&self, holder: Address, token_id: U256) -> U256;

    /// Move position tokens between holders.
    fn safe_transfer_from(
        &mut self,
        from: Address,
        to: Address,
        token_id: U256,
        amount: U256,
    ) -> Result<()>;
}

/// Deterministic in-memory pool.
#[derive(Debug, Clone)]
pub struct ReferencePool {
    addr: Address,
    settings: PoolSettings,
    underlying_decimals: u8,
    base_decimals: u8,
    /// (token id, holder) -> balance.
    balances: BTreeMap<(U256, Address), U256>,
    /// expiry -> settlement spot.
    settlement: BTreeMap<u64, Fixed64>,
    /// Divestment timestamps per side (true = underlying/call).
    divestment: BTreeMap<bool, u64>,
}

impl ReferencePool {
    pub fn new(
        addr: Address,
        underlying: Address,
        base: Address,
        underlying_decimals: u8,
        base_decimals: u8,
    ) -> Self {
        Self {
            addr,
            settings: PoolSettings {
                base,
                underlying,
                base_oracle: Address::ZERO,
                underlying_oracle: Address::ZERO,
            },
            underlying_decimals,
            base_decimals,
            balances: BTreeMap::new(),
            settlement: BTreeMap::new(),
            divestment: BTreeMap::new(),
        }
    }

    fn collateral_token(&self, is_call: bool) -> Address {
        if is_call {
            self.settings.underlying
        } else {
            self.settings.base
        }
    }

    fn credit(&mut self, token_id: U256, holder: Address, amount: U256) {
        let entry = self.balances.entry((token_id, holder)).or_insert(U256::ZERO);
        *entry += amount;
    }

    fn debit(&mut self, token_id: U256, holder: Address, amount: U256) -> Result<()> {
        let balance = self.balance_of(holder, token_id);
        if balance < amount {
            return Err(Error::InsufficientBalance);
        }
        self.balances.insert((token_id, holder), balance - amount);
        Ok(())
    }

    /// Record the settlement spot for an expiry.
    pub fn set_settlement_price(&mut self, expiry: u64, spot: Fixed64) {
        self.settlement.insert(expiry, spot);
    }

    /// Divestment timestamp last scheduled for a side.
    pub fn divestment_timestamp(&self, is_call: bool) -> u64 {
        self.divestment.get(&is_call).copied().unwrap_or(0)
    }

    /// Seed reserved liquidity for a vault: credits the reserved-liquidity
    /// position and funds the pool so the sweep can pay out.
    pub fn credit_reserved_liquidity(
        &mut self,
        tokens: &mut TokenLedger,
        vault: Address,
        amount: U256,
        is_call: bool,
    ) {
        self.credit(token::reserved_liquidity_id(is_call), vault, amount);
        tokens.mint(self.collateral_token(is_call), self.addr, amount);
    }
}

impl OptionPool for ReferencePool {
    fn address(&self) -> Address {
        self.addr
    }

    fn settings(&self) -> PoolSettings {
        self.settings
    }

    fn write_from(
        &mut self,
        tokens: &mut TokenLedger,
        from: Address,
        to: Address,
        expiry: u64,
        strike: Fixed64,
        size: U256,
        is_call: bool,
    ) -> Result<()> {
        let required = fixed::contracts_to_collateral(
            size,
            is_call,
            self.underlying_decimals,
            self.base_decimals,
            strike,
        )?;
        tokens.transfer_from(self.collateral_token(is_call), self.addr, from, self.addr, required)?;
        let long_id = token::option_token_id(token::long_token_type(is_call), expiry, strike);
        let short_id = token::option_token_id(token::short_token_type(is_call), expiry, strike);
        self.credit(long_id, to, size);
        self.credit(short_id, from, size);
        Ok(())
    }

    fn set_divestment_timestamp(&mut self, timestamp: u64, is_call: bool) {
        self.divestment.insert(is_call, timestamp);
    }

    fn withdraw(
        &mut self,
        tokens: &mut TokenLedger,
        to: Address,
        amount: U256,
        is_call: bool,
    ) -> Result<()> {
        self.debit(token::reserved_liquidity_id(is_call), to, amount)?;
        tokens.transfer(self.collateral_token(is_call), self.addr, to, amount)
    }

    fn price_after(&self, expiry: u64) -> Result<Fixed64> {
        self.settlement
            .get(&expiry)
            .copied()
            .ok_or(Error::InvalidArgument)
    }

    fn balance_of(&self, holder: Address, token_id: U256) -> U256 {
        self.balances
            .get(&(token_id, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn safe_transfer_from(
        &mut self,
        from: Address,
        to: Address,
        token_id: U256,
        amount: U256,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.debit(token_id, from, amount)?;
        self.credit(token_id, to, amount);
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
