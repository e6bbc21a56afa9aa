//! Deterministic in-memory ERC20-like token substrate.
//!
//! The core contracts only the fungible-balance surface: `balance_of`,
//! `transfer`, `transfer_from`, `approve`, plus wrapped-native minting for
//! deposits that attach native value. Balances live in `BTreeMap`s so that
//! iteration order, and every figure derived from it, is deterministic.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::error::{Error, Result};

/// Multi-token fungible-balance store.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    /// (token, holder) -> balance.
    balances: BTreeMap<(Address, Address), U256>,
    /// (token, owner, spender) -> allowance.
    allowances: BTreeMap<(Address, Address, Address), U256>,
    /// token -> decimals.
    decimals: BTreeMap<Address, u8>,
    /// The wrapped-native token address.
    wrapped_native: Address,
}

impl TokenLedger {
    /// Create a ledger with a designated wrapped-native token.
    pub fn new(wrapped_native: Address) -> Self {
        let mut ledger = Self {
            wrapped_native,
            ..Self::default()
        };
        ledger.register(wrapped_native, 18);
        ledger
    }

    /// Register a token's decimals.
    pub fn register(&mut self, token: Address, decimals: u8) {
        self.decimals.insert(token, decimals);
    }

    /// Decimals of a registered token (18 when unregistered).
    pub fn decimals(&self, token: Address) -> u8 {
        self.decimals.get(&token).copied().unwrap_or(18)
    }

    /// The wrapped-native token address.
    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// Balance of `holder` in `token`.
    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Mint fresh balance (test and substrate use only).
    pub fn mint(&mut self, token: Address, to: Address, amount: U256) {
        let entry = self.balances.entry((token, to)).or_insert(U256::ZERO);
        *entry += amount;
    }

    /// Wrap attached native value into the wrapped-native token.
    pub fn deposit_native(&mut self, to: Address, value: U256) {
        self.mint(self.wrapped_native, to, value);
    }

    /// Move balance between holders.
    pub fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let from_balance = self.balance_of(token, from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance);
        }
        self.balances.insert((token, from), from_balance - amount);
        let to_balance = self.balance_of(token, to);
        self.balances.insert((token, to), to_balance + amount);
        Ok(())
    }

    /// Record an allowance from `owner` toward `spender`.
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((token, owner, spender), amount);
    }

    /// Current allowance from `owner` toward `spender`.
    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Spend an allowance and move the balance.
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let allowance = self.allowance(token, from, spender);
        if allowance < amount {
            return Err(Error::InsufficientAllowance);
        }
        self.allowances
            .insert((token, from, spender), allowance - amount);
        self.transfer(token, from, to, amount)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
