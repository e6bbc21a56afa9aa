//! The vault's internal share ledger.
//!
//! Shares are only minted by deposit processing and burned by withdrawals;
//! between those they move freely (queue to redeemer, holder to holder).
//! Plain fungible accounting over `BTreeMap` for deterministic state.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::error::{Error, Result};

/// Fungible share balances and total supply.
#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    balances: BTreeMap<Address, U256>,
    total_supply: U256,
}

impl ShareLedger {
    /// Shares held by `owner`.
    pub fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or(U256::ZERO)
    }

    /// Total shares outstanding.
    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Mint shares to `to`.
    pub fn mint(&mut self, to: Address, amount: U256) -> Result<()> {
        let balance = self.balance_of(to);
        self.balances
            .insert(to, balance.checked_add(amount).ok_or(Error::Overflow)?);
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(Error::Overflow)?;
        Ok(())
    }

    /// Burn shares from `from`.
    pub fn burn(&mut self, from: Address, amount: U256) -> Result<()> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(Error::InsufficientBalance);
        }
        self.balances.insert(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    /// Move shares between holders.
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance);
        }
        self.balances.insert(from, from_balance - amount);
        let to_balance = self.balance_of(to);
        self.balances.insert(to, to_balance + amount);
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::from([tag; 20])
    }

    #[test]
    fn test_mint_burn_supply() {
        let mut shares = ShareLedger::default();
        shares.mint(addr(1), U256::from(100u64)).unwrap();
        shares.mint(addr(2), U256::from(50u64)).unwrap();
        assert_eq!(shares.total_supply(), U256::from(150u64));

        shares.burn(addr(1), U256::from(40u64)).unwrap();
        assert_eq!(shares.balance_of(addr(1)), U256::from(60u64));
        assert_eq!(shares.total_supply(), U256::from(110u64));

        assert_eq!(
            shares.burn(addr(2), U256::from(51u64)),
            Err(Error::InsufficientBalance)
        );
    }

    #[test]
    fn test_transfer() {
        let mut shares = ShareLedger::default();
        shares.mint(addr(1), U256::from(10u64)).unwrap();
        shares.transfer(addr(1), addr(2), U256::from(4u64)).unwrap();
        assert_eq!(shares.balance_of(addr(1)), U256::from(6u64));
        assert_eq!(shares.balance_of(addr(2)), U256::from(4u64));
        assert_eq!(
            shares.transfer(addr(2), addr(1), U256::from(5u64)),
            Err(Error::InsufficientBalance)
        );
    }
}
