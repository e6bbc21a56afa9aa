//! Per-epoch deposit queue.
//!
//! Depositors park collateral in the queue during an epoch and receive
//! fungible claim tokens, one per collateral unit, under a token id derived
//! from the queue address and the epoch. When the keeper rolls the epoch the
//! queued collateral converts into vault shares at a single price-per-share
//! recorded for that claim id; holders redeem processed claims for shares at
//! any later time. Claims of the still-open epoch can only be cancelled,
//! which returns the collateral one-for-one.
//!
//! A depositor holds claims from at most one unprocessed epoch: depositing
//! sweeps any processed claims into shares first.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, U256};

use crate::error::{Error, Result};
use crate::external::{Ctx, Env};
use crate::types::fixed::pow10;
use crate::types::token::{claim_token_id, parse_claim_token_id};
use crate::vault::shares::ShareLedger;

/// Price-per-share scale: shares per claim token are recorded at 10^18.
fn pps_scale() -> U256 {
    pow10(18)
}

/// The deposit queue of one vault.
pub struct DepositQueue {
    /// The queue's own account; holds queued collateral and unredeemed shares.
    addr: Address,
    /// The owning vault.
    vault: Address,
    /// Collateral token.
    asset: Address,
    /// Epoch whose claim token is currently being minted.
    epoch: u64,
    /// Upper bound on queued plus vaulted assets.
    max_tvl: U256,
    paused: bool,
    /// (claim id, holder) -> balance.
    balances: BTreeMap<(U256, Address), U256>,
    /// claim id -> total supply.
    supplies: BTreeMap<U256, U256>,
    /// holder -> claim ids with non-zero balance.
    claims_by_holder: BTreeMap<Address, BTreeSet<U256>>,
    /// claim id -> shares per claim token, 10^18 scaled.
    price_per_share: BTreeMap<U256, U256>,
}

impl DepositQueue {
    pub fn new(addr: Address, vault: Address, asset: Address, max_tvl: U256) -> Self {
        Self {
            addr,
            vault,
            asset,
            epoch: 0,
            max_tvl,
            paused: false,
            balances: BTreeMap::new(),
            supplies: BTreeMap::new(),
            claims_by_holder: BTreeMap::new(),
            price_per_share: BTreeMap::new(),
        }
    }

    fn require_vault(&self, ctx: &Ctx) -> Result<()> {
        if ctx.caller != self.vault {
            return Err(Error::NotVault);
        }
        Ok(())
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// The queue's account address.
    pub fn address(&self) -> Address {
        self.addr
    }

    /// Claim token id of the open epoch.
    pub fn current_token_id(&self) -> U256 {
        claim_token_id(self.addr, self.epoch)
    }

    /// Epoch whose claims are currently minted.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Configured TVL cap.
    pub fn max_tvl(&self) -> U256 {
        self.max_tvl
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A holder's balance of one claim id.
    pub fn claim_balance(&self, token_id: U256, holder: Address) -> U256 {
        self.balances
            .get(&(token_id, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Total supply of one claim id.
    pub fn claim_supply(&self, token_id: U256) -> U256 {
        self.supplies.get(&token_id).copied().unwrap_or(U256::ZERO)
    }

    /// Recorded price-per-share for a processed claim id (10^18 scaled).
    pub fn price_per_share(&self, token_id: U256) -> U256 {
        self.price_per_share
            .get(&token_id)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Shares a redeem of the holder's whole balance would yield; zero for
    /// the open epoch's claim id.
    pub fn preview_unredeemed(&self, token_id: U256, holder: Address) -> Result<U256> {
        if token_id == self.current_token_id() {
            return Ok(U256::ZERO);
        }
        let balance = self.claim_balance(token_id, holder);
        balance
            .checked_mul(self.price_per_share(token_id))
            .map(|v| v / pps_scale())
            .ok_or(Error::Overflow)
    }

    // ========================================================================
    // Claim token accounting
    // ========================================================================

    fn mint_claim(&mut self, to: Address, token_id: U256, amount: U256) -> Result<()> {
        let balance = self.claim_balance(token_id, to);
        self.balances.insert(
            (token_id, to),
            balance.checked_add(amount).ok_or(Error::Overflow)?,
        );
        let supply = self.claim_supply(token_id);
        self.supplies
            .insert(token_id, supply.checked_add(amount).ok_or(Error::Overflow)?);
        if !amount.is_zero() {
            self.claims_by_holder.entry(to).or_default().insert(token_id);
        }
        Ok(())
    }

    fn burn_claim(&mut self, from: Address, token_id: U256, amount: U256) -> Result<()> {
        let balance = self.claim_balance(token_id, from);
        if balance < amount {
            return Err(Error::InsufficientBalance);
        }
        let remaining = balance - amount;
        self.balances.insert((token_id, from), remaining);
        let supply = self.claim_supply(token_id);
        self.supplies.insert(token_id, supply - amount);
        if remaining.is_zero() {
            if let Some(ids) = self.claims_by_holder.get_mut(&from) {
                ids.remove(&token_id);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Deposits
    // ========================================================================

    /// Queue `amount` collateral, pulling it from the caller (or wrapping
    /// attached native value). `vault_assets` is the vault's current asset
    /// total for the TVL check.
    pub fn deposit(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        amount: U256,
        vault_assets: U256,
        shares: &mut ShareLedger,
    ) -> Result<()> {
        self.check_deposit(env, amount, vault_assets)?;
        if ctx.value > U256::ZERO {
            if self.asset != env.tokens.wrapped_native() {
                return Err(Error::WrappedNativeMismatch);
            }
            if ctx.value != amount {
                return Err(Error::InvalidArgument);
            }
            env.tokens.deposit_native(self.addr, ctx.value);
        } else {
            env.tokens
                .transfer_from(self.asset, self.addr, ctx.caller, self.addr, amount)?;
        }
        self.credit_deposit(ctx.caller, amount, shares)
    }

    /// Queue collateral a swap already credited to the queue's account.
    pub fn deposit_prefunded(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        amount: U256,
        vault_assets: U256,
        shares: &mut ShareLedger,
    ) -> Result<()> {
        self.check_deposit(env, amount, vault_assets)?;
        self.credit_deposit(ctx.caller, amount, shares)
    }

    fn check_deposit(&self, env: &Env, amount: U256, vault_assets: U256) -> Result<()> {
        if self.paused {
            return Err(Error::Paused);
        }
        if amount.is_zero() {
            return Err(Error::ValueBelowMinimum);
        }
        let queued = env.tokens.balance_of(self.asset, self.addr);
        let total = queued
            .checked_add(vault_assets)
            .and_then(|v| v.checked_add(amount))
            .ok_or(Error::Overflow)?;
        if total > self.max_tvl {
            return Err(Error::MaxTvlExceeded);
        }
        Ok(())
    }

    /// Sweep processed claims into shares, then mint the new claim.
    fn credit_deposit(
        &mut self,
        depositor: Address,
        amount: U256,
        shares: &mut ShareLedger,
    ) -> Result<()> {
        self.redeem_max_for(depositor, depositor, shares)?;
        self.mint_claim(depositor, self.current_token_id(), amount)
    }

    /// Burn open-epoch claims and return the collateral one-for-one.
    pub fn cancel(&mut self, env: &mut Env, ctx: &Ctx, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Err(Error::ValueBelowMinimum);
        }
        self.burn_claim(ctx.caller, self.current_token_id(), amount)?;
        env.tokens.transfer(self.asset, self.addr, ctx.caller, amount)
    }

    // ========================================================================
    // Epoch processing
    // ========================================================================

    /// Convert all queued collateral into vault shares (vault only).
    ///
    /// `total_assets_before` is the vault's asset total measured before the
    /// collateral moves; standard share accounting applies. The recorded
    /// price-per-share is zero when the epoch saw no deposits, and the claim
    /// id then advances to the next epoch's.
    pub fn process_deposits(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        total_assets_before: U256,
        shares: &mut ShareLedger,
    ) -> Result<U256> {
        self.require_vault(ctx)?;
        let queued = env.tokens.balance_of(self.asset, self.addr);
        let supply = self.claim_supply(self.current_token_id());
        env.tokens.transfer(self.asset, self.addr, self.vault, queued)?;

        let minted = if shares.total_supply().is_zero() {
            queued
        } else if queued.is_zero() {
            U256::ZERO
        } else {
            if total_assets_before.is_zero() {
                return Err(Error::DivisionByZero);
            }
            queued
                .checked_mul(shares.total_supply())
                .ok_or(Error::Overflow)?
                / total_assets_before
        };
        shares.mint(self.addr, minted)?;

        let pps = if supply.is_zero() {
            U256::ZERO
        } else {
            minted.checked_mul(pps_scale()).ok_or(Error::Overflow)? / supply
        };
        self.price_per_share.insert(self.current_token_id(), pps);
        self.epoch += 1;
        Ok(minted)
    }

    // ========================================================================
    // Redemption
    // ========================================================================

    /// Burn the owner's processed claims of `token_id` and send the shares
    /// they bought to `receiver`.
    pub fn redeem(
        &mut self,
        ctx: &Ctx,
        token_id: U256,
        receiver: Address,
        shares: &mut ShareLedger,
    ) -> Result<U256> {
        if token_id == self.current_token_id() {
            return Err(Error::CurrentClaimTokenNotRedeemable);
        }
        self.redeem_one(ctx.caller, token_id, receiver, shares)
    }

    /// Redeem every processed claim the caller holds.
    pub fn redeem_max(
        &mut self,
        ctx: &Ctx,
        receiver: Address,
        shares: &mut ShareLedger,
    ) -> Result<U256> {
        self.redeem_max_for(ctx.caller, receiver, shares)
    }

    fn redeem_max_for(
        &mut self,
        owner: Address,
        receiver: Address,
        shares: &mut ShareLedger,
    ) -> Result<U256> {
        let current = self.current_token_id();
        let ids: Vec<U256> = self
            .claims_by_holder
            .get(&owner)
            .map(|set| set.iter().copied().filter(|id| *id != current).collect())
            .unwrap_or_default();
        let mut total = U256::ZERO;
        for id in ids {
            total = total
                .checked_add(self.redeem_one(owner, id, receiver, shares)?)
                .ok_or(Error::Overflow)?;
        }
        Ok(total)
    }

    fn redeem_one(
        &mut self,
        owner: Address,
        token_id: U256,
        receiver: Address,
        shares: &mut ShareLedger,
    ) -> Result<U256> {
        let balance = self.claim_balance(token_id, owner);
        self.burn_claim(owner, token_id, balance)?;
        let owed = balance
            .checked_mul(self.price_per_share(token_id))
            .ok_or(Error::Overflow)?
            / pps_scale();
        shares.transfer(self.addr, receiver, owed)?;
        Ok(owed)
    }

    // ========================================================================
    // Administration (vault only)
    // ========================================================================

    pub fn set_paused(&mut self, ctx: &Ctx, paused: bool) -> Result<()> {
        self.require_vault(ctx)?;
        self.paused = paused;
        Ok(())
    }

    pub fn set_max_tvl(&mut self, ctx: &Ctx, max_tvl: U256) -> Result<()> {
        self.require_vault(ctx)?;
        if max_tvl.is_zero() {
            return Err(Error::ValueBelowMinimum);
        }
        self.max_tvl = max_tvl;
        Ok(())
    }
}

/// Recover (queue address, epoch) from a claim id. Re-exported here because
/// queue consumers mostly care about claims, not pool ids.
pub fn parse_claim_id(id: U256) -> (Address, u64) {
    parse_claim_token_id(id)
}

// ============================================================================
// Unit Tests
// ============================================================================
