//! Share and collateral accounting.
//!
//! Total assets are the vault's free collateral plus the collateral value of
//! the short position it wrote this epoch. Withdrawals split pro rata across
//! both legs: the withdrawer receives collateral and short-position tokens,
//! less the withdrawal fee on each, and the burned share count follows
//! standard share accounting.

use alloy_primitives::{Address, U256};

use crate::error::{Error, Result};
use crate::external::{Ctx, Env};
use crate::types::fixed::{self, Fixed64};
use crate::types::token::reserved_liquidity_id;
use crate::types::Event;
use crate::vault::Vault;

/// Ceiling division over U256.
fn div_ceil(numerator: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(Error::DivisionByZero);
    }
    Ok((numerator + denominator - U256::from(1u64)) / denominator)
}

impl Vault {
    // ========================================================================
    // Totals
    // ========================================================================

    /// Collateral reserved for pool fees: `reserve_rate` of the balance.
    pub fn total_reserves(&self, env: &Env) -> Result<U256> {
        let balance = env.tokens.balance_of(self.asset, self.addr);
        self.reserve_rate.mulu(balance)
    }

    /// Free collateral: balance less reserves.
    pub fn total_collateral(&self, env: &Env) -> Result<U256> {
        let balance = env.tokens.balance_of(self.asset, self.addr);
        Ok(balance - self.reserve_rate.mulu(balance)?)
    }

    /// Short contracts written for the current epoch's option.
    pub fn total_short_as_contracts(&self, env: &Env) -> U256 {
        match self.options.get(&self.epoch) {
            Some(option) => env.pool.balance_of(self.addr, option.short_token_id),
            None => U256::ZERO,
        }
    }

    /// The short position valued in collateral at its strike.
    pub fn total_short_as_collateral(&self, env: &Env) -> Result<U256> {
        match self.options.get(&self.epoch) {
            Some(option) => fixed::contracts_to_collateral(
                env.pool.balance_of(self.addr, option.short_token_id),
                self.is_call,
                self.underlying_decimals,
                self.base_decimals,
                option.strike,
            ),
            None => Ok(U256::ZERO),
        }
    }

    /// Free collateral plus the short position's collateral value.
    pub fn total_assets(&self, env: &Env) -> Result<U256> {
        let collateral = self.total_collateral(env)?;
        collateral
            .checked_add(self.total_short_as_collateral(env)?)
            .ok_or(Error::Overflow)
    }

    // ========================================================================
    // Share previews
    // ========================================================================

    /// Shares burned to withdraw `assets` (rounds up).
    pub fn preview_withdraw(&self, env: &Env, assets: U256) -> Result<U256> {
        if self.shares.total_supply().is_zero() {
            return Ok(U256::ZERO);
        }
        div_ceil(
            assets
                .checked_mul(self.shares.total_supply())
                .ok_or(Error::Overflow)?,
            self.total_assets(env)?,
        )
    }

    /// Assets released by redeeming `shares` (rounds down).
    pub fn preview_redeem(&self, env: &Env, shares: U256) -> Result<U256> {
        let supply = self.shares.total_supply();
        if supply.is_zero() {
            return Err(Error::DivisionByZero);
        }
        Ok(shares
            .checked_mul(self.total_assets(env)?)
            .ok_or(Error::Overflow)?
            / supply)
    }

    // ========================================================================
    // Withdrawal lock
    // ========================================================================

    /// Share withdrawals stay locked from the auction start until the epoch
    /// is processed.
    fn require_unlocked(&self, env: &Env) -> Result<()> {
        if env.now >= self.start_time && !self.auction_processed {
            return Err(Error::AuctionNotProcessed);
        }
        Ok(())
    }

    // ========================================================================
    // Withdraw / redeem
    // ========================================================================

    /// Withdraw `assets` worth of the vault's position to `receiver`,
    /// burning the owner's shares. Returns the shares burned.
    pub fn withdraw(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        assets: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256> {
        self.enter(env)?;
        let result = (|| {
            self.require_unlocked(env)?;
            if ctx.caller != owner {
                return Err(Error::NotOwner);
            }
            let shares = self.preview_withdraw(env, assets)?;
            self.pay_out(env, ctx, assets, shares, receiver, owner)?;
            Ok(shares)
        })();
        self.exit();
        result
    }

    /// Redeem `shares` for the proportional position. Returns the assets
    /// released.
    pub fn redeem(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<U256> {
        self.enter(env)?;
        let result = (|| {
            self.require_unlocked(env)?;
            if ctx.caller != owner {
                return Err(Error::NotOwner);
            }
            let assets = self.preview_redeem(env, shares)?;
            self.pay_out(env, ctx, assets, shares, receiver, owner)?;
            Ok(assets)
        })();
        self.exit();
        result
    }

    /// Split `assets` across the collateral and short legs, take the
    /// withdrawal fee from each, burn the shares and deliver the rest.
    fn pay_out(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        assets: U256,
        shares: U256,
        receiver: Address,
        owner: Address,
    ) -> Result<()> {
        let total_assets = self.total_assets(env)?;
        let total_collateral = self.total_collateral(env)?;
        let short_collateral = self.total_short_as_collateral(env)?;
        if assets > total_assets {
            return Err(Error::ValueExceedsMaximum);
        }
        let ratio = Fixed64::from_u256_ratio(assets, total_assets)?;
        let collateral_part = ratio.mulu(total_collateral)?;
        let short_part = ratio.mulu(short_collateral)?;

        let option = self.options.get(&self.epoch).copied();
        let short_contracts = match option {
            Some(o) if !short_part.is_zero() => fixed::collateral_to_contracts(
                short_part,
                self.is_call,
                self.underlying_decimals,
                self.base_decimals,
                o.strike,
            )?,
            _ => U256::ZERO,
        };

        let fee_collateral = self.withdrawal_fee.mulu(collateral_part)?;
        let fee_contracts = self.withdrawal_fee.mulu(short_contracts)?;

        self.shares.burn(owner, shares)?;

        env.tokens
            .transfer(self.asset, self.addr, self.fee_recipient, fee_collateral)?;
        if !fee_contracts.is_zero() {
            let short_id = option.expect("short fee implies an option").short_token_id;
            env.pool
                .safe_transfer_from(self.addr, self.fee_recipient, short_id, fee_contracts)?;
        }
        if !fee_collateral.is_zero() || !fee_contracts.is_zero() {
            env.emit(Event::WithdrawalFeeCollected {
                epoch: self.epoch,
                fee_collateral,
                fee_short_contracts: fee_contracts,
            });
        }

        let collateral_out = collateral_part - fee_collateral;
        let contracts_out = short_contracts - fee_contracts;
        env.tokens
            .transfer(self.asset, self.addr, receiver, collateral_out)?;
        if !contracts_out.is_zero() {
            let short_id = option.expect("short leg implies an option").short_token_id;
            env.pool
                .safe_transfer_from(self.addr, receiver, short_id, contracts_out)?;
        }
        env.emit(Event::DistributionSent {
            epoch: self.epoch,
            collateral: collateral_out,
            short_contracts: contracts_out,
            receiver,
        });

        self.total_withdrawals = self
            .total_withdrawals
            .checked_add(assets)
            .ok_or(Error::Overflow)?;
        env.emit(Event::Withdraw {
            caller: ctx.caller,
            receiver,
            owner,
            assets,
            shares,
        });
        Ok(())
    }

    // ========================================================================
    // Fees and reserved liquidity
    // ========================================================================

    /// Collect the performance fee on net income since the last auction
    /// snapshot, then reset the withdrawal counter. Runs at the top of the
    /// epoch roll, before queued deposits enter the totals.
    pub(crate) fn collect_performance_fee(&mut self, env: &mut Env) -> Result<()> {
        let adjusted = self
            .total_assets(env)?
            .checked_add(self.total_withdrawals)
            .ok_or(Error::Overflow)?;
        if adjusted > self.last_total_assets {
            let net_income = adjusted - self.last_total_assets;
            let fee = self.performance_fee.mulu(net_income)?;
            env.tokens
                .transfer(self.asset, self.addr, self.fee_recipient, fee)?;
            env.emit(Event::PerformanceFeeCollected {
                epoch: self.epoch,
                net_income,
                fee,
            });
        }
        self.total_withdrawals = U256::ZERO;
        Ok(())
    }

    /// Sweep the pool's reserved liquidity back into the vault.
    pub(crate) fn withdraw_reserved_liquidity(&mut self, env: &mut Env) -> Result<()> {
        let id = reserved_liquidity_id(self.is_call);
        let amount = env.pool.balance_of(self.addr, id);
        if !amount.is_zero() {
            env.pool
                .withdraw(&mut env.tokens, self.addr, amount, self.is_call)?;
            env.emit(Event::ReservedLiquidityWithdrawn {
                epoch: self.epoch,
                amount,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
