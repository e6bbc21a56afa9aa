//! The keeper's epoch lifecycle commands.
//!
//! Weekly cadence per vault:
//!
//! 1. `initialize_auction`: write the next epoch's option (delta strike,
//!    Friday expiry), engage the withdrawal lock and open its auction for
//!    the coming Friday window.
//! 2. `initialize_epoch`: sweep reserved liquidity, collect the
//!    performance fee, convert queued deposits into shares, advance the
//!    epoch counter and price the pending auction.
//! 3. `process_auction`: snapshot assets, pull the premiums, underwrite
//!    the sold contracts against the pool and release the withdrawal lock.
//!
//! All three fail deterministically when their status precondition does not
//! hold, so replaying a command is harmless.

use alloy_primitives::U256;

use crate::auction::{AuctionStatus, InitAuction, RESCUE_DELAY};
use crate::error::{Error, Result};
use crate::external::{Ctx, Env};
use crate::types::calendar;
use crate::types::fixed;
use crate::types::token::{long_token_type, option_token_id, short_token_type};
use crate::types::{EpochReceipt, Event};
use crate::vault::{OptionParams, Vault};

impl Vault {
    // ========================================================================
    // initialize_auction
    // ========================================================================

    /// Write the next epoch's option parameters and open its auction.
    pub fn initialize_auction(&mut self, env: &mut Env, ctx: &Ctx) -> Result<()> {
        self.require_keeper(ctx)?;
        self.enter(env)?;
        let result = self.initialize_auction_inner(env);
        self.exit();
        result
    }

    fn initialize_auction_inner(&mut self, env: &mut Env) -> Result<()> {
        let next_epoch = self.epoch + 1;
        let status = self.auction.status(next_epoch);
        if status != AuctionStatus::Uninitialized {
            return Err(Error::BadStatus(status));
        }

        let expiry = calendar::next_friday(env.now);
        let raw_strike = env
            .pricer
            .delta_strike(self.is_call, env.now, expiry, self.delta)?;
        let strike = env.pricer.snap_to_grid(self.is_call, raw_strike)?;
        let long_token_id = option_token_id(long_token_type(self.is_call), expiry, strike);
        let short_token_id = option_token_id(short_token_type(self.is_call), expiry, strike);
        self.options.insert(
            next_epoch,
            OptionParams {
                expiry,
                strike,
                long_token_id,
                short_token_id,
            },
        );
        env.emit(Event::OptionParametersSet {
            epoch: next_epoch,
            expiry,
            strike,
            long_token_id,
            short_token_id,
        });

        let anchor = calendar::friday(env.now);
        let start_time = anchor + self.start_offset;
        let end_time = anchor + self.end_offset;
        self.start_time = start_time;
        self.auction_processed = false;

        let vault_ctx = self.vault_ctx();
        self.auction.initialize(
            env,
            &vault_ctx,
            InitAuction {
                epoch: next_epoch,
                expiry,
                strike,
                long_token_id,
                start_time,
                end_time,
            },
        )
    }

    // ========================================================================
    // initialize_epoch
    // ========================================================================

    /// Roll the epoch: fees, queued deposits, counter, auction prices.
    pub fn initialize_epoch(&mut self, env: &mut Env, ctx: &Ctx) -> Result<()> {
        self.require_keeper(ctx)?;
        self.enter(env)?;
        let result = self.initialize_epoch_inner(env);
        self.exit();
        result
    }

    fn initialize_epoch_inner(&mut self, env: &mut Env) -> Result<()> {
        if self.epoch > 0 {
            self.withdraw_reserved_liquidity(env)?;
            // The withdrawal counter resets here, before queued deposits
            // enter the totals.
            self.collect_performance_fee(env)?;
        }

        let assets_before = self.total_assets(env)?;
        let vault_ctx = self.vault_ctx();
        self.queue
            .process_deposits(env, &vault_ctx, assets_before, &mut self.shares)?;

        self.epoch += 1;

        // Price the pending auction unless validation already cancelled it.
        if self.auction.status(self.epoch) == AuctionStatus::Initialized {
            self.set_auction_prices(env)?;
        }
        Ok(())
    }

    /// Derive the price curve bounds from Black-Scholes values at the
    /// written strike and the delta-offset strike.
    fn set_auction_prices(&mut self, env: &mut Env) -> Result<()> {
        let option = self
            .options
            .get(&self.epoch)
            .copied()
            .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
        if option.strike.0 <= 0 {
            return Err(Error::InvalidArgument);
        }

        let offset_delta = self.delta.checked_sub(self.delta_offset)?;
        let offset_strike =
            env.pricer
                .delta_strike(self.is_call, env.now, option.expiry, offset_delta)?;
        let spot = env.pricer.latest_answer()?;
        let tau = env.pricer.time_to_maturity(env.now, option.expiry)?;
        let value_at_strike = env
            .pricer
            .black_scholes(spot, option.strike, tau, self.is_call)?;
        let value_at_offset = env
            .pricer
            .black_scholes(spot, offset_strike, tau, self.is_call)?;

        // The nearer-the-money strike caps the curve, the offset strike
        // floors it. Call prices convert into underlying units.
        let (max_price, min_price) = if self.is_call {
            (value_at_strike.div(spot)?, value_at_offset.div(spot)?)
        } else {
            (value_at_strike, value_at_offset)
        };

        let vault_ctx = self.vault_ctx();
        self.auction
            .set_auction_prices(env, &vault_ctx, self.epoch, max_price, min_price)?;
        env.emit(Event::AuctionPricesSet {
            epoch: self.epoch,
            strike: option.strike,
            offset_strike,
            spot,
            time_to_maturity: tau,
            max_price,
            min_price,
        });
        Ok(())
    }

    // ========================================================================
    // process_auction
    // ========================================================================

    /// Settle the epoch's auction: premiums in, contracts underwritten,
    /// withdrawal lock released.
    pub fn process_auction(&mut self, env: &mut Env, ctx: &Ctx) -> Result<()> {
        self.require_keeper(ctx)?;
        self.enter(env)?;
        let result = self.process_auction_inner(env);
        self.exit();
        result
    }

    fn process_auction_inner(&mut self, env: &mut Env) -> Result<()> {
        let epoch = self.epoch;
        if self.auction_processed {
            return Err(Error::BadStatus(self.auction.status(epoch)));
        }
        let finalized = self.auction.is_finalized(epoch);
        let cancelled = self.auction.is_cancelled(epoch);
        if !finalized && !cancelled {
            return Err(Error::BadStatus(self.auction.status(epoch)));
        }

        // Snapshot before the premiums arrive so they count as next income.
        self.last_total_assets = self.total_assets(env)?;

        if finalized {
            let vault_ctx = self.vault_ctx();
            let premiums = self.auction.transfer_premium(env, &vault_ctx, epoch)?;
            let sold = self.auction.total_contracts_sold(epoch);
            let option = self
                .options
                .get(&epoch)
                .copied()
                .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;

            let mut collateral_used = U256::ZERO;
            if !sold.is_zero() {
                collateral_used = fixed::contracts_to_collateral(
                    sold,
                    self.is_call,
                    self.underlying_decimals,
                    self.base_decimals,
                    option.strike,
                )?;
                let approval = collateral_used
                    .checked_add(self.total_reserves(env)?)
                    .ok_or(Error::Overflow)?;
                let pool_addr = env.pool.address();
                env.tokens.approve(self.asset, self.addr, pool_addr, approval);
                env.pool.write_from(
                    &mut env.tokens,
                    self.addr,
                    self.auction.address(),
                    option.expiry,
                    option.strike,
                    sold,
                    self.is_call,
                )?;
                // Written collateral divests into reserved liquidity rather
                // than being re-lent before the next roll.
                env.pool
                    .set_divestment_timestamp(env.now + RESCUE_DELAY, self.is_call);
            }

            self.auction.process_auction(env, &vault_ctx, epoch)?;

            let clearing = self
                .auction
                .get_auction(epoch)
                .map(|a| a.last_price)
                .unwrap_or_default();
            self.receipts
                .insert(epoch, EpochReceipt::new(epoch, sold, clearing, premiums, env.now));
            env.emit(Event::AuctionProcessed {
                epoch,
                collateral_used,
                short_contracts: sold,
                premiums,
            });
        }

        self.auction_processed = true;
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
