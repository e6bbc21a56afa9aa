//! The vault: one object per pooled underwriting strategy.
//!
//! The vault owns every subsystem (the Dutch auction engine, the deposit
//! queue, the share ledger, the option book-keeping) and exposes the whole
//! public surface: keeper commands, buyer order flow, depositor flow and
//! share redemption. Component entry points that the outside world reaches
//! through the vault carry the vault's identity; everything else carries the
//! original caller's.
//!
//! Every public mutator that touches external token substrates runs under a
//! non-reentrant latch and rejects a clock that runs backwards.
//!
//! ## Files
//!
//! - `mod.rs`: state, construction, guards, order/queue wrappers, views
//! - `accounting.rs`: totals, previews, share withdrawal, fees
//! - `controller.rs`: the keeper's epoch lifecycle commands

mod accounting;
mod controller;
pub mod shares;

pub use shares::ShareLedger;

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};

use crate::auction::{AuctionStatus, DutchAuction, Funding};
use crate::error::{Error, Result};
use crate::external::{Ctx, Env, SwapArgs};
use crate::orderbook::Order;
use crate::queue::DepositQueue;
use crate::auction::Auction;
use crate::types::fixed::{self, Fixed64};
use crate::types::EpochReceipt;

/// Default auction start offset from the Friday 08:00 mark: two hours.
pub const DEFAULT_START_OFFSET: u64 = 2 * 3_600;

/// Default auction end offset from the Friday 08:00 mark: four hours.
pub const DEFAULT_END_OFFSET: u64 = 4 * 3_600;

/// Option written for one epoch. Immutable once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionParams {
    pub expiry: u64,
    pub strike: Fixed64,
    pub long_token_id: U256,
    pub short_token_id: U256,
}

/// Construction parameters for a [`Vault`].
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub addr: Address,
    pub owner: Address,
    pub keeper: Address,
    pub fee_recipient: Address,
    pub auction_addr: Address,
    pub queue_addr: Address,
    /// Collateral token (the underlying for calls, the base for puts).
    pub asset: Address,
    pub is_call: bool,
    pub underlying_decimals: u8,
    pub base_decimals: u8,
    /// Minimum auction order size in contracts.
    pub min_size: U256,
    /// Queue TVL cap.
    pub max_tvl: U256,
    /// Reserve carve-out rate, 64.64 fraction in [0, 1).
    pub reserve_rate: Fixed64,
    /// Performance fee rate, 64.64 fraction in [0, 1).
    pub performance_fee: Fixed64,
    /// Withdrawal fee rate, 64.64 fraction in [0, 1).
    pub withdrawal_fee: Fixed64,
    /// Target option delta, 64.64 in (0, 1).
    pub delta: Fixed64,
    /// Offset subtracted from delta for the price-floor strike.
    pub delta_offset: Fixed64,
    /// Auction start offset from the Friday mark.
    pub start_offset: u64,
    /// Auction end offset from the Friday mark.
    pub end_offset: u64,
}

/// The single vault object.
pub struct Vault {
    addr: Address,
    owner: Address,
    keeper: Address,
    fee_recipient: Address,
    asset: Address,
    is_call: bool,
    underlying_decimals: u8,
    base_decimals: u8,
    reserve_rate: Fixed64,
    performance_fee: Fixed64,
    withdrawal_fee: Fixed64,
    delta: Fixed64,
    delta_offset: Fixed64,
    start_offset: u64,
    end_offset: u64,

    /// Current epoch counter.
    epoch: u64,
    /// Auction start time of the pending epoch; lock anchor.
    start_time: u64,
    /// False from `initialize_auction` until `process_auction`.
    auction_processed: bool,
    /// Asset snapshot taken when the last auction was processed.
    last_total_assets: U256,
    /// Collateral-valued assets withdrawn since the last fee collection.
    total_withdrawals: U256,

    options: BTreeMap<u64, OptionParams>,
    receipts: BTreeMap<u64, EpochReceipt>,
    pub(crate) shares: ShareLedger,
    pub(crate) auction: DutchAuction,
    pub(crate) queue: DepositQueue,

    /// Non-reentrant latch over public mutators.
    entered: bool,
    /// Last observed clock; rejects retrograde time.
    last_timestamp: u64,
}

fn require_fraction(value: Fixed64) -> Result<()> {
    if value.0 < 0 || value >= Fixed64::ONE {
        return Err(Error::ValueExceedsMaximum);
    }
    Ok(())
}

impl Vault {
    /// Validate the configuration and assemble the vault with its owned
    /// auction engine and deposit queue.
    pub fn new(config: VaultConfig) -> Result<Vault> {
        for address in [
            config.addr,
            config.owner,
            config.keeper,
            config.fee_recipient,
            config.auction_addr,
            config.queue_addr,
            config.asset,
        ] {
            if address == Address::ZERO {
                return Err(Error::AddressNotProvided);
            }
        }
        if config.underlying_decimals > 18 || config.base_decimals > 18 {
            return Err(Error::DecimalsMismatch);
        }
        require_fraction(config.reserve_rate)?;
        require_fraction(config.performance_fee)?;
        require_fraction(config.withdrawal_fee)?;
        if config.delta.0 <= 0 || config.delta >= Fixed64::ONE {
            return Err(Error::InvalidArgument);
        }
        if config.delta_offset.0 < 0 || config.delta.checked_sub(config.delta_offset)?.0 <= 0 {
            return Err(Error::InvalidArgument);
        }
        if config.start_offset >= config.end_offset {
            return Err(Error::InvalidArgument);
        }

        let auction = DutchAuction::new(
            config.auction_addr,
            config.addr,
            config.asset,
            config.is_call,
            config.underlying_decimals,
            config.base_decimals,
            config.min_size,
        );
        let queue = DepositQueue::new(config.queue_addr, config.addr, config.asset, config.max_tvl);

        Ok(Vault {
            addr: config.addr,
            owner: config.owner,
            keeper: config.keeper,
            fee_recipient: config.fee_recipient,
            asset: config.asset,
            is_call: config.is_call,
            underlying_decimals: config.underlying_decimals,
            base_decimals: config.base_decimals,
            reserve_rate: config.reserve_rate,
            performance_fee: config.performance_fee,
            withdrawal_fee: config.withdrawal_fee,
            delta: config.delta,
            delta_offset: config.delta_offset,
            start_offset: config.start_offset,
            end_offset: config.end_offset,
            epoch: 0,
            start_time: 0,
            // No auction is pending at genesis, so withdrawals start open.
            auction_processed: true,
            last_total_assets: U256::ZERO,
            total_withdrawals: U256::ZERO,
            options: BTreeMap::new(),
            receipts: BTreeMap::new(),
            shares: ShareLedger::default(),
            auction,
            queue,
            entered: false,
            last_timestamp: 0,
        })
    }

    // ========================================================================
    // Guards
    // ========================================================================

    pub(crate) fn enter(&mut self, env: &Env) -> Result<()> {
        if self.entered {
            return Err(Error::Reentrant);
        }
        if env.now < self.last_timestamp {
            return Err(Error::RetrogradeClock);
        }
        self.last_timestamp = env.now;
        self.entered = true;
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.entered = false;
    }

    pub(crate) fn require_keeper(&self, ctx: &Ctx) -> Result<()> {
        if ctx.caller != self.keeper {
            return Err(Error::NotKeeper);
        }
        Ok(())
    }

    fn require_owner(&self, ctx: &Ctx) -> Result<()> {
        if ctx.caller != self.owner {
            return Err(Error::NotOwner);
        }
        Ok(())
    }

    pub(crate) fn vault_ctx(&self) -> Ctx {
        Ctx::new(self.addr)
    }

    // ========================================================================
    // Auction order flow
    // ========================================================================

    /// Place a limit order in an epoch's auction.
    pub fn add_limit_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        price: Fixed64,
        size: U256,
    ) -> Result<u64> {
        self.enter(env)?;
        let result = self.limit_order_guarded(env, ctx, epoch, price, size, Funding::Direct);
        self.exit();
        result
    }

    /// Swap into collateral, then place a limit order with the proceeds.
    pub fn swap_and_add_limit_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        args: SwapArgs,
        epoch: u64,
        price: Fixed64,
        size: U256,
    ) -> Result<u64> {
        self.enter(env)?;
        let result = self.swap_then_limit_order(env, ctx, args, epoch, price, size);
        self.exit();
        result
    }

    /// Place a market order at the current curve price.
    pub fn add_market_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        size: U256,
        max_cost: U256,
    ) -> Result<u64> {
        self.enter(env)?;
        let result = self.market_order_guarded(env, ctx, epoch, size, max_cost, Funding::Direct);
        self.exit();
        result
    }

    /// Swap into collateral, then place a market order with the proceeds.
    pub fn swap_and_add_market_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        args: SwapArgs,
        epoch: u64,
        size: U256,
        max_cost: U256,
    ) -> Result<u64> {
        self.enter(env)?;
        let result = self.swap_then_market_order(env, ctx, args, epoch, size, max_cost);
        self.exit();
        result
    }

    /// Cancel a resting limit order.
    pub fn cancel_limit_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        id: u64,
    ) -> Result<()> {
        self.enter(env)?;
        let result = (|| {
            let collateral = self.total_collateral(env)?;
            self.auction.cancel_limit_order(env, ctx, epoch, id, collateral)
        })();
        self.exit();
        result
    }

    /// Finalize (or rescue-cancel) an epoch's auction. Open to anyone.
    pub fn finalize_auction(&mut self, env: &mut Env, ctx: &Ctx, epoch: u64) -> Result<()> {
        let _ = ctx;
        self.enter(env)?;
        let result = (|| {
            let collateral = self.total_collateral(env)?;
            self.auction.finalize_auction(env, epoch, collateral)
        })();
        self.exit();
        result
    }

    /// Withdraw a buyer's fills and refunds from a closed auction.
    pub fn withdraw_auction(&mut self, env: &mut Env, ctx: &Ctx, epoch: u64) -> Result<(U256, U256)> {
        self.enter(env)?;
        let result = self.auction.withdraw(env, ctx, epoch);
        self.exit();
        result
    }

    /// The refund and fill an auction withdrawal would produce.
    pub fn preview_auction_withdrawal(
        &self,
        env: &Env,
        epoch: u64,
        buyer: Address,
    ) -> Result<(U256, U256)> {
        self.auction.preview_withdraw(env, epoch, buyer)
    }

    fn limit_order_guarded(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        price: Fixed64,
        size: U256,
        funding: Funding,
    ) -> Result<u64> {
        let collateral = self.total_collateral(env)?;
        self.auction
            .add_limit_order(env, ctx, epoch, price, size, collateral, funding)
    }

    fn market_order_guarded(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        size: U256,
        max_cost: U256,
        funding: Funding,
    ) -> Result<u64> {
        let collateral = self.total_collateral(env)?;
        self.auction
            .add_market_order(env, ctx, epoch, size, max_cost, collateral, funding)
    }

    fn swap_then_limit_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        args: SwapArgs,
        epoch: u64,
        price: Fixed64,
        size: U256,
    ) -> Result<u64> {
        let proceeds = env.exchange.swap_with_token(
            &mut env.tokens,
            args.token_in,
            self.asset,
            args.amount_in,
            args.min_amount_out,
            ctx.caller,
            self.auction.address(),
        )?;
        self.limit_order_guarded(env, ctx, epoch, price, size, Funding::Prepaid(proceeds))
    }

    fn swap_then_market_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        args: SwapArgs,
        epoch: u64,
        size: U256,
        max_cost: U256,
    ) -> Result<u64> {
        let proceeds = env.exchange.swap_with_token(
            &mut env.tokens,
            args.token_in,
            self.asset,
            args.amount_in,
            args.min_amount_out,
            ctx.caller,
            self.auction.address(),
        )?;
        self.market_order_guarded(env, ctx, epoch, size, max_cost, Funding::Prepaid(proceeds))
    }

    // ========================================================================
    // Deposit queue flow
    // ========================================================================

    /// Queue collateral for the next epoch's shares.
    pub fn deposit(&mut self, env: &mut Env, ctx: &Ctx, amount: U256) -> Result<()> {
        self.enter(env)?;
        let result = (|| {
            let assets = self.total_assets(env)?;
            self.queue.deposit(env, ctx, amount, assets, &mut self.shares)
        })();
        self.exit();
        result
    }

    /// Swap into collateral, then queue the proceeds.
    pub fn swap_and_deposit(&mut self, env: &mut Env, ctx: &Ctx, args: SwapArgs) -> Result<()> {
        self.enter(env)?;
        let result = (|| {
            let proceeds = env.exchange.swap_with_token(
                &mut env.tokens,
                args.token_in,
                self.asset,
                args.amount_in,
                args.min_amount_out,
                ctx.caller,
                self.queue.address(),
            )?;
            let assets = self.total_assets(env)?;
            self.queue
                .deposit_prefunded(env, ctx, proceeds, assets, &mut self.shares)
        })();
        self.exit();
        result
    }

    /// Cancel queued collateral of the open epoch.
    pub fn cancel_deposit(&mut self, env: &mut Env, ctx: &Ctx, amount: U256) -> Result<()> {
        self.enter(env)?;
        let result = self.queue.cancel(env, ctx, amount);
        self.exit();
        result
    }

    /// Redeem a processed epoch's claim tokens for vault shares.
    pub fn redeem_claim(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        token_id: U256,
        receiver: Address,
    ) -> Result<U256> {
        self.enter(env)?;
        let result = self.queue.redeem(ctx, token_id, receiver, &mut self.shares);
        self.exit();
        result
    }

    /// Redeem every processed claim the caller holds.
    pub fn redeem_max_claims(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        receiver: Address,
    ) -> Result<U256> {
        self.enter(env)?;
        let result = self.queue.redeem_max(ctx, receiver, &mut self.shares);
        self.exit();
        result
    }

    /// Shares a full redeem of `token_id` would yield for `holder`.
    pub fn preview_unredeemed(&self, token_id: U256, holder: Address) -> Result<U256> {
        self.queue.preview_unredeemed(token_id, holder)
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn get_epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_call(&self) -> bool {
        self.is_call
    }

    pub fn asset(&self) -> Address {
        self.asset
    }

    pub fn get_option(&self, epoch: u64) -> Option<OptionParams> {
        self.options.get(&epoch).copied()
    }

    pub fn get_receipt(&self, epoch: u64) -> Option<&EpochReceipt> {
        self.receipts.get(&epoch)
    }

    pub fn get_auction(&self, epoch: u64) -> Option<&Auction> {
        self.auction.get_auction(epoch)
    }

    pub fn get_status(&self, epoch: u64) -> AuctionStatus {
        self.auction.status(epoch)
    }

    pub fn is_finalized(&self, epoch: u64) -> bool {
        self.auction.is_finalized(epoch)
    }

    pub fn is_cancelled(&self, epoch: u64) -> bool {
        self.auction.is_cancelled(epoch)
    }

    pub fn get_order_by_id(&self, epoch: u64, id: u64) -> Order {
        self.auction.get_order_by_id(epoch, id)
    }

    pub fn get_epochs_by_buyer(&self, buyer: Address) -> Vec<u64> {
        self.auction.epochs_by_buyer(buyer)
    }

    pub fn get_total_contracts_sold(&self, epoch: u64) -> U256 {
        self.auction.total_contracts_sold(epoch)
    }

    /// Contracts an epoch's auction offers: the frozen figure once set,
    /// otherwise a live preview from the vault's free collateral.
    pub fn get_total_contracts(&self, env: &Env, epoch: u64) -> Result<U256> {
        let frozen = self.auction.total_contracts(epoch);
        if !frozen.is_zero() {
            return Ok(frozen);
        }
        match self.options.get(&epoch) {
            Some(option) => fixed::collateral_to_contracts(
                self.total_collateral(env)?,
                self.is_call,
                self.underlying_decimals,
                self.base_decimals,
                option.strike,
            ),
            None => Ok(U256::ZERO),
        }
    }

    pub fn share_balance(&self, holder: Address) -> U256 {
        self.shares.balance_of(holder)
    }

    pub fn total_share_supply(&self) -> U256 {
        self.shares.total_supply()
    }

    pub fn current_claim_token_id(&self) -> U256 {
        self.queue.current_token_id()
    }

    /// The auction engine's account address (order funding target).
    pub fn auction_address(&self) -> Address {
        self.auction.address()
    }

    /// The deposit queue's account address (deposit funding target).
    pub fn queue_address(&self) -> Address {
        self.queue.address()
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub fn set_keeper(&mut self, ctx: &Ctx, keeper: Address) -> Result<()> {
        self.require_owner(ctx)?;
        if keeper == Address::ZERO {
            return Err(Error::AddressNotProvided);
        }
        if keeper == self.keeper {
            return Err(Error::AddressUnchanged);
        }
        self.keeper = keeper;
        Ok(())
    }

    pub fn set_fee_recipient(&mut self, ctx: &Ctx, fee_recipient: Address) -> Result<()> {
        self.require_owner(ctx)?;
        if fee_recipient == Address::ZERO {
            return Err(Error::AddressNotProvided);
        }
        if fee_recipient == self.fee_recipient {
            return Err(Error::AddressUnchanged);
        }
        self.fee_recipient = fee_recipient;
        Ok(())
    }

    pub fn set_paused(&mut self, ctx: &Ctx, paused: bool) -> Result<()> {
        self.require_owner(ctx)?;
        let vault_ctx = self.vault_ctx();
        self.queue.set_paused(&vault_ctx, paused)
    }

    pub fn set_max_tvl(&mut self, ctx: &Ctx, max_tvl: U256) -> Result<()> {
        self.require_owner(ctx)?;
        let vault_ctx = self.vault_ctx();
        self.queue.set_max_tvl(&vault_ctx, max_tvl)
    }
}

// ============================================================================
// Test harness
// ============================================================================

#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use crate::external::{BlackScholesPricer, FixedRateExchange, ReferencePool, TokenLedger};
    use crate::types::fixed::pow10;

    /// 2022-01-07 (Friday) 08:00 UTC.
    pub(crate) const FRI: u64 = 1_641_542_400;
    /// Thursday noon before that Friday.
    pub(crate) const THURSDAY_NOON: u64 = FRI - 20 * 3_600;

    pub(crate) fn addr(tag: u8) -> Address {
        Address::from([tag; 20])
    }

    pub(crate) fn fx(s: &str) -> Fixed64 {
        s.parse().expect("literal parses")
    }

    pub(crate) fn e18(n: u64) -> U256 {
        U256::from(n) * pow10(18)
    }

    pub(crate) fn weth() -> Address {
        addr(0xEE)
    }

    pub(crate) fn dai() -> Address {
        addr(0xDA)
    }

    pub(crate) fn owner_ctx() -> Ctx {
        Ctx::new(addr(0x01))
    }

    pub(crate) fn keeper_ctx() -> Ctx {
        Ctx::new(addr(0x02))
    }

    pub(crate) fn fee_recipient() -> Address {
        addr(0x03)
    }

    /// Covered-call vault over wrapped native, no fees or reserves.
    pub(crate) fn config() -> VaultConfig {
        VaultConfig {
            addr: addr(0xAA),
            owner: addr(0x01),
            keeper: addr(0x02),
            fee_recipient: fee_recipient(),
            auction_addr: addr(0xAB),
            queue_addr: addr(0xAC),
            asset: weth(),
            is_call: true,
            underlying_decimals: 18,
            base_decimals: 18,
            min_size: pow10(17),
            max_tvl: e18(1_000_000),
            reserve_rate: Fixed64::ZERO,
            performance_fee: Fixed64::ZERO,
            withdrawal_fee: Fixed64::ZERO,
            delta: fx("0.3"),
            delta_offset: fx("0.1"),
            start_offset: DEFAULT_START_OFFSET,
            end_offset: DEFAULT_END_OFFSET,
        }
    }

    /// Build a world at Thursday noon; `seed_reserved` pre-funds the pool's
    /// reserved liquidity for the vault.
    pub(crate) fn build(config: VaultConfig, seed_reserved: U256) -> (Env, Vault) {
        let mut tokens = TokenLedger::new(weth());
        tokens.register(dai(), 18);
        let mut pool = ReferencePool::new(addr(0xF0), weth(), dai(), 18, 18);
        if !seed_reserved.is_zero() {
            pool.credit_reserved_liquidity(&mut tokens, config.addr, seed_reserved, config.is_call);
        }
        let env = Env {
            now: THURSDAY_NOON,
            tokens,
            pool: Box::new(pool),
            pricer: Box::new(BlackScholesPricer::new(fx("2000"), fx("0.9"))),
            exchange: Box::new(FixedRateExchange::new(addr(0xE1))),
            events: Vec::new(),
        };
        let vault = Vault::new(config).expect("valid config");
        (env, vault)
    }

    /// Fund `who` with collateral approved for both the queue and the
    /// auction.
    pub(crate) fn fund(env: &mut Env, vault: &Vault, who: Address, amount: U256) {
        env.tokens.mint(weth(), who, amount);
        env.tokens.approve(weth(), who, vault.queue_address(), amount);
        env.tokens.approve(weth(), who, vault.auction_address(), amount);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
