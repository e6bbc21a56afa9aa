//! Descending-price Dutch auction engine.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --initialize--> Initialized --finalize--> Finalized
//!        \                          |                        |
//!         \--(validation fails)     |--(end + 24h)           |--process--> Processed
//!          v                        v                        |
//!        Cancelled <----------------+------------------------+--(end + 24h)
//! ```
//!
//! Buyers place limit orders at a chosen price or market orders at the
//! current curve price; every order is funded up-front with collateral.
//! After each book mutation inside the live window the engine re-evaluates
//! the book and finalizes the auction as soon as the offered contracts are
//! fully covered at or above the clearing price. All filled orders settle at
//! the single uniform clearing price; the spread each buyer bid above it is
//! refunded on withdrawal.
//!
//! Cancelled auctions park the clearing price at the `Fixed64::MAX` sentinel
//! and refund every order in full; they never deliver long tokens.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, U256};

use crate::auction::state::{Auction, AuctionStatus, InitAuction};
use crate::error::{Error, Result};
use crate::external::{Ctx, Env};
use crate::orderbook::{Order, OrderBook};
use crate::types::calendar::DAY;
use crate::types::fixed::{self, Fixed64};
use crate::types::Event;

/// Grace period after `end_time` before anyone may cancel an unprocessed
/// auction, and the hold period on long tokens after processing.
pub const RESCUE_DELAY: u64 = DAY;

/// How an order is being paid for.
#[derive(Debug, Clone, Copy)]
pub enum Funding {
    /// Pull collateral from the buyer (allowance or attached native value).
    Direct,
    /// This much collateral was already credited to the auction by a swap.
    Prepaid(U256),
}

/// Outcome of settling one buyer's orders against a closed auction.
#[derive(Debug, Default)]
struct Settlement {
    /// Collateral owed back to the buyer.
    refund: U256,
    /// Contracts the buyer's orders filled at the clearing price.
    filled: U256,
    /// Long tokens to deliver (zero once the option expired).
    deliverable: U256,
    /// The buyer's order ids, removed from the book on withdrawal.
    order_ids: Vec<u64>,
}

/// The per-vault Dutch auction engine: one auction and order book per epoch.
pub struct DutchAuction {
    /// The engine's own account; holds buyer collateral and long tokens.
    addr: Address,
    /// The owning vault; privileged transitions check against it.
    vault: Address,
    /// Collateral token.
    asset: Address,
    is_call: bool,
    underlying_decimals: u8,
    base_decimals: u8,
    /// Minimum order size in contracts.
    min_size: U256,
    auctions: BTreeMap<u64, Auction>,
    books: BTreeMap<u64, OrderBook>,
    epochs_by_buyer: BTreeMap<Address, BTreeSet<u64>>,
}

impl DutchAuction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        addr: Address,
        vault: Address,
        asset: Address,
        is_call: bool,
        underlying_decimals: u8,
        base_decimals: u8,
        min_size: U256,
    ) -> Self {
        Self {
            addr,
            vault,
            asset,
            is_call,
            underlying_decimals,
            base_decimals,
            min_size,
            auctions: BTreeMap::new(),
            books: BTreeMap::new(),
            epochs_by_buyer: BTreeMap::new(),
        }
    }

    /// The engine's account address.
    pub fn address(&self) -> Address {
        self.addr
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

    /// Status of the epoch's auction; `Uninitialized` when none exists.
    pub fn status(&self, epoch: u64) -> AuctionStatus {
        self.auctions
            .get(&epoch)
            .map_or(AuctionStatus::Uninitialized, |a| a.status)
    }

    /// The full auction record, if one exists.
    pub fn get_auction(&self, epoch: u64) -> Option<&Auction> {
        self.auctions.get(&epoch)
    }

    pub fn is_finalized(&self, epoch: u64) -> bool {
        self.status(epoch) == AuctionStatus::Finalized
    }

    pub fn is_cancelled(&self, epoch: u64) -> bool {
        self.status(epoch) == AuctionStatus::Cancelled
    }

    /// Contracts offered; zero until frozen at the first order.
    pub fn total_contracts(&self, epoch: u64) -> U256 {
        self.auctions
            .get(&epoch)
            .map_or(U256::ZERO, |a| a.total_contracts)
    }

    /// Contracts sold at the clearing price.
    pub fn total_contracts_sold(&self, epoch: u64) -> U256 {
        self.auctions
            .get(&epoch)
            .map_or(U256::ZERO, |a| a.total_contracts_sold)
    }

    /// The settlement price reference at `now` for the epoch.
    pub fn clearing_price(&self, epoch: u64, now: u64) -> Result<Fixed64> {
        let auction = self
            .auctions
            .get(&epoch)
            .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
        auction.clearing_price(now)
    }

    /// Order data by id; the zero tuple when absent.
    pub fn get_order_by_id(&self, epoch: u64, id: u64) -> Order {
        self.books.get(&epoch).map_or_else(Order::null, |b| b.get(id))
    }

    /// Live order count in the epoch's book.
    pub fn order_count(&self, epoch: u64) -> usize {
        self.books.get(&epoch).map_or(0, |b| b.len())
    }

    /// Epochs in which the buyer still has undrawn orders.
    pub fn epochs_by_buyer(&self, buyer: Address) -> Vec<u64> {
        self.epochs_by_buyer
            .get(&buyer)
            .map_or_else(Vec::new, |set| set.iter().copied().collect())
    }

    // ========================================================================
    // Vault-only transitions
    // ========================================================================

    /// Open the epoch's auction.
    ///
    /// A validation failure is terminal: the auction is created Cancelled so
    /// that any later funding attempts fail deterministically and refunds
    /// remain possible, mirroring the rescue path.
    pub fn initialize(&mut self, env: &mut Env, ctx: &Ctx, init: InitAuction) -> Result<()> {
        self.require_vault(ctx)?;
        if self.auctions.contains_key(&init.epoch) {
            return Err(Error::BadStatus(self.status(init.epoch)));
        }

        self.books.insert(init.epoch, OrderBook::new());
        self.auctions.insert(
            init.epoch,
            Auction {
                status: AuctionStatus::Initialized,
                epoch: init.epoch,
                expiry: init.expiry,
                strike: init.strike,
                long_token_id: init.long_token_id,
                start_time: init.start_time,
                end_time: init.end_time,
                ..Auction::default()
            },
        );

        let valid = init.start_time < init.end_time
            && env.now <= init.start_time
            && env.now <= init.expiry
            && init.strike.0 > 0
            && !init.long_token_id.is_zero();
        if valid {
            env.emit(Event::AuctionStatusSet {
                epoch: init.epoch,
                status: AuctionStatus::Initialized,
            });
        } else {
            self.cancel(env, init.epoch);
        }
        Ok(())
    }

    /// Record the price curve endpoints for an initialized auction.
    ///
    /// Degenerate bounds (`max <= min` or a non-positive price) cancel the
    /// auction instead of failing.
    pub fn set_auction_prices(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        max_price: Fixed64,
        min_price: Fixed64,
    ) -> Result<()> {
        self.require_vault(ctx)?;
        let auction = self
            .auctions
            .get_mut(&epoch)
            .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
        if auction.status != AuctionStatus::Initialized {
            return Err(Error::BadStatus(auction.status));
        }
        auction.max_price = max_price;
        auction.min_price = min_price;
        if max_price.0 <= 0 || min_price.0 <= 0 || max_price <= min_price {
            self.cancel(env, epoch);
        }
        Ok(())
    }

    /// Move the auction's premiums to the vault. At most once per epoch.
    pub fn transfer_premium(&mut self, env: &mut Env, ctx: &Ctx, epoch: u64) -> Result<U256> {
        self.require_vault(ctx)?;
        let auction = self
            .auctions
            .get_mut(&epoch)
            .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
        if auction.status != AuctionStatus::Finalized {
            return Err(Error::BadStatus(auction.status));
        }
        if !auction.total_premiums.is_zero() {
            return Err(Error::PremiumsAlreadyTransferred);
        }
        let premiums = auction.last_price.mulu(auction.total_contracts_sold)?;
        auction.total_premiums = premiums;
        env.tokens.transfer(self.asset, self.addr, self.vault, premiums)?;
        Ok(premiums)
    }

    /// Mark a finalized auction processed once its obligations are in place:
    /// either nothing sold, or premiums transferred and the sold long tokens
    /// sitting in the engine's account.
    pub fn process_auction(&mut self, env: &mut Env, ctx: &Ctx, epoch: u64) -> Result<()> {
        self.require_vault(ctx)?;
        let long_balance = {
            let auction = self
                .auctions
                .get(&epoch)
                .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
            env.pool.balance_of(self.addr, auction.long_token_id)
        };
        let auction = self.auctions.get_mut(&epoch).expect("checked above");
        if auction.status != AuctionStatus::Finalized {
            return Err(Error::BadStatus(auction.status));
        }
        if !auction.total_contracts_sold.is_zero() {
            if auction.total_premiums.is_zero() {
                return Err(Error::PremiumsNotTransferred);
            }
            if long_balance < auction.total_contracts_sold {
                return Err(Error::LongTokensMissing);
            }
        }
        auction.status = AuctionStatus::Processed;
        auction.processed_time = env.now;
        env.emit(Event::AuctionStatusSet {
            epoch,
            status: AuctionStatus::Processed,
        });
        Ok(())
    }

    /// Terminal cancellation: sentinel clearing price, premiums cleared.
    fn cancel(&mut self, env: &mut Env, epoch: u64) {
        let auction = self.auctions.get_mut(&epoch).expect("cancel of known epoch");
        auction.status = AuctionStatus::Cancelled;
        auction.last_price = Fixed64::MAX;
        auction.total_premiums = U256::ZERO;
        env.emit(Event::AuctionStatusSet {
            epoch,
            status: AuctionStatus::Cancelled,
        });
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Place a limit order at `price` for `size` contracts.
    ///
    /// The full cost (`price * size`) is collected up-front. Limit orders may
    /// rest before the auction window opens.
    #[allow(clippy::too_many_arguments)]
    pub fn add_limit_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        price: Fixed64,
        size: U256,
        vault_collateral: U256,
        funding: Funding,
    ) -> Result<u64> {
        {
            let auction = self
                .auctions
                .get(&epoch)
                .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
            if auction.status != AuctionStatus::Initialized {
                return Err(Error::BadStatus(auction.status));
            }
            if env.now > auction.end_time {
                return Err(Error::BadStatus(auction.status));
            }
        }
        if price.0 <= 0 {
            return Err(Error::ValueBelowMinimum);
        }
        if size < self.min_size {
            return Err(Error::SizeBelowMinimum);
        }
        let cost = price.mulu(size)?;
        self.collect_payment(env, ctx, cost, funding)?;
        let id = self.place(env, ctx.caller, epoch, price, size, true)?;
        if env.now >= self.auctions[&epoch].start_time {
            self.finalize_check(env, epoch, vault_collateral)?;
        }
        Ok(id)
    }

    /// Place a market order for `size` contracts at the current curve price,
    /// bounded by `max_cost`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_market_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        size: U256,
        max_cost: U256,
        vault_collateral: U256,
        funding: Funding,
    ) -> Result<u64> {
        let price = {
            let auction = self
                .auctions
                .get(&epoch)
                .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
            if auction.status != AuctionStatus::Initialized {
                return Err(Error::BadStatus(auction.status));
            }
            if env.now < auction.start_time || env.now > auction.end_time {
                return Err(Error::BadStatus(auction.status));
            }
            auction.price_curve(env.now)?
        };
        if size < self.min_size {
            return Err(Error::SizeBelowMinimum);
        }
        let cost = price.mulu(size)?;
        if cost > max_cost {
            return Err(Error::CostExceedsMax);
        }
        self.collect_payment(env, ctx, cost, funding)?;
        let id = self.place(env, ctx.caller, epoch, price, size, false)?;
        self.finalize_check(env, epoch, vault_collateral)?;
        Ok(id)
    }

    /// Cancel a resting limit order and refund its cost in full.
    pub fn cancel_limit_order(
        &mut self,
        env: &mut Env,
        ctx: &Ctx,
        epoch: u64,
        id: u64,
        vault_collateral: U256,
    ) -> Result<()> {
        if id == 0 {
            return Err(Error::InvalidOrderId);
        }
        let (status, start_time) = {
            let auction = self
                .auctions
                .get(&epoch)
                .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
            (auction.status, auction.start_time)
        };
        if status != AuctionStatus::Initialized {
            return Err(Error::BadStatus(status));
        }
        let order = self
            .books
            .get(&epoch)
            .map_or_else(Order::null, |b| b.get(id));
        if order.is_null() {
            return Err(Error::OrderNotFound);
        }
        if order.buyer != ctx.caller {
            return Err(Error::BuyerMismatch);
        }
        self.books
            .get_mut(&epoch)
            .expect("book exists for epoch")
            .remove(id);
        let refund = order.price.mulu(order.size)?;
        env.tokens.transfer(self.asset, self.addr, ctx.caller, refund)?;
        env.emit(Event::OrderCanceled {
            epoch,
            id,
            buyer: ctx.caller,
        });
        if env.now >= start_time {
            self.finalize_check(env, epoch, vault_collateral)?;
        }
        Ok(())
    }

    /// Anyone may finalize a past-start auction, or cancel one that sat
    /// unprocessed for a day past its end.
    pub fn finalize_auction(
        &mut self,
        env: &mut Env,
        epoch: u64,
        vault_collateral: U256,
    ) -> Result<()> {
        let (status, start_time, end_time) = {
            let auction = self
                .auctions
                .get(&epoch)
                .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
            (auction.status, auction.start_time, auction.end_time)
        };
        let rescuable = matches!(
            status,
            AuctionStatus::Initialized | AuctionStatus::Finalized
        );
        if rescuable && env.now >= end_time + RESCUE_DELAY {
            self.cancel(env, epoch);
            return Ok(());
        }
        if status == AuctionStatus::Initialized && env.now > start_time {
            return self.finalize_check(env, epoch, vault_collateral);
        }
        Err(Error::BadStatus(status))
    }

    /// Fund and insert an order, tracking the buyer's epoch set.
    fn place(
        &mut self,
        env: &mut Env,
        buyer: Address,
        epoch: u64,
        price: Fixed64,
        size: U256,
        is_limit: bool,
    ) -> Result<u64> {
        let book = self.books.get_mut(&epoch).expect("book exists for epoch");
        let id = book.insert(price, size, buyer);
        self.epochs_by_buyer.entry(buyer).or_default().insert(epoch);
        env.emit(Event::OrderAdded {
            epoch,
            id,
            buyer,
            price,
            size,
            is_limit,
        });
        Ok(id)
    }

    /// Collect an order's cost into the engine's account.
    fn collect_payment(
        &self,
        env: &mut Env,
        ctx: &Ctx,
        cost: U256,
        funding: Funding,
    ) -> Result<()> {
        match funding {
            Funding::Direct => {
                if ctx.value > U256::ZERO {
                    if self.asset != env.tokens.wrapped_native() {
                        return Err(Error::WrappedNativeMismatch);
                    }
                    env.tokens.deposit_native(self.addr, ctx.value);
                    if ctx.value < cost {
                        let shortfall = cost - ctx.value;
                        env.tokens
                            .transfer_from(self.asset, self.addr, ctx.caller, self.addr, shortfall)?;
                    } else if ctx.value > cost {
                        env.tokens
                            .transfer(self.asset, self.addr, ctx.caller, ctx.value - cost)?;
                    }
                } else {
                    env.tokens
                        .transfer_from(self.asset, self.addr, ctx.caller, self.addr, cost)?;
                }
            }
            Funding::Prepaid(available) => {
                if available < cost {
                    return Err(Error::SwapShortfall);
                }
                if available > cost {
                    env.tokens
                        .transfer(self.asset, self.addr, ctx.caller, available - cost)?;
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Evaluate the book against the clearing price and finalize when the
    /// offering is covered.
    ///
    /// The offered contract total is frozen on first evaluation, derived from
    /// the vault's free collateral at the auction's strike.
    fn finalize_check(&mut self, env: &mut Env, epoch: u64, vault_collateral: U256) -> Result<()> {
        let auction = self.auctions.get_mut(&epoch).expect("auction exists");
        let book = self.books.get(&epoch).expect("book exists for epoch");

        if auction.total_contracts.is_zero() {
            auction.total_contracts = fixed::collateral_to_contracts(
                vault_collateral,
                self.is_call,
                self.underlying_decimals,
                self.base_decimals,
                auction.strike,
            )?;
        }

        let clearing = auction.clearing_price(env.now)?;
        let mut accumulated = U256::ZERO;
        let mut last_visited = Fixed64::ZERO;
        let mut covered = false;
        for order in book.iter() {
            if order.price < clearing {
                break;
            }
            if accumulated
                .checked_add(order.size)
                .ok_or(Error::Overflow)?
                >= auction.total_contracts
            {
                auction.last_price = order.price;
                auction.total_contracts_sold = auction.total_contracts;
                covered = true;
                break;
            }
            accumulated += order.size;
            last_visited = order.price;
        }

        if covered {
            auction.status = AuctionStatus::Finalized;
            env.emit(Event::AuctionStatusSet {
                epoch,
                status: AuctionStatus::Finalized,
            });
            return Ok(());
        }

        auction.last_price = last_visited;
        auction.total_contracts_sold = accumulated;
        if env.now > auction.end_time {
            auction.status = AuctionStatus::Finalized;
            env.emit(Event::AuctionStatusSet {
                epoch,
                status: AuctionStatus::Finalized,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Withdrawals
    // ========================================================================

    /// Settle and remove the caller's orders from a closed auction,
    /// delivering long tokens and refunding overpaid collateral.
    pub fn withdraw(&mut self, env: &mut Env, ctx: &Ctx, epoch: u64) -> Result<(U256, U256)> {
        let (status, processed_time, long_token_id) = {
            let auction = self
                .auctions
                .get(&epoch)
                .ok_or(Error::BadStatus(AuctionStatus::Uninitialized))?;
            (auction.status, auction.processed_time, auction.long_token_id)
        };
        match status {
            AuctionStatus::Processed => {
                if env.now < processed_time + RESCUE_DELAY {
                    return Err(Error::HoldPeriodActive);
                }
            }
            AuctionStatus::Cancelled => {}
            other => return Err(Error::BadStatus(other)),
        }

        let settlement = self.compute_settlement(env, epoch, ctx.caller)?;

        let book = self.books.get_mut(&epoch).expect("book exists for epoch");
        for id in &settlement.order_ids {
            book.remove(*id);
        }
        let auction = self.auctions.get_mut(&epoch).expect("auction exists");
        auction.total_contracts_claimed = auction
            .total_contracts_claimed
            .checked_add(settlement.filled)
            .ok_or(Error::Overflow)?;

        if !settlement.deliverable.is_zero() {
            env.pool
                .safe_transfer_from(self.addr, ctx.caller, long_token_id, settlement.deliverable)?;
        }
        env.tokens
            .transfer(self.asset, self.addr, ctx.caller, settlement.refund)?;
        if let Some(epochs) = self.epochs_by_buyer.get_mut(&ctx.caller) {
            epochs.remove(&epoch);
        }
        env.emit(Event::OrderWithdrawn {
            epoch,
            buyer: ctx.caller,
            refund: settlement.refund,
            fill: settlement.deliverable,
        });
        Ok((settlement.refund, settlement.deliverable))
    }

    /// The refund and fill `withdraw` would produce, without mutating.
    pub fn preview_withdraw(&self, env: &Env, epoch: u64, buyer: Address) -> Result<(U256, U256)> {
        if !self.auctions.contains_key(&epoch) {
            return Err(Error::BadStatus(AuctionStatus::Uninitialized));
        }
        let settlement = self.compute_settlement(env, epoch, buyer)?;
        Ok((settlement.refund, settlement.deliverable))
    }

    /// Walk the whole book head to tail, crediting fills in price-time
    /// priority against the still-unclaimed offering and computing the
    /// buyer's refund at the uniform clearing price. Expired options settle
    /// in collateral instead of long tokens.
    fn compute_settlement(&self, env: &Env, epoch: u64, buyer: Address) -> Result<Settlement> {
        let auction = self.auctions.get(&epoch).expect("auction exists");
        let book = self.books.get(&epoch).expect("book exists for epoch");
        // Cancellations park the price at the sentinel; everything refunds.
        let cleared = auction.last_price < Fixed64::MAX;
        let unclaimed = auction
            .total_contracts
            .checked_sub(auction.total_contracts_claimed)
            .ok_or(Error::Overflow)?;

        let mut settlement = Settlement::default();
        let mut accumulated = U256::ZERO;
        for order in book.iter() {
            let mut fill_here = U256::ZERO;
            if cleared && order.price >= auction.last_price && accumulated < unclaimed {
                let remainder = unclaimed - accumulated;
                fill_here = if order.size < remainder {
                    order.size
                } else {
                    remainder
                };
            }
            if order.buyer == buyer {
                let paid = order.price.mulu(order.size)?;
                let cost = if cleared {
                    auction.last_price.mulu(fill_here)?
                } else {
                    U256::ZERO
                };
                let owed = paid.checked_sub(cost).ok_or(Error::Overflow)?;
                settlement.refund = settlement.refund.checked_add(owed).ok_or(Error::Overflow)?;
                settlement.filled += fill_here;
                settlement.order_ids.push(order.id);
            }
            accumulated += fill_here;
        }

        settlement.deliverable = settlement.filled;
        if env.now >= auction.expiry && auction.expiry > 0 {
            if !settlement.filled.is_zero() {
                let spot = env.pool.price_after(auction.expiry)?;
                let exercise = if self.is_call {
                    if spot > auction.strike {
                        // In the money: (spot - strike) / spot per contract,
                        // paid in the underlying.
                        spot.checked_sub(auction.strike)?
                            .div(spot)?
                            .mulu(settlement.filled)?
                    } else {
                        U256::ZERO
                    }
                } else if auction.strike > spot {
                    fixed::to_base_token_amount(
                        self.underlying_decimals,
                        self.base_decimals,
                        auction.strike.checked_sub(spot)?.mulu(settlement.filled)?,
                    )?
                } else {
                    U256::ZERO
                };
                settlement.refund = settlement
                    .refund
                    .checked_add(exercise)
                    .ok_or(Error::Overflow)?;
            }
            settlement.deliverable = U256::ZERO;
        }
        Ok(settlement)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{BlackScholesPricer, FixedRateExchange, ReferencePool, TokenLedger};
    use crate::types::fixed::pow10;

    const START: u64 = 100_000;
    const END: u64 = START + 7_200;
    const EXPIRY: u64 = START + 7 * DAY;

    fn addr(tag: u8) -> Address {
        Address::from([tag; 20])
    }

    fn fx(s: &str) -> Fixed64 {
        s.parse().expect("literal parses")
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * pow10(18)
    }

    fn weth() -> Address {
        addr(0xEE)
    }

    fn vault() -> Address {
        addr(0xA1)
    }

    fn vault_ctx() -> Ctx {
        Ctx::new(vault())
    }

    fn setup() -> (Env, DutchAuction) {
        let mut tokens = TokenLedger::new(weth());
        tokens.register(addr(0xDA), 18);
        let mut pool = ReferencePool::new(addr(0xF0), weth(), addr(0xDA), 18, 18);
        pool.set_settlement_price(EXPIRY, fx("2100"));
        let env = Env {
            now: START - 3_600,
            tokens,
            pool: Box::new(pool),
            pricer: Box::new(BlackScholesPricer::new(fx("2000"), fx("0.9"))),
            exchange: Box::new(FixedRateExchange::new(addr(0xE1))),
            events: Vec::new(),
        };
        let auction = DutchAuction::new(
            addr(0xA0),
            vault(),
            weth(),
            true,
            18,
            18,
            pow10(17), // 0.1 contract minimum
        );
        (env, auction)
    }

    fn init(env: &mut Env, auction: &mut DutchAuction, epoch: u64) {
        auction
            .initialize(
                env,
                &vault_ctx(),
                InitAuction {
                    epoch,
                    expiry: EXPIRY,
                    strike: fx("2000"),
                    long_token_id: U256::from(1u64) << 200,
                    start_time: START,
                    end_time: END,
                },
            )
            .unwrap();
    }

    /// Dyadic curve bounds so every cost computation is exact.
    fn init_priced(env: &mut Env, auction: &mut DutchAuction, epoch: u64) {
        init(env, auction, epoch);
        auction
            .set_auction_prices(env, &vault_ctx(), epoch, fx("0.125"), fx("0.015625"))
            .unwrap();
    }

    fn fund(env: &mut Env, auction: &DutchAuction, buyer: Address, amount: U256) {
        env.tokens.mint(weth(), buyer, amount);
        env.tokens.approve(weth(), buyer, auction.address(), amount);
    }

    /// Simulate the vault flow after finalization: premiums out, longs
    /// written, auction processed.
    fn settle(env: &mut Env, auction: &mut DutchAuction, epoch: u64) {
        let premiums = auction.transfer_premium(env, &vault_ctx(), epoch).unwrap();
        let sold = auction.total_contracts_sold(epoch);
        let strike = auction.get_auction(epoch).unwrap().strike;
        env.tokens.mint(weth(), vault(), sold);
        let pool_addr = env.pool.address();
        env.tokens.approve(weth(), vault(), pool_addr, sold);
        env.pool
            .write_from(&mut env.tokens, vault(), auction.address(), EXPIRY, strike, sold, true)
            .unwrap();
        auction.process_auction(env, &vault_ctx(), epoch).unwrap();
        assert_eq!(auction.get_auction(epoch).unwrap().total_premiums, premiums);
    }

    #[test]
    fn test_initialize_requires_vault() {
        let (mut env, mut auction) = setup();
        let result = auction.initialize(
            &mut env,
            &Ctx::new(addr(9)),
            InitAuction {
                epoch: 1,
                expiry: EXPIRY,
                strike: fx("2000"),
                long_token_id: U256::from(1u64),
                start_time: START,
                end_time: END,
            },
        );
        assert_eq!(result, Err(Error::NotVault));
    }

    #[test]
    fn test_initialize_validation_cancels() {
        let (mut env, mut auction) = setup();
        // end before start
        auction
            .initialize(
                &mut env,
                &vault_ctx(),
                InitAuction {
                    epoch: 1,
                    expiry: EXPIRY,
                    strike: fx("2000"),
                    long_token_id: U256::from(1u64),
                    start_time: END,
                    end_time: START,
                },
            )
            .unwrap();
        assert_eq!(auction.status(1), AuctionStatus::Cancelled);
        assert_eq!(auction.get_auction(1).unwrap().last_price, Fixed64::MAX);

        // zero strike
        auction
            .initialize(
                &mut env,
                &vault_ctx(),
                InitAuction {
                    epoch: 2,
                    expiry: EXPIRY,
                    strike: Fixed64::ZERO,
                    long_token_id: U256::from(1u64),
                    start_time: START,
                    end_time: END,
                },
            )
            .unwrap();
        assert_eq!(auction.status(2), AuctionStatus::Cancelled);

        // double initialize is a status failure, not a cancel
        init(&mut env, &mut auction, 3);
        let again = auction.initialize(
            &mut env,
            &vault_ctx(),
            InitAuction {
                epoch: 3,
                expiry: EXPIRY,
                strike: fx("2000"),
                long_token_id: U256::from(1u64),
                start_time: START,
                end_time: END,
            },
        );
        assert_eq!(again, Err(Error::BadStatus(AuctionStatus::Initialized)));
    }

    #[test]
    fn test_set_auction_prices_degenerate_cancels() {
        let (mut env, mut auction) = setup();
        init(&mut env, &mut auction, 1);
        auction
            .set_auction_prices(&mut env, &vault_ctx(), 1, fx("5"), fx("10"))
            .unwrap();
        assert_eq!(auction.status(1), AuctionStatus::Cancelled);
        assert_eq!(auction.get_auction(1).unwrap().last_price, Fixed64::MAX);
        assert_eq!(auction.get_auction(1).unwrap().total_premiums, U256::ZERO);
    }

    #[test]
    fn test_limit_order_rests_before_start() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(100));

        let id = auction
            .add_limit_order(
                &mut env,
                &Ctx::new(buyer),
                1,
                fx("0.125"),
                e18(100),
                e18(1_000),
                Funding::Direct,
            )
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(auction.status(1), AuctionStatus::Initialized);
        assert_eq!(auction.order_count(1), 1);
        // cost = 0.125 * 100 = 12.5 collateral
        let cost = fx("0.125").mulu(e18(100)).unwrap();
        assert_eq!(
            env.tokens.balance_of(weth(), auction.address()),
            cost
        );
        assert_eq!(env.tokens.balance_of(weth(), buyer), e18(100) - cost);
        assert_eq!(auction.epochs_by_buyer(buyer), vec![1]);
    }

    #[test]
    fn test_limit_order_argument_checks() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(100));
        let ctx = Ctx::new(buyer);

        assert_eq!(
            auction.add_limit_order(&mut env, &ctx, 1, Fixed64::ZERO, e18(1), e18(1_000), Funding::Direct),
            Err(Error::ValueBelowMinimum)
        );
        assert_eq!(
            auction.add_limit_order(
                &mut env,
                &ctx,
                1,
                fx("0.125"),
                pow10(16),
                e18(1_000),
                Funding::Direct
            ),
            Err(Error::SizeBelowMinimum)
        );
        assert_eq!(
            auction.add_limit_order(&mut env, &ctx, 9, fx("0.125"), e18(1), e18(1_000), Funding::Direct),
            Err(Error::BadStatus(AuctionStatus::Uninitialized))
        );
    }

    #[test]
    fn test_market_order_window_and_cost_cap() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(1_000));
        let ctx = Ctx::new(buyer);

        // before the window opens
        assert_eq!(
            auction.add_market_order(&mut env, &ctx, 1, e18(10), e18(100), e18(1_000), Funding::Direct),
            Err(Error::BadStatus(AuctionStatus::Initialized))
        );

        env.now = START;
        // cost cap: 0.125 * 10 = 1.25 > 1
        assert_eq!(
            auction.add_market_order(&mut env, &ctx, 1, e18(10), e18(1), e18(1_000), Funding::Direct),
            Err(Error::CostExceedsMax)
        );
        auction
            .add_market_order(&mut env, &ctx, 1, e18(10), e18(2), e18(1_000), Funding::Direct)
            .unwrap();
        assert_eq!(auction.order_count(1), 1);
    }

    #[test]
    fn test_market_orders_auto_finalize_full_fill() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyers = [addr(1), addr(2), addr(3)];
        for b in buyers {
            fund(&mut env, &auction, b, e18(100));
        }

        env.now = START; // curve price = max = 0.125, exactly dyadic
        let price = fx("0.125");
        for (i, b) in buyers.iter().enumerate() {
            let id = auction
                .add_market_order(
                    &mut env,
                    &Ctx::new(*b),
                    1,
                    e18(334),
                    e18(50),
                    e18(1_000),
                    Funding::Direct,
                )
                .unwrap();
            assert_eq!(id as usize, i + 1);
        }

        let a = auction.get_auction(1).unwrap();
        assert_eq!(a.status, AuctionStatus::Finalized);
        assert_eq!(a.total_contracts, e18(1_000));
        assert_eq!(a.total_contracts_sold, e18(1_000));
        assert_eq!(a.last_price, price);
    }

    #[test]
    fn test_full_fill_withdrawals_settle_at_clearing_price() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyers = [addr(1), addr(2), addr(3)];
        for b in buyers {
            fund(&mut env, &auction, b, e18(100));
        }
        env.now = START;
        for b in buyers {
            auction
                .add_market_order(&mut env, &Ctx::new(b), 1, e18(334), e18(50), e18(1_000), Funding::Direct)
                .unwrap();
        }
        settle(&mut env, &mut auction, 1);
        env.now += RESCUE_DELAY;

        let price = fx("0.125");
        // previews on the intact book: the third buyer's last 2 contracts
        // stay unfilled and refund at the order price
        let (refund3, fill3) = auction.preview_withdraw(&env, 1, buyers[2]).unwrap();
        assert_eq!(fill3, e18(332));
        assert_eq!(refund3, price.mulu(e18(2)).unwrap());

        let long_id = auction.get_auction(1).unwrap().long_token_id;
        for (i, b) in buyers.iter().enumerate() {
            let (refund, fill) = auction.withdraw(&mut env, &Ctx::new(*b), 1).unwrap();
            if i < 2 {
                assert_eq!(fill, e18(334));
                assert_eq!(refund, U256::ZERO);
            } else {
                assert_eq!(fill, e18(332));
                assert_eq!(refund, price.mulu(e18(2)).unwrap());
            }
            assert_eq!(env.pool.balance_of(*b, long_id), fill);
            assert!(auction.epochs_by_buyer(*b).is_empty());
        }
        // exact conservation with a dyadic price: the book drains fully
        assert_eq!(env.tokens.balance_of(weth(), auction.address()), U256::ZERO);
        assert_eq!(auction.order_count(1), 0);
    }

    #[test]
    fn test_partial_fill_priority() {
        let (mut env, mut auction) = setup();
        init(&mut env, &mut auction, 1);
        auction
            .set_auction_prices(&mut env, &vault_ctx(), 1, fx("100"), fx("10"))
            .unwrap();
        let total = e18(1_000);
        let (b1, b2, b3) = (addr(1), addr(2), addr(3));
        fund(&mut env, &auction, b1, e18(100_000));
        fund(&mut env, &auction, b2, e18(100_000));
        fund(&mut env, &auction, b3, e18(100_000));

        // resting limits before the window opens
        auction
            .add_limit_order(&mut env, &Ctx::new(b1), 1, fx("100"), e18(900), total, Funding::Direct)
            .unwrap();
        auction
            .add_limit_order(&mut env, &Ctx::new(b2), 1, fx("10"), e18(1_000), total, Funding::Direct)
            .unwrap();
        assert_eq!(auction.status(1), AuctionStatus::Initialized);

        // market order at the window open fills the book at the curve price
        env.now = START;
        auction
            .add_market_order(&mut env, &Ctx::new(b3), 1, e18(200), e18(50_000), total, Funding::Direct)
            .unwrap();

        let a = auction.get_auction(1).unwrap();
        assert_eq!(a.status, AuctionStatus::Finalized);
        // clearing price is the market order's curve price
        assert_eq!(a.last_price, fx("100"));
        assert_eq!(a.total_contracts_sold, total);

        settle(&mut env, &mut auction, 1);
        env.now += RESCUE_DELAY;

        // B1 fully filled at no spread
        let (refund1, fill1) = auction.withdraw(&mut env, &Ctx::new(b1), 1).unwrap();
        assert_eq!(fill1, e18(900));
        assert_eq!(refund1, U256::ZERO);
        // B3 half filled, the unfilled half refunds at the order price
        let (refund3, fill3) = auction.withdraw(&mut env, &Ctx::new(b3), 1).unwrap();
        assert_eq!(fill3, e18(100));
        assert_eq!(refund3, fx("100").mulu(e18(100)).unwrap());
        // B2 priced below the clearing price: full refund, no fill
        let (refund2, fill2) = auction.withdraw(&mut env, &Ctx::new(b2), 1).unwrap();
        assert_eq!(fill2, U256::ZERO);
        assert_eq!(refund2, fx("10").mulu(e18(1_000)).unwrap());
    }

    #[test]
    fn test_withdrawal_order_does_not_change_fills() {
        // Same book as the full-fill test, but the boundary buyer leaves
        // first. The claimed counter keeps every entitlement stable.
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyers = [addr(1), addr(2), addr(3)];
        for b in buyers {
            fund(&mut env, &auction, b, e18(100));
        }
        env.now = START;
        for b in buyers {
            auction
                .add_market_order(&mut env, &Ctx::new(b), 1, e18(334), e18(50), e18(1_000), Funding::Direct)
                .unwrap();
        }
        settle(&mut env, &mut auction, 1);
        env.now += RESCUE_DELAY;

        let (_, fill3) = auction.withdraw(&mut env, &Ctx::new(buyers[2]), 1).unwrap();
        let (_, fill1) = auction.withdraw(&mut env, &Ctx::new(buyers[0]), 1).unwrap();
        let (_, fill2) = auction.withdraw(&mut env, &Ctx::new(buyers[1]), 1).unwrap();
        assert_eq!(fill3, e18(332));
        assert_eq!(fill1, e18(334));
        assert_eq!(fill2, e18(334));
        assert_eq!(env.tokens.balance_of(weth(), auction.address()), U256::ZERO);
    }

    #[test]
    fn test_finalize_after_end_with_partial_book() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(100));
        auction
            .add_limit_order(&mut env, &Ctx::new(buyer), 1, fx("0.125"), e18(400), e18(1_000), Funding::Direct)
            .unwrap();

        // live finalize attempt leaves the auction running
        env.now = START + 100;
        auction.finalize_auction(&mut env, 1, e18(1_000)).unwrap();
        assert_eq!(auction.status(1), AuctionStatus::Initialized);

        // after the end the partial book clears
        env.now = END + 1;
        auction.finalize_auction(&mut env, 1, e18(1_000)).unwrap();
        let a = auction.get_auction(1).unwrap();
        assert_eq!(a.status, AuctionStatus::Finalized);
        assert_eq!(a.total_contracts_sold, e18(400));
        assert_eq!(a.last_price, fx("0.125"));
    }

    #[test]
    fn test_rescue_cancel_after_grace() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        env.now = END + RESCUE_DELAY;
        auction.finalize_auction(&mut env, 1, e18(1_000)).unwrap();
        assert_eq!(auction.status(1), AuctionStatus::Cancelled);
        assert_eq!(auction.get_auction(1).unwrap().last_price, Fixed64::MAX);
    }

    #[test]
    fn test_cancelled_auction_full_refunds() {
        let (mut env, mut auction) = setup();
        init(&mut env, &mut auction, 1);
        auction
            .set_auction_prices(&mut env, &vault_ctx(), 1, fx("0.125"), fx("0.015625"))
            .unwrap();
        let (b1, b2) = (addr(1), addr(2));
        fund(&mut env, &auction, b1, e18(100));
        fund(&mut env, &auction, b2, e18(100));
        auction
            .add_limit_order(&mut env, &Ctx::new(b1), 1, fx("0.125"), e18(100), e18(1_000), Funding::Direct)
            .unwrap();
        auction
            .add_limit_order(&mut env, &Ctx::new(b2), 1, fx("0.0625"), e18(200), e18(1_000), Funding::Direct)
            .unwrap();

        // a day past the end the stuck auction cancels; everyone refunds
        env.now = END + RESCUE_DELAY;
        auction.finalize_auction(&mut env, 1, e18(1_000)).unwrap();
        assert_eq!(auction.status(1), AuctionStatus::Cancelled);

        let (refund1, fill1) = auction.withdraw(&mut env, &Ctx::new(b1), 1).unwrap();
        assert_eq!(refund1, fx("0.125").mulu(e18(100)).unwrap());
        assert_eq!(fill1, U256::ZERO);
        let (refund2, fill2) = auction.withdraw(&mut env, &Ctx::new(b2), 1).unwrap();
        assert_eq!(refund2, fx("0.0625").mulu(e18(200)).unwrap());
        assert_eq!(fill2, U256::ZERO);
        assert_eq!(env.tokens.balance_of(weth(), b1), e18(100));
        assert_eq!(env.tokens.balance_of(weth(), b2), e18(100));
    }

    #[test]
    fn test_withdraw_hold_period() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(200));
        env.now = START;
        auction
            .add_market_order(&mut env, &Ctx::new(buyer), 1, e18(1_000), e18(130), e18(1_000), Funding::Direct)
            .unwrap();
        settle(&mut env, &mut auction, 1);

        env.now += RESCUE_DELAY - 1;
        assert_eq!(
            auction.withdraw(&mut env, &Ctx::new(buyer), 1),
            Err(Error::HoldPeriodActive)
        );
        env.now += 1;
        auction.withdraw(&mut env, &Ctx::new(buyer), 1).unwrap();
    }

    #[test]
    fn test_expired_itm_call_settles_in_collateral() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(200));
        env.now = START;
        auction
            .add_market_order(&mut env, &Ctx::new(buyer), 1, e18(1_000), e18(130), e18(1_000), Funding::Direct)
            .unwrap();
        settle(&mut env, &mut auction, 1);

        // settlement of the expired longs against the pool is external to
        // the engine; seed the exercise proceeds
        let spot = fx("2100");
        let strike = fx("2000");
        let exercise = spot
            .checked_sub(strike)
            .unwrap()
            .div(spot)
            .unwrap()
            .mulu(e18(1_000))
            .unwrap();
        env.tokens.mint(weth(), auction.address(), exercise);

        env.now = EXPIRY;
        let (refund, fill) = auction.withdraw(&mut env, &Ctx::new(buyer), 1).unwrap();
        assert_eq!(fill, U256::ZERO, "no long tokens after expiry");
        assert_eq!(refund, exercise);
        let long_id = auction.get_auction(1).unwrap().long_token_id;
        assert_eq!(env.pool.balance_of(buyer, long_id), U256::ZERO);
    }

    #[test]
    fn test_expired_otm_call_settles_to_nothing() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(200));
        env.now = START;
        auction
            .add_market_order(&mut env, &Ctx::new(buyer), 1, e18(1_000), e18(130), e18(1_000), Funding::Direct)
            .unwrap();
        settle(&mut env, &mut auction, 1);

        // out of the money at expiry
        env.now = EXPIRY;
        let (refund, fill) = {
            let mut pool = ReferencePool::new(addr(0xF0), weth(), addr(0xDA), 18, 18);
            pool.set_settlement_price(EXPIRY, fx("1900"));
            env.pool = Box::new(pool);
            auction.withdraw(&mut env, &Ctx::new(buyer), 1).unwrap()
        };
        assert_eq!(fill, U256::ZERO);
        assert_eq!(refund, U256::ZERO);
    }

    #[test]
    fn test_transfer_premium_at_most_once() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(200));
        env.now = START;
        auction
            .add_market_order(&mut env, &Ctx::new(buyer), 1, e18(1_000), e18(130), e18(1_000), Funding::Direct)
            .unwrap();

        let premiums = auction.transfer_premium(&mut env, &vault_ctx(), 1).unwrap();
        assert_eq!(premiums, fx("0.125").mulu(e18(1_000)).unwrap());
        assert_eq!(env.tokens.balance_of(weth(), vault()), premiums);
        assert_eq!(
            auction.transfer_premium(&mut env, &vault_ctx(), 1),
            Err(Error::PremiumsAlreadyTransferred)
        );
    }

    #[test]
    fn test_process_auction_preconditions() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(200));
        env.now = START;
        auction
            .add_market_order(&mut env, &Ctx::new(buyer), 1, e18(1_000), e18(130), e18(1_000), Funding::Direct)
            .unwrap();

        // premiums first
        assert_eq!(
            auction.process_auction(&mut env, &vault_ctx(), 1),
            Err(Error::PremiumsNotTransferred)
        );
        auction.transfer_premium(&mut env, &vault_ctx(), 1).unwrap();
        // then the long tokens must be present
        assert_eq!(
            auction.process_auction(&mut env, &vault_ctx(), 1),
            Err(Error::LongTokensMissing)
        );
        env.tokens.mint(weth(), vault(), e18(1_000));
        let pool_addr = env.pool.address();
        env.tokens.approve(weth(), vault(), pool_addr, e18(1_000));
        env.pool
            .write_from(&mut env.tokens, vault(), auction.address(), EXPIRY, fx("2000"), e18(1_000), true)
            .unwrap();
        auction.process_auction(&mut env, &vault_ctx(), 1).unwrap();
        assert_eq!(auction.status(1), AuctionStatus::Processed);
        assert_eq!(auction.get_auction(1).unwrap().processed_time, env.now);
        // terminal: a second processing is a status failure
        assert_eq!(
            auction.process_auction(&mut env, &vault_ctx(), 1),
            Err(Error::BadStatus(AuctionStatus::Processed))
        );
    }

    #[test]
    fn test_cancel_limit_order() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        fund(&mut env, &auction, buyer, e18(100));
        let ctx = Ctx::new(buyer);
        let id = auction
            .add_limit_order(&mut env, &ctx, 1, fx("0.125"), e18(100), e18(1_000), Funding::Direct)
            .unwrap();

        assert_eq!(
            auction.cancel_limit_order(&mut env, &ctx, 1, 0, e18(1_000)),
            Err(Error::InvalidOrderId)
        );
        assert_eq!(
            auction.cancel_limit_order(&mut env, &ctx, 1, 42, e18(1_000)),
            Err(Error::OrderNotFound)
        );
        assert_eq!(
            auction.cancel_limit_order(&mut env, &Ctx::new(addr(2)), 1, id, e18(1_000)),
            Err(Error::BuyerMismatch)
        );

        auction.cancel_limit_order(&mut env, &ctx, 1, id, e18(1_000)).unwrap();
        assert_eq!(auction.order_count(1), 0);
        assert_eq!(env.tokens.balance_of(weth(), buyer), e18(100));
    }

    #[test]
    fn test_wrapped_native_funding() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        let cost = fx("0.125").mulu(e18(100)).unwrap();

        // native value covers the cost with change returned as wrapped
        let ctx = Ctx::with_value(buyer, cost + U256::from(5u64));
        auction
            .add_limit_order(&mut env, &ctx, 1, fx("0.125"), e18(100), e18(1_000), Funding::Direct)
            .unwrap();
        assert_eq!(env.tokens.balance_of(weth(), auction.address()), cost);
        assert_eq!(env.tokens.balance_of(weth(), buyer), U256::from(5u64));
    }

    #[test]
    fn test_wrapped_native_mismatch() {
        let (mut env, _) = setup();
        // engine collateralised in DAI must reject attached native value
        let mut dai_auction = DutchAuction::new(addr(0xA0), vault(), addr(0xDA), false, 18, 18, pow10(17));
        dai_auction
            .initialize(
                &mut env,
                &vault_ctx(),
                InitAuction {
                    epoch: 1,
                    expiry: EXPIRY,
                    strike: fx("2000"),
                    long_token_id: U256::from(1u64) << 200,
                    start_time: START,
                    end_time: END,
                },
            )
            .unwrap();
        dai_auction
            .set_auction_prices(&mut env, &vault_ctx(), 1, fx("256"), fx("16"))
            .unwrap();
        let ctx = Ctx::with_value(addr(1), U256::from(100u64));
        assert_eq!(
            dai_auction.add_limit_order(&mut env, &ctx, 1, fx("256"), e18(1), e18(1_000), Funding::Direct),
            Err(Error::WrappedNativeMismatch)
        );
    }

    #[test]
    fn test_prepaid_funding_refunds_excess() {
        let (mut env, mut auction) = setup();
        init_priced(&mut env, &mut auction, 1);
        let buyer = addr(1);
        let cost = fx("0.125").mulu(e18(100)).unwrap();
        // a swap already credited more than the cost to the engine
        env.tokens.mint(weth(), auction.address(), cost + e18(1));
        auction
            .add_limit_order(
                &mut env,
                &Ctx::new(buyer),
                1,
                fx("0.125"),
                e18(100),
                e18(1_000),
                Funding::Prepaid(cost + e18(1)),
            )
            .unwrap();
        assert_eq!(env.tokens.balance_of(weth(), buyer), e18(1));
        assert_eq!(env.tokens.balance_of(weth(), auction.address()), cost);

        // shortfall fails before any mutation
        assert_eq!(
            auction.add_limit_order(
                &mut env,
                &Ctx::new(buyer),
                1,
                fx("0.125"),
                e18(100),
                e18(1_000),
                Funding::Prepaid(U256::from(1u64)),
            ),
            Err(Error::SwapShortfall)
        );
    }
}
