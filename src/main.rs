//! Theta Core - demo driver binary.
//!
//! Walks one full weekly epoch of a covered-call vault against the
//! deterministic reference substrates: deposit, auction setup, order flow,
//! processing and settlement, narrating the state after each keeper command.

use alloy_primitives::{Address, U256};

use thetacore::external::{BlackScholesPricer, FixedRateExchange, ReferencePool, TokenLedger};
use thetacore::types::calendar::{friday, next_friday, DAY, HOUR};
use thetacore::types::fixed::pow10;
use thetacore::vault::{VaultConfig, DEFAULT_END_OFFSET, DEFAULT_START_OFFSET};
use thetacore::{Ctx, Env, Fixed64, Vault};

fn addr(tag: u8) -> Address {
    Address::from([tag; 20])
}

fn fx(s: &str) -> Fixed64 {
    s.parse().expect("literal parses")
}

fn e18(n: u64) -> U256 {
    U256::from(n) * pow10(18)
}

fn eth(value: U256) -> String {
    let whole = value / pow10(18);
    let frac = u64::try_from((value % pow10(18)) / pow10(14)).expect("four digits fit");
    format!("{whole}.{frac:04}")
}

fn main() {
    println!("===========================================");
    println!("  Theta Core - weekly underwriting engine");
    println!("===========================================");
    println!();

    let weth = addr(0xEE);
    let dai = addr(0xDA);
    let mut tokens = TokenLedger::new(weth);
    tokens.register(dai, 18);

    // Thursday noon before a Friday 08:00 UTC expiry mark.
    let thursday: u64 = 1_641_542_400 - 20 * HOUR;
    let mut env = Env {
        now: thursday,
        tokens,
        pool: Box::new(ReferencePool::new(addr(0xF0), weth, dai, 18, 18)),
        pricer: Box::new(BlackScholesPricer::new(fx("2000"), fx("0.9"))),
        exchange: Box::new(FixedRateExchange::new(addr(0xE1))),
        events: Vec::new(),
    };

    let mut vault = Vault::new(VaultConfig {
        addr: addr(0xAA),
        owner: addr(0x01),
        keeper: addr(0x02),
        fee_recipient: addr(0x03),
        auction_addr: addr(0xAB),
        queue_addr: addr(0xAC),
        asset: weth,
        is_call: true,
        underlying_decimals: 18,
        base_decimals: 18,
        min_size: pow10(17),
        max_tvl: e18(1_000_000),
        reserve_rate: Fixed64::ZERO,
        performance_fee: fx("0.2"),
        withdrawal_fee: Fixed64::ZERO,
        delta: fx("0.3"),
        delta_offset: fx("0.1"),
        start_offset: DEFAULT_START_OFFSET,
        end_offset: DEFAULT_END_OFFSET,
    })
    .expect("valid configuration");

    let keeper = Ctx::new(addr(0x02));
    let depositor = addr(0x11);
    let buyer = addr(0x21);

    // --- Depositor queues collateral -------------------------------------
    env.tokens.mint(weth, depositor, e18(1_000));
    env.tokens
        .approve(weth, depositor, vault.queue_address(), e18(1_000));
    vault
        .deposit(&mut env, &Ctx::new(depositor), e18(1_000))
        .expect("deposit");
    println!("deposited          : {} WETH queued", eth(e18(1_000)));

    // --- Keeper opens next week's auction --------------------------------
    vault
        .initialize_auction(&mut env, &keeper)
        .expect("initialize_auction");
    let option = vault.get_option(1).expect("option written");
    println!("option written     : strike {} expiring +{}d", option.strike, (option.expiry - env.now) / DAY);
    println!("  expiry check     : next_friday = {}", next_friday(env.now));
    println!("  window           : {} .. {}", friday(env.now) + DEFAULT_START_OFFSET, friday(env.now) + DEFAULT_END_OFFSET);

    // --- Friday morning: the epoch rolls ----------------------------------
    env.now = friday(thursday) + HOUR;
    vault
        .initialize_epoch(&mut env, &keeper)
        .expect("initialize_epoch");
    let auction = vault.get_auction(1).expect("auction priced");
    println!("epoch rolled       : epoch {}", vault.get_epoch());
    println!("  price curve      : {} -> {}", auction.max_price, auction.min_price);
    println!("  shares minted    : {}", eth(vault.total_share_supply()));

    // --- Auction window: a buyer takes the full offering -------------------
    env.now = auction.start_time;
    env.tokens.mint(weth, buyer, e18(100));
    env.tokens
        .approve(weth, buyer, vault.auction_address(), e18(100));
    vault
        .add_market_order(&mut env, &Ctx::new(buyer), 1, e18(1_000), e18(100))
        .expect("market order");
    let auction = vault.get_auction(1).expect("auction state");
    println!("auction filled     : {:?}, clearing price {}", auction.status, auction.last_price);

    // --- Keeper processes: premiums in, contracts written ------------------
    env.now = auction.end_time + 300;
    vault
        .process_auction(&mut env, &keeper)
        .expect("process_auction");
    let receipt = vault.get_receipt(1).expect("epoch receipt");
    println!("auction processed  : sold {} contracts", eth(receipt.contracts_sold));
    println!("  premiums         : {} WETH", eth(receipt.premiums));
    println!("  receipt digest   : {}", receipt.digest_hex());
    println!("  total assets     : {} WETH", eth(vault.total_assets(&env).expect("assets")));

    // --- Buyer collects long tokens after the hold period ------------------
    env.now += DAY;
    let (refund, fill) = vault
        .withdraw_auction(&mut env, &Ctx::new(buyer), 1)
        .expect("withdraw");
    println!("buyer settled      : fill {} longs, refund {} WETH", eth(fill), eth(refund));

    println!();
    println!("{} events emitted; epoch {} complete.", env.events.len(), vault.get_epoch());
}
