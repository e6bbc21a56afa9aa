//! Contracted external collaborators and the host environment.
//!
//! The core is a deterministic state machine driven from a single command
//! queue. Everything outside it (the clock, the token substrate, the
//! options pool, the pricer, the exchange helper and the event log) lives
//! in an [`Env`] value the driver owns and passes `&mut` into every entry
//! point. External calls are synchronous; no handler suspends.
//!
//! Caller identity travels explicitly in a [`Ctx`] rather than being read
//! from ambient state, together with any native value attached to the call.

pub mod exchange;
pub mod pool;
pub mod pricer;
pub mod tokens;

pub use exchange::{ExchangeHelper, FixedRateExchange, SwapArgs};
pub use pool::{OptionPool, PoolSettings, ReferencePool};
pub use pricer::{BlackScholesPricer, Pricer};
pub use tokens::TokenLedger;

use alloy_primitives::{Address, U256};

use crate::types::Event;

/// Caller identity and attached native value for one call.
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    /// The account invoking the entry point.
    pub caller: Address,
    /// Native value attached to the call (wrapped on use).
    pub value: U256,
}

impl Ctx {
    /// A plain call with no attached value.
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: U256::ZERO,
        }
    }

    /// A call with attached native value.
    pub fn with_value(caller: Address, value: U256) -> Self {
        Self { caller, value }
    }
}

/// The host world: injected clock, token substrates, collaborators and the
/// observable event log.
pub struct Env {
    /// Injected wall clock, unix seconds. Must never move backwards.
    pub now: u64,
    /// ERC20-like fungible balances.
    pub tokens: TokenLedger,
    /// The options pool.
    pub pool: Box<dyn OptionPool>,
    /// The pricing oracle.
    pub pricer: Box<dyn Pricer>,
    /// The swap helper.
    pub exchange: Box<dyn ExchangeHelper>,
    /// Observable events in emission order.
    pub events: Vec<Event>,
}

impl Env {
    /// Append an event to the log.
    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
