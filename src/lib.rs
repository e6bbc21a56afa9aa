//! # Theta Core
//!
//! Deterministic weekly options underwriting engine.
//!
//! ## Architecture
//!
//! A vault pools depositor collateral and, once per weekly epoch, sells a
//! fixed quantity of covered option contracts through a descending-price
//! Dutch auction, underwriting the sold contracts against an external
//! options pool:
//!
//! - **Types**: 64.64 fixed point, Friday calendar, token ids, events,
//!   epoch receipts
//! - **OrderBook**: price-ordered arena book with stable FIFO within price
//! - **Auction**: the Dutch auction state machine
//! - **Queue**: per-epoch deposit buffer with fungible claim tokens
//! - **Vault**: share accounting, fees and the keeper's epoch controller
//! - **External**: contracted pool / pricer / exchange / token surfaces
//!
//! ## Design Principles
//!
//! 1. **Determinism**: all state mutation is integer arithmetic over
//!    injected inputs; identical command sequences produce identical state
//! 2. **No floating point**: prices are signed 64.64 on `i128`, amounts are
//!    `U256`, wide intermediates run on `U256`
//! 3. **Serialised execution**: one driver, one call at a time, no
//!    suspension points; reentrancy is latched out defensively
//! 4. **Atomic failures**: argument and state checks precede mutation, so a
//!    failed call leaves no partial effects
//!
//! ## Epoch lifecycle
//!
//! ```text
//! keeper.initialize_auction   write option N+1, open its auction, lock withdrawals
//! buyers.add_*_order          fund and rest bids; may auto-finalize at full cover
//! keeper.initialize_epoch     fees -> queued deposits -> epoch++ -> curve prices
//! keeper.process_auction      premiums in, contracts written, lock released
//! buyers.withdraw             long tokens + spread refunds at the clearing price
//! ```

pub mod auction;
pub mod error;
pub mod external;
pub mod orderbook;
pub mod queue;
pub mod types;
pub mod vault;

pub use auction::{Auction, AuctionStatus, DutchAuction};
pub use error::{Error, Result};
pub use external::{Ctx, Env};
pub use orderbook::{Order, OrderBook};
pub use queue::DepositQueue;
pub use types::{Event, Fixed64};
pub use vault::{Vault, VaultConfig};
