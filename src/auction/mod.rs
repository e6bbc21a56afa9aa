//! Dutch auction subsystem.
//!
//! One descending-price auction per weekly epoch sells a fixed quantity of
//! option contracts. The engine owns the per-epoch auction records and order
//! books and drives the status machine; the vault owns the engine.
//!
//! ## Components
//!
//! - [`Auction`] / [`AuctionStatus`]: per-epoch state and lifecycle
//! - [`DutchAuction`]: the engine with orders, finalization and withdrawals
//! - [`Funding`]: how an order's cost reaches the engine

pub mod engine;
pub mod state;

pub use engine::{DutchAuction, Funding, RESCUE_DELAY};
pub use state::{Auction, AuctionStatus, InitAuction};
