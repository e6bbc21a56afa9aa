//! Core data types for the underwriting engine.
//!
//! All financial values are deterministic fixed point: prices and strikes are
//! signed 64.64 ([`Fixed64`]), sizes and collateral amounts are unsigned
//! 256-bit integers.
//!
//! ## Modules
//!
//! - [`fixed`]: signed 64.64 arithmetic, snapping, contract conversion
//! - [`calendar`]: Friday 08:00 UTC expiry schedule
//! - [`token`]: pool and claim token-id packing
//! - [`event`]: externally observable event log entries
//! - [`receipt`]: per-epoch settlement receipts

pub mod calendar;
pub mod event;
pub mod fixed;
pub mod receipt;
pub mod token;

pub use event::Event;
pub use fixed::Fixed64;
pub use receipt::EpochReceipt;
pub use token::TokenType;
