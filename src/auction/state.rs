//! Per-epoch auction state.
//!
//! One [`Auction`] record per epoch tracks the status machine and the
//! settlement figures. A cancelled auction parks the clearing price at the
//! [`Fixed64::MAX`] sentinel; the withdraw path branches on that sentinel
//! rather than on the status, so the comparison is load-bearing.

use alloy_primitives::U256;

use crate::error::Result;
use crate::types::fixed::Fixed64;

/// Auction lifecycle status.
///
/// `Processed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuctionStatus {
    #[default]
    Uninitialized,
    Initialized,
    Finalized,
    Processed,
    Cancelled,
}

/// Parameters handed to [`crate::auction::DutchAuction::initialize`].
#[derive(Debug, Clone, Copy)]
pub struct InitAuction {
    pub epoch: u64,
    pub expiry: u64,
    pub strike: Fixed64,
    pub long_token_id: U256,
    pub start_time: u64,
    pub end_time: u64,
}

/// State of one epoch's descending-price auction.
#[derive(Debug, Clone, Default)]
pub struct Auction {
    pub status: AuctionStatus,
    pub epoch: u64,
    /// Option expiry, unix seconds.
    pub expiry: u64,
    /// Option strike (64.64).
    pub strike: Fixed64,
    /// Pool token id of the long side sold to buyers.
    pub long_token_id: U256,
    /// Price curve ceiling.
    pub max_price: Fixed64,
    /// Price curve floor.
    pub min_price: Fixed64,
    /// Uniform clearing price once finalized; `Fixed64::MAX` when cancelled.
    pub last_price: Fixed64,
    pub start_time: u64,
    pub end_time: u64,
    /// Timestamp of processing; 0 until processed.
    pub processed_time: u64,
    /// Contracts offered, frozen at the first order.
    pub total_contracts: U256,
    /// Contracts sold at the clearing price.
    pub total_contracts_sold: U256,
    /// Contracts already delivered through withdrawals.
    pub total_contracts_claimed: U256,
    /// Premiums transferred to the vault; 0 until the transfer.
    pub total_premiums: U256,
}

impl Auction {
    /// Price on the descending curve at `now`.
    ///
    /// Flat at `max_price` before the start, linear in between, flat at
    /// `min_price` after the end.
    pub fn price_curve(&self, now: u64) -> Result<Fixed64> {
        if now <= self.start_time {
            return Ok(self.max_price);
        }
        if now >= self.end_time {
            return Ok(self.min_price);
        }
        let elapsed = Fixed64::from_ratio(
            (now - self.start_time) as i128,
            (self.end_time - self.start_time) as i128,
        )?;
        let span = self.max_price.checked_sub(self.min_price)?;
        self.max_price.checked_sub(elapsed.mul(span)?)
    }

    /// The price settlements reference: the recorded clearing price once the
    /// auction left the live phase, the curve price while it runs.
    pub fn clearing_price(&self, now: u64) -> Result<Fixed64> {
        match self.status {
            AuctionStatus::Finalized | AuctionStatus::Processed | AuctionStatus::Cancelled => {
                Ok(self.last_price)
            }
            _ => self.price_curve(now),
        }
    }

    /// True once no further state transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            AuctionStatus::Processed | AuctionStatus::Cancelled
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
