//! Error taxonomy for the underwriting core.
//!
//! Every expected failure path surfaces as a distinct [`Error`] kind and is
//! returned through [`Result`]; the crate never panics on an expected path.
//! Argument and state failures are raised before any state is mutated, so a
//! failing entry point leaves no partial effects behind.

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds surfaced by the vault, auction, queue and math layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------
    /// Caller is not the vault owner.
    NotOwner,
    /// Caller is not the authorised keeper.
    NotKeeper,
    /// Component entry point reserved for the vault.
    NotVault,
    /// Entry point reserved for the deposit queue.
    NotQueue,

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------
    /// The auction is not in the status the operation requires.
    BadStatus(crate::auction::AuctionStatus),
    /// Share withdrawal attempted while the epoch's auction is unprocessed.
    AuctionNotProcessed,
    /// Long tokens are still inside the 24 hour hold period.
    HoldPeriodActive,
    /// Auction processing attempted before the premium transfer.
    PremiumsNotTransferred,
    /// The premium for this auction was already transferred.
    PremiumsAlreadyTransferred,
    /// The auction does not hold the long tokens it sold.
    LongTokensMissing,
    /// The deposit queue is paused.
    Paused,
    /// A public mutator was re-entered while its latch was held.
    Reentrant,
    /// The injected clock moved backwards.
    RetrogradeClock,

    // ------------------------------------------------------------------
    // Argument
    // ------------------------------------------------------------------
    /// A required address argument was the zero address.
    AddressNotProvided,
    /// An address update supplied the value already stored.
    AddressUnchanged,
    /// A value argument is below the accepted minimum.
    ValueBelowMinimum,
    /// A value argument exceeds the accepted maximum.
    ValueExceedsMaximum,
    /// The deposit would push queued plus vaulted assets past the TVL cap.
    MaxTvlExceeded,
    /// Order size is below the auction's minimum order size.
    SizeBelowMinimum,
    /// Market order cost exceeds the buyer's stated maximum.
    CostExceedsMax,
    /// Order id zero is the null sentinel and never addresses an order.
    InvalidOrderId,
    /// No live order with this id exists in the book.
    OrderNotFound,
    /// The order belongs to a different buyer.
    BuyerMismatch,
    /// Claim tokens of the current epoch cannot be redeemed, only cancelled.
    CurrentClaimTokenNotRedeemable,
    /// Token decimal configuration is inconsistent.
    DecimalsMismatch,
    /// A numeric argument is outside the function's domain.
    InvalidArgument,

    // ------------------------------------------------------------------
    // Numeric
    // ------------------------------------------------------------------
    /// Division by zero.
    DivisionByZero,
    /// Fixed-point or 256-bit arithmetic overflow.
    Overflow,

    // ------------------------------------------------------------------
    // External
    // ------------------------------------------------------------------
    /// Native value attached but the collateral asset is not wrapped native.
    WrappedNativeMismatch,
    /// Swap returned less than the required minimum output.
    SwapShortfall,
    /// Token balance is insufficient for the transfer.
    InsufficientBalance,
    /// Token allowance is insufficient for the transfer.
    InsufficientAllowance,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotOwner => write!(f, "caller is not the owner"),
            Error::NotKeeper => write!(f, "caller is not the keeper"),
            Error::NotVault => write!(f, "caller is not the vault"),
            Error::NotQueue => write!(f, "caller is not the queue"),
            Error::BadStatus(s) => write!(f, "auction status {s:?} does not permit this operation"),
            Error::AuctionNotProcessed => write!(f, "auction is not processed"),
            Error::HoldPeriodActive => write!(f, "long token hold period is active"),
            Error::PremiumsNotTransferred => write!(f, "premiums have not been transferred"),
            Error::PremiumsAlreadyTransferred => write!(f, "premiums were already transferred"),
            Error::LongTokensMissing => write!(f, "auction is missing its long tokens"),
            Error::Paused => write!(f, "deposits are paused"),
            Error::Reentrant => write!(f, "reentrant call"),
            Error::RetrogradeClock => write!(f, "clock moved backwards"),
            Error::AddressNotProvided => write!(f, "address not provided"),
            Error::AddressUnchanged => write!(f, "address unchanged"),
            Error::ValueBelowMinimum => write!(f, "value below minimum"),
            Error::ValueExceedsMaximum => write!(f, "value exceeds maximum"),
            Error::MaxTvlExceeded => write!(f, "maximum TVL exceeded"),
            Error::SizeBelowMinimum => write!(f, "order size below minimum"),
            Error::CostExceedsMax => write!(f, "order cost exceeds maximum"),
            Error::InvalidOrderId => write!(f, "invalid order id"),
            Error::OrderNotFound => write!(f, "order not found"),
            Error::BuyerMismatch => write!(f, "order belongs to a different buyer"),
            Error::CurrentClaimTokenNotRedeemable => {
                write!(f, "current claim token is not redeemable")
            }
            Error::DecimalsMismatch => write!(f, "token decimals mismatch"),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::DivisionByZero => write!(f, "division by zero"),
            Error::Overflow => write!(f, "arithmetic overflow"),
            Error::WrappedNativeMismatch => write!(f, "collateral is not wrapped native"),
            Error::SwapShortfall => write!(f, "swap output below minimum"),
            Error::InsufficientBalance => write!(f, "insufficient token balance"),
            Error::InsufficientAllowance => write!(f, "insufficient token allowance"),
        }
    }
}

impl std::error::Error for Error {}
