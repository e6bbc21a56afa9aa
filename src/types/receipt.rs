//! Epoch receipts for processed auctions.
//!
//! When the keeper processes an auction the vault records a compact receipt
//! with a SHA-256 digest over the canonical big-endian encoding of the
//! settlement figures. The digest lets an off-host auditor verify an epoch's
//! outcome without replaying the order flow.

use alloy_primitives::U256;
use sha2::{Digest, Sha256};

use crate::types::fixed::Fixed64;

/// Settlement summary of one processed epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochReceipt {
    /// Epoch the auction belonged to.
    pub epoch: u64,
    /// Contracts sold at the clearing price.
    pub contracts_sold: U256,
    /// Uniform clearing price (64.64).
    pub clearing_price: Fixed64,
    /// Premiums transferred to the vault, in collateral units.
    pub premiums: U256,
    /// Timestamp the auction was processed.
    pub processed_time: u64,
    /// SHA-256 over the canonical field encoding.
    pub digest: [u8; 32],
}

impl EpochReceipt {
    /// Build a receipt, computing the digest from the canonical encoding.
    pub fn new(
        epoch: u64,
        contracts_sold: U256,
        clearing_price: Fixed64,
        premiums: U256,
        processed_time: u64,
    ) -> Self {
        let digest = Self::compute_digest(
            epoch,
            contracts_sold,
            clearing_price,
            premiums,
            processed_time,
        );
        Self {
            epoch,
            contracts_sold,
            clearing_price,
            premiums,
            processed_time,
            digest,
        }
    }

    /// Canonical encoding: epoch ‖ sold ‖ price ‖ premiums ‖ time, all
    /// big-endian fixed width.
    fn compute_digest(
        epoch: u64,
        contracts_sold: U256,
        clearing_price: Fixed64,
        premiums: U256,
        processed_time: u64,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(epoch.to_be_bytes());
        hasher.update(contracts_sold.to_be_bytes::<32>());
        hasher.update(clearing_price.0.to_be_bytes());
        hasher.update(premiums.to_be_bytes::<32>());
        hasher.update(processed_time.to_be_bytes());
        hasher.finalize().into()
    }

    /// Digest as lowercase hex.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
