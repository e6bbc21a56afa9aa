//! Order data and arena node for the auction order book.
//!
//! ## Design
//!
//! [`OrderNode`] wraps an [`Order`] with doubly-linked list pointers so a
//! node can be unlinked from the price-ordered list in O(1) once its slab
//! key is known. The pointers are slab keys (`usize`), not references.

use alloy_primitives::{Address, U256};

use crate::types::fixed::Fixed64;

/// A resting order in a Dutch auction's book.
///
/// Ids are issued monotonically starting at 1; id 0 is the null sentinel
/// returned by lookups of absent orders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Order {
    /// Unique order identifier (assigned by the book, never reused).
    pub id: u64,
    /// Bid price per contract (64.64, collateral units).
    pub price: Fixed64,
    /// Order size in contracts.
    pub size: U256,
    /// Account that funded the order.
    pub buyer: Address,
}

impl Order {
    /// Create an order record.
    pub fn new(id: u64, price: Fixed64, size: U256, buyer: Address) -> Self {
        Self {
            id,
            price,
            size,
            buyer,
        }
    }

    /// The zero tuple returned for absent ids.
    pub fn null() -> Self {
        Self::default()
    }

    /// True for the null sentinel.
    pub fn is_null(&self) -> bool {
        self.id == 0
    }
}

/// Order node stored in the slab arena.
#[derive(Debug, Clone)]
pub struct OrderNode {
    /// The order data.
    pub order: Order,
    /// Next (lower-or-equal-priced, newer within price) node's slab key.
    pub next: Option<usize>,
    /// Previous (higher-or-equal-priced, older within price) node's slab key.
    pub prev: Option<usize>,
}

impl OrderNode {
    /// Create an unlinked node.
    #[inline]
    pub fn new(order: Order) -> Self {
        Self {
            order,
            next: None,
            prev: None,
        }
    }

    /// Check whether the node is linked into a list.
    #[inline]
    pub fn is_unlinked(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
