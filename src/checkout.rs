//! Checkout context

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::coupons::{ClientId, ProductId};

/// A single checkout attempt, as seen by the engine.
///
/// Quotes are a pure function of this context and the catalog, so `now` is an
/// explicit field rather than read from a clock: the same context always
/// prices the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutContext {
    /// Client making the purchase.
    pub client_id: ClientId,

    /// Product being purchased.
    pub product_id: ProductId,

    /// Pre-discount subtotal in cents.
    pub subtotal_cents: i64,

    /// Instant at which eligibility windows are evaluated.
    pub now: Timestamp,

    /// Whether this is the client's first purchase.
    pub is_first_purchase: bool,
}

impl CheckoutContext {
    /// Creates a checkout context.
    pub fn new(
        client_id: impl Into<String>,
        product_id: impl Into<String>,
        subtotal_cents: i64,
        now: Timestamp,
    ) -> Self {
        Self {
            client_id: ClientId::new(client_id),
            product_id: ProductId::new(product_id),
            subtotal_cents,
            now,
            is_first_purchase: false,
        }
    }

    /// Marks this as the client's first purchase.
    #[must_use]
    pub fn first_purchase(mut self) -> Self {
        self.is_first_purchase = true;
        self
    }
}
