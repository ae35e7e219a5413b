//! Redemption ledger

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    coupons::{CouponCode, CouponId},
    pricing::BreakdownLine,
};

/// Idempotency key for a checkout order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates an order id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a redemption record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    /// The redemption counts against the involved coupons.
    Active,

    /// The redemption was compensated; counters have been restored.
    Voided,
}

/// Durable record that an order consumed a set of coupons.
///
/// Created exactly once per order id, transitions to [`RedemptionStatus::Voided`]
/// only through [`RedemptionLedger::void`], and is never deleted — the ledger
/// is an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// The order that consumed the coupons.
    pub order_id: OrderId,

    /// Per-coupon deductions granted to the order.
    pub lines: SmallVec<[BreakdownLine; 4]>,

    /// Whether the redemption still counts.
    pub status: RedemptionStatus,

    /// When the redemption was recorded.
    pub created_at: Timestamp,
}

impl Redemption {
    /// Total cents granted across the breakdown.
    #[must_use]
    pub fn discount_cents(&self) -> i64 {
        self.lines.iter().map(|line| line.deduct_cents).sum()
    }
}

/// Errors from ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A coupon's redemption limit was reached between quote and redeem.
    ///
    /// Retryable: the caller should re-quote, since the discount may no
    /// longer apply.
    #[error("redemption limit reached for coupon {code}")]
    Conflict {
        /// Code of the exhausted coupon.
        code: CouponCode,
    },

    /// The breakdown referenced a coupon the store no longer knows.
    #[error("coupon {id} missing from the store")]
    MissingCoupon {
        /// Id of the missing coupon.
        id: CouponId,
    },

    /// Underlying storage failure; propagated, never retried here.
    #[error("storage error: {message}")]
    Internal {
        /// Storage-specific description.
        message: String,
    },
}

impl LedgerError {
    /// Whether the caller may retry after re-quoting.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }
}

/// Atomic redemption bookkeeping over the coupon catalog.
///
/// This is the only interface in the crate with a shared-mutable-state
/// hazard; implementations must uphold two contracts:
///
/// - **Limit indivisibility**: for each coupon, the `redeemed_count <
///   max_redemptions` check and the increment are a single atomic unit with
///   respect to other redemption attempts on the same coupon. No committed
///   state may ever show a count above the limit.
/// - **All-or-nothing**: when any coupon in a stacked set fails its check,
///   coupons already incremented by the same attempt are compensated before
///   the error returns. Callers never observe a half-applied stack.
pub trait RedemptionLedger: Send + Sync {
    /// Records a redemption for `order_id`, incrementing each involved
    /// coupon's counters.
    ///
    /// Idempotent per order id: if a redemption already exists, the existing
    /// record is returned unchanged, whatever its status.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Conflict`] when a coupon's limit was reached
    ///   concurrently; the attempt is fully rolled back.
    /// - [`LedgerError::MissingCoupon`] when a breakdown line references a
    ///   coupon the store does not hold.
    /// - [`LedgerError::Internal`] on storage failure.
    fn try_redeem(
        &self,
        order_id: &OrderId,
        lines: &[BreakdownLine],
        now: Timestamp,
    ) -> Result<Redemption, LedgerError>;

    /// Compensates a recorded redemption: decrements each involved coupon's
    /// `redeemed_count` and `total_savings_cents` by the recorded amounts
    /// and marks the record voided.
    ///
    /// Idempotent and effectively error-free: voiding an unknown or
    /// already-voided order id is a no-op success, so cancellation flows
    /// stay simple for callers. Returns whether this call actually voided a
    /// redemption, so callers can tell a state change from a replay.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Internal`] on storage failure.
    fn void(&self, order_id: &OrderId) -> Result<bool, LedgerError>;

    /// Looks up the redemption recorded for an order id, if any.
    fn redemption(&self, order_id: &OrderId) -> Option<Redemption>;
}
