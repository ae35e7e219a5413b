//! Catalog access

use crate::coupons::{Coupon, CouponCode, CouponId};

/// Read-only access to the coupon catalog.
///
/// The catalog is owned by an external store (authored through the admin
/// collaborator); the engine only reads through this interface and returns
/// owned snapshots, so a quote works against a consistent view of each coupon
/// even while counters move underneath.
pub trait Catalog: Send + Sync {
    /// Looks up a coupon by its case-insensitive code.
    fn coupon_by_code(&self, code: &CouponCode) -> Option<Coupon>;

    /// Looks up a coupon by id.
    fn coupon_by_id(&self, id: &CouponId) -> Option<Coupon>;

    /// Snapshot of every coupon in the catalog.
    ///
    /// Used by the stats aggregator and automatic best-deal selection; the
    /// order is unspecified.
    fn coupons(&self) -> Vec<Coupon>;
}
