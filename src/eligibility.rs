//! Eligibility

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{checkout::CheckoutContext, coupons::Coupon};

/// Why a coupon was not applied.
///
/// Rejection is a value, not an error: coupons failing these checks during
/// automatic stacking are simply excluded, and only explicitly entered codes
/// surface a reason to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The coupon is manually disabled.
    Disabled,

    /// The eligibility window has not started yet.
    NotStarted,

    /// The eligibility window has ended.
    Expired,

    /// Every redemption slot has been consumed.
    LimitReached,

    /// The coupon is assigned to other clients.
    NotEligibleForClient,

    /// The coupon applies to other products.
    NotEligibleForProduct,

    /// The subtotal is below the coupon's minimum purchase.
    BelowMinimumPurchase,

    /// The coupon is restricted to first purchases.
    FirstTimeOnly,

    /// The coupon conflicts with another selected coupon.
    StackConflict,

    /// No coupon with this code exists.
    Unknown,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            RejectionReason::Disabled => "this coupon is disabled",
            RejectionReason::NotStarted => "this coupon is not active yet",
            RejectionReason::Expired => "this coupon has expired",
            RejectionReason::LimitReached => "this coupon has reached its redemption limit",
            RejectionReason::NotEligibleForClient => "this coupon is not available on your account",
            RejectionReason::NotEligibleForProduct => "this coupon does not apply to this product",
            RejectionReason::BelowMinimumPurchase => "the order total is below this coupon's minimum",
            RejectionReason::FirstTimeOnly => "this coupon is for first purchases only",
            RejectionReason::StackConflict => "this coupon cannot be combined with the others",
            RejectionReason::Unknown => "unknown coupon code",
        };

        f.write_str(message)
    }
}

/// Decides whether a coupon may apply to a checkout.
///
/// All conditions must hold; they are checked in a fixed order so the
/// reported reason is deterministic. The redemption-limit check here is
/// optimistic — final enforcement happens atomically in the ledger.
///
/// # Errors
///
/// Returns the first failing condition as a [`RejectionReason`].
pub fn evaluate(coupon: &Coupon, ctx: &CheckoutContext) -> Result<(), RejectionReason> {
    if !coupon.enabled {
        return Err(RejectionReason::Disabled);
    }

    if coupon.starts_at.is_some_and(|starts_at| ctx.now < starts_at) {
        return Err(RejectionReason::NotStarted);
    }

    if coupon.ends_at.is_some_and(|ends_at| ends_at < ctx.now) {
        return Err(RejectionReason::Expired);
    }

    if coupon.limit_reached() {
        return Err(RejectionReason::LimitReached);
    }

    if !coupon.assigned_to.admits(&ctx.client_id) {
        return Err(RejectionReason::NotEligibleForClient);
    }

    if !coupon.applies_to.admits(&ctx.product_id) {
        return Err(RejectionReason::NotEligibleForProduct);
    }

    if coupon
        .min_subtotal_cents
        .is_some_and(|min| ctx.subtotal_cents < min)
    {
        return Err(RejectionReason::BelowMinimumPurchase);
    }

    if coupon.first_time_only && !ctx.is_first_purchase {
        return Err(RejectionReason::FirstTimeOnly);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::coupons::{ClientId, Discount, ProductId};

    use super::*;

    fn ctx() -> TestResult<CheckoutContext> {
        let now: Timestamp = "2026-06-01T00:00:00Z".parse()?;

        Ok(CheckoutContext::new("client-1", "product-1", 10_000, now))
    }

    fn coupon() -> Coupon {
        Coupon::new(
            "c1",
            "SAVE10",
            Discount::Percent {
                percent_off: Decimal::from(10),
            },
        )
    }

    #[test]
    fn admits_unrestricted_coupon() -> TestResult {
        assert_eq!(evaluate(&coupon(), &ctx()?), Ok(()));

        Ok(())
    }

    #[test]
    fn rejects_disabled() -> TestResult {
        let result = evaluate(&coupon().disabled(), &ctx()?);

        assert_eq!(result, Err(RejectionReason::Disabled));

        Ok(())
    }

    #[test]
    fn window_bounds_are_inclusive() -> TestResult {
        let ctx = ctx()?;
        let coupon = coupon().with_window(Some(ctx.now), Some(ctx.now));

        assert_eq!(evaluate(&coupon, &ctx), Ok(()));

        Ok(())
    }

    #[test]
    fn rejects_not_started_before_expired() -> TestResult {
        let ctx = ctx()?;
        let future: Timestamp = "2026-12-01T00:00:00Z".parse()?;
        let coupon = coupon().with_window(Some(future), None);

        assert_eq!(evaluate(&coupon, &ctx), Err(RejectionReason::NotStarted));

        Ok(())
    }

    #[test]
    fn rejects_expired() -> TestResult {
        let ctx = ctx()?;
        let past: Timestamp = "2026-01-01T00:00:00Z".parse()?;
        let coupon = coupon().with_window(None, Some(past));

        assert_eq!(evaluate(&coupon, &ctx), Err(RejectionReason::Expired));

        Ok(())
    }

    #[test]
    fn rejects_exhausted_limit_optimistically() -> TestResult {
        let mut coupon = coupon().with_max_redemptions(5);
        coupon.redeemed_count = 5;

        assert_eq!(evaluate(&coupon, &ctx()?), Err(RejectionReason::LimitReached));

        Ok(())
    }

    #[test]
    fn rejects_unassigned_client() -> TestResult {
        let coupon = coupon().for_clients([ClientId::new("someone-else")]);

        assert_eq!(
            evaluate(&coupon, &ctx()?),
            Err(RejectionReason::NotEligibleForClient)
        );

        Ok(())
    }

    #[test]
    fn admits_assigned_client() -> TestResult {
        let coupon = coupon().for_clients([ClientId::new("client-1")]);

        assert_eq!(evaluate(&coupon, &ctx()?), Ok(()));

        Ok(())
    }

    #[test]
    fn rejects_other_product() -> TestResult {
        let coupon = coupon().for_products([ProductId::new("other-product")]);

        assert_eq!(
            evaluate(&coupon, &ctx()?),
            Err(RejectionReason::NotEligibleForProduct)
        );

        Ok(())
    }

    #[test]
    fn rejects_below_minimum_purchase() -> TestResult {
        let coupon = coupon().with_min_subtotal(20_000);

        assert_eq!(
            evaluate(&coupon, &ctx()?),
            Err(RejectionReason::BelowMinimumPurchase)
        );

        Ok(())
    }

    #[test]
    fn minimum_purchase_is_inclusive() -> TestResult {
        let coupon = coupon().with_min_subtotal(10_000);

        assert_eq!(evaluate(&coupon, &ctx()?), Ok(()));

        Ok(())
    }

    #[test]
    fn rejects_first_time_only_for_returning_client() -> TestResult {
        let coupon = coupon().first_time_only();

        assert_eq!(evaluate(&coupon, &ctx()?), Err(RejectionReason::FirstTimeOnly));
        assert_eq!(evaluate(&coupon, &ctx()?.first_purchase()), Ok(()));

        Ok(())
    }
}
