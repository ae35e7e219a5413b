//! Pricing

use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::ToPrimitive,
};
use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    coupons::{Coupon, CouponCode, CouponId, Discount},
    eligibility::RejectionReason,
};

/// One applied coupon's contribution to a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownLine {
    /// Coupon that produced this deduction.
    pub coupon_id: CouponId,

    /// The coupon's code.
    pub code: CouponCode,

    /// Cents deducted by this coupon.
    pub deduct_cents: i64,
}

/// An explicitly entered code the engine could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCode {
    /// The entered code, normalised.
    pub code: CouponCode,

    /// Why it was not applied.
    pub reason: RejectionReason,
}

/// A priced checkout: no side effects, safe to recompute at will.
///
/// For a fixed catalog and `now`, quoting is bit-identical across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Pre-discount subtotal in cents.
    pub subtotal_cents: i64,

    /// Price after all deductions, never negative.
    pub final_price_cents: i64,

    /// Per-coupon deductions in application order.
    pub breakdown: SmallVec<[BreakdownLine; 4]>,

    /// Explicit codes that could not be applied, with per-code reasons.
    pub rejected_codes: Vec<RejectedCode>,
}

impl Quote {
    /// Total cents saved across the breakdown.
    #[must_use]
    pub fn total_discount_cents(&self) -> i64 {
        self.breakdown.iter().map(|line| line.deduct_cents).sum()
    }
}

/// A resolved stack applied to a subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedStack {
    /// Price after all deductions, never negative.
    pub final_price_cents: i64,

    /// Per-coupon deductions in application order.
    pub breakdown: SmallVec<[BreakdownLine; 4]>,
}

/// Computes the deduction a single coupon takes from a remaining balance.
///
/// Fixed discounts deduct `min(amount, remaining)`. Percentage discounts
/// deduct `floor(remaining * percent / 100)` — rounded toward zero, in the
/// merchant's favour, so repeated quoting can never mint dust cents. The
/// coupon's own `max_discount_cents` cap is applied last.
#[must_use]
pub fn deduction(coupon: &Coupon, remaining_cents: i64) -> i64 {
    let raw = match &coupon.discount {
        Discount::Fixed { amount_off_cents } => (*amount_off_cents).min(remaining_cents),
        Discount::Percent { percent_off } => percent_of(remaining_cents, *percent_off),
    };

    let capped = coupon.max_discount_cents.map_or(raw, |cap| raw.min(cap));

    capped.clamp(0, remaining_cents.max(0))
}

/// Applies a resolved, priority-ordered stack sequentially against the
/// subtotal.
///
/// Each coupon deducts from the balance left by the ones before it. The
/// final price is floor-clamped at zero; per-step clamps in [`deduction`]
/// mean the clamp should never fire, but the invariant is cheap to state.
#[must_use]
pub fn price_stack(coupons: &[Coupon], subtotal_cents: i64) -> PricedStack {
    let mut remaining = subtotal_cents.max(0);
    let mut breakdown = SmallVec::new();

    for coupon in coupons {
        let deduct_cents = deduction(coupon, remaining);
        remaining -= deduct_cents;

        breakdown.push(BreakdownLine {
            coupon_id: coupon.id.clone(),
            code: coupon.code.clone(),
            deduct_cents,
        });
    }

    PricedStack {
        final_price_cents: remaining.max(0),
        breakdown,
    }
}

/// Formats a cent amount for display.
///
/// All amounts in this crate are single-currency minor units; USD formatting
/// is a presentation choice for the stats table and demo binary, not a
/// statement about the amounts themselves.
#[must_use]
pub fn format_cents(cents: i64) -> String {
    Money::from_minor(cents, iso::USD).to_string()
}

fn percent_of(cents: i64, percent: Decimal) -> i64 {
    let product = Decimal::from(cents) * percent / Decimal::ONE_HUNDRED;

    product
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_i64()
        .unwrap_or(0)
}
