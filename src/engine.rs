//! Checkout engine

use jiff::Timestamp;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::debug;

use crate::{
    catalog::Catalog,
    checkout::CheckoutContext,
    coupons::CouponCode,
    eligibility::{self, RejectionReason},
    events::{EngineObserver, NoopObserver},
    ledger::{LedgerError, OrderId, Redemption, RedemptionLedger},
    pricing::{self, Quote, RejectedCode},
    stacking::{self, Candidate},
    stats::{self, CatalogStats},
};

/// Errors from [`CouponEngine::try_redeem`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RedeemError {
    /// No coupon survived eligibility and resolution, so there is nothing
    /// to record. The caller should complete the order without a redemption.
    #[error("no applicable coupons to redeem")]
    NothingToRedeem,

    /// Ledger failure; [`LedgerError::is_retryable`] distinguishes the
    /// re-quote case from storage trouble.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The coupon engine: quotes, redemptions and voids over a catalog and a
/// redemption ledger.
///
/// Quoting is pure and may run with unbounded parallelism; only
/// [`try_redeem`](Self::try_redeem) and [`void`](Self::void) mutate state,
/// and both delegate their atomicity to the ledger.
#[derive(Debug)]
pub struct CouponEngine<S, O = NoopObserver> {
    store: S,
    observer: O,
}

impl<S> CouponEngine<S>
where
    S: Catalog + RedemptionLedger,
{
    /// Creates an engine over the given store with no observer.
    pub fn new(store: S) -> Self {
        Self {
            store,
            observer: NoopObserver,
        }
    }
}

impl<S, O> CouponEngine<S, O>
where
    S: Catalog + RedemptionLedger,
    O: EngineObserver,
{
    /// Creates an engine that notifies `observer` of ledger mutations.
    pub fn with_observer(store: S, observer: O) -> Self {
        Self { store, observer }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The attached observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Prices a checkout against the entered coupon codes, with no side
    /// effects.
    ///
    /// Unknown and ineligible explicit codes are reported per-code in
    /// [`Quote::rejected_codes`]; quoting never fails on catalog content —
    /// at worst the quote carries zero discount. Duplicate codes are
    /// considered once.
    #[tracing::instrument(
        skip(self, ctx, codes),
        fields(product = %ctx.product_id, subtotal = ctx.subtotal_cents)
    )]
    pub fn quote(&self, ctx: &CheckoutContext, codes: &[CouponCode]) -> Quote {
        let mut rejected: Vec<RejectedCode> = Vec::new();
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut seen: FxHashSet<CouponCode> = FxHashSet::default();

        for code in codes {
            if !seen.insert(code.clone()) {
                continue;
            }

            let Some(coupon) = self.store.coupon_by_code(code) else {
                rejected.push(RejectedCode {
                    code: code.clone(),
                    reason: RejectionReason::Unknown,
                });
                continue;
            };

            match eligibility::evaluate(&coupon, ctx) {
                Ok(()) => candidates.push(Candidate::explicit(coupon)),
                Err(reason) => {
                    debug!(code = %code, %reason, "explicit code rejected");
                    rejected.push(RejectedCode {
                        code: code.clone(),
                        reason,
                    });
                }
            }
        }

        let resolution = stacking::resolve(candidates, ctx.subtotal_cents);

        for (code, reason) in resolution.conflicts {
            rejected.push(RejectedCode { code, reason });
        }

        let priced = pricing::price_stack(&resolution.selected, ctx.subtotal_cents);

        Quote {
            subtotal_cents: ctx.subtotal_cents,
            final_price_cents: priced.final_price_cents,
            breakdown: priced.breakdown,
            rejected_codes: rejected,
        }
    }

    /// Quotes every enabled public coupon on its own and returns the one
    /// with the lowest final price, mirroring the storefront's automatic
    /// best-deal pass. Quotes that save nothing are skipped; ties go to the
    /// lexicographically smallest code for determinism.
    pub fn best_single(&self, ctx: &CheckoutContext) -> Option<Quote> {
        let mut coupons: Vec<_> = self
            .store
            .coupons()
            .into_iter()
            .filter(|coupon| coupon.enabled && coupon.is_public)
            .collect();

        coupons.sort_by(|a, b| a.code.cmp(&b.code));

        let mut best: Option<Quote> = None;

        for coupon in coupons {
            let quote = self.quote(ctx, std::slice::from_ref(&coupon.code));

            if quote.total_discount_cents() <= 0 {
                continue;
            }

            if best
                .as_ref()
                .is_none_or(|current| quote.final_price_cents < current.final_price_cents)
            {
                best = Some(quote);
            }
        }

        best
    }

    /// Re-quotes the checkout and records the redemption for `order_id`.
    ///
    /// Idempotent per order id: a retry returns the original record without
    /// touching any counter. The resolved set is redeemed all-or-nothing;
    /// a [`LedgerError::Conflict`] means a limit was reached between quote
    /// and redeem, and the caller should re-quote.
    ///
    /// # Errors
    ///
    /// - [`RedeemError::NothingToRedeem`] when no coupon survives
    ///   resolution.
    /// - [`RedeemError::Ledger`] on conflict or storage failure.
    #[tracing::instrument(skip(self, ctx, codes), fields(order_id = %order_id))]
    pub fn try_redeem(
        &self,
        order_id: &OrderId,
        ctx: &CheckoutContext,
        codes: &[CouponCode],
    ) -> Result<Redemption, RedeemError> {
        if let Some(existing) = self.store.redemption(order_id) {
            return Ok(existing);
        }

        let quote = self.quote(ctx, codes);

        if quote.breakdown.is_empty() {
            // A limit reached between the caller's quote and this one is a
            // conflict, not an empty order: the loser of a race must get the
            // retryable error the ledger would have reported.
            if let Some(rejected) = quote
                .rejected_codes
                .iter()
                .find(|rejected| rejected.reason == RejectionReason::LimitReached)
            {
                return Err(RedeemError::Ledger(LedgerError::Conflict {
                    code: rejected.code.clone(),
                }));
            }

            return Err(RedeemError::NothingToRedeem);
        }

        let redemption = self.store.try_redeem(order_id, &quote.breakdown, ctx.now)?;

        self.observer.on_redeemed(&redemption);

        Ok(redemption)
    }

    /// Voids the redemption recorded for `order_id`, restoring each involved
    /// coupon's counters. Idempotent; unknown order ids are a no-op success.
    /// The observer is notified only when a redemption actually changed
    /// state, never for replays.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] only on storage failure.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub fn void(&self, order_id: &OrderId) -> Result<(), LedgerError> {
        if self.store.void(order_id)? {
            self.observer.on_voided(order_id);
        }

        Ok(())
    }

    /// Aggregates the catalog snapshot into dashboard counters.
    pub fn stats(&self, now: Timestamp) -> CatalogStats {
        let snapshot = self.store.coupons();

        stats::aggregate(&snapshot, now)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::{
        coupons::{Coupon, Discount},
        store::InMemoryStore,
    };

    use super::*;

    fn percent(id: &str, code: &str, points: i64) -> Coupon {
        Coupon::new(id, code, Discount::Percent {
            percent_off: Decimal::from(points),
        })
    }

    fn fixed(id: &str, code: &str, cents: i64) -> Coupon {
        Coupon::new(id, code, Discount::Fixed {
            amount_off_cents: cents,
        })
    }

    fn ctx() -> TestResult<CheckoutContext> {
        let now = "2026-06-01T00:00:00Z".parse()?;

        Ok(CheckoutContext::new("client-1", "product-1", 10_000, now))
    }

    fn codes(codes: &[&str]) -> Vec<CouponCode> {
        codes.iter().map(CouponCode::new).collect()
    }

    #[test]
    fn quote_reports_unknown_codes() -> TestResult {
        let engine = CouponEngine::new(InMemoryStore::new());

        let quote = engine.quote(&ctx()?, &codes(&["NOPE"]));

        assert_eq!(quote.final_price_cents, 10_000);
        assert_eq!(
            quote.rejected_codes,
            [RejectedCode {
                code: CouponCode::new("NOPE"),
                reason: RejectionReason::Unknown,
            }]
        );

        Ok(())
    }

    #[test]
    fn quote_ignores_duplicate_codes() -> TestResult {
        let store = InMemoryStore::with_coupons([percent("c1", "SAVE10", 10)])?;
        let engine = CouponEngine::new(store);

        let quote = engine.quote(&ctx()?, &codes(&["SAVE10", "save10", " Save10 "]));

        assert_eq!(quote.breakdown.len(), 1);
        assert_eq!(quote.final_price_cents, 9_000);
        assert!(quote.rejected_codes.is_empty());

        Ok(())
    }

    #[test]
    fn quote_is_entirely_repeatable() -> TestResult {
        let store = InMemoryStore::with_coupons([
            percent("c1", "SAVE10", 10),
            fixed("c2", "FLAT500", 500).with_stack_group("amount"),
        ])?;
        let engine = CouponEngine::new(store);
        let ctx = ctx()?;
        let entered = codes(&["SAVE10", "FLAT500"]);

        assert_eq!(engine.quote(&ctx, &entered), engine.quote(&ctx, &entered));

        Ok(())
    }

    #[test]
    fn best_single_prefers_lowest_final_price() -> TestResult {
        let store = InMemoryStore::with_coupons([
            percent("c1", "SAVE10", 10).public(),
            fixed("c2", "FLAT1500", 1_500).public(),
            percent("c3", "HIDDEN50", 50), // private: not auto-applied
        ])?;
        let engine = CouponEngine::new(store);

        let best = engine.best_single(&ctx()?).expect("a deal should be found");

        assert_eq!(best.final_price_cents, 8_500);
        assert_eq!(best.breakdown.len(), 1);
        assert_eq!(best.breakdown[0].code, CouponCode::new("FLAT1500"));

        Ok(())
    }

    #[test]
    fn best_single_skips_zero_savings() -> TestResult {
        let store = InMemoryStore::with_coupons([percent("c1", "ZERO", 0).public()])?;
        let engine = CouponEngine::new(store);

        assert_eq!(engine.best_single(&ctx()?), None);

        Ok(())
    }

    #[test]
    fn try_redeem_requires_a_resolved_coupon() -> TestResult {
        let engine = CouponEngine::new(InMemoryStore::new());

        let result = engine.try_redeem(&OrderId::new("order-1"), &ctx()?, &codes(&["NOPE"]));

        assert_eq!(result, Err(RedeemError::NothingToRedeem));

        Ok(())
    }

    #[test]
    fn try_redeem_records_and_bumps_counters() -> TestResult {
        let store = InMemoryStore::with_coupons([percent("c1", "SAVE10", 10)])?;
        let engine = CouponEngine::new(store);

        let redemption =
            engine.try_redeem(&OrderId::new("order-1"), &ctx()?, &codes(&["SAVE10"]))?;

        assert_eq!(redemption.discount_cents(), 1_000);

        let coupon = engine
            .store()
            .coupon_by_code(&CouponCode::new("SAVE10"))
            .expect("coupon should exist");

        assert_eq!(coupon.redeemed_count, 1);
        assert_eq!(coupon.total_savings_cents, 1_000);

        Ok(())
    }
}
