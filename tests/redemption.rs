//! Redemption ledger properties: limit enforcement under concurrency,
//! idempotency, all-or-nothing stacks, and void round-trips.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use testresult::TestResult;

use vouch::prelude::*;

const LIMITED_CATALOG: &str = r"
coupons:
  - code: SAVE10
    percent_off: 10
    max_redemptions: 10
";

fn checkout(subtotal_cents: i64) -> TestResult<CheckoutContext> {
    let now = "2026-06-01T00:00:00Z".parse()?;

    Ok(CheckoutContext::new(
        "client-1",
        "product-1",
        subtotal_cents,
        now,
    ))
}

fn save10() -> Vec<CouponCode> {
    vec![CouponCode::new("SAVE10")]
}

#[test]
fn concurrent_redemptions_never_exceed_the_limit() -> TestResult {
    // 50 threads race for 10 slots; exactly 10 may win.
    let engine = Arc::new(CouponEngine::new(store_from_yaml(LIMITED_CATALOG)?));
    let ctx = checkout(10_000)?;

    let mut successes = 0;
    let mut conflicts = 0;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let ctx = ctx.clone();

                scope.spawn(move || {
                    engine.try_redeem(&OrderId::new(format!("order-{i}")), &ctx, &save10())
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(Ok(_)) => successes += 1,
                Ok(Err(RedeemError::Ledger(LedgerError::Conflict { .. }))) => conflicts += 1,
                Ok(Err(other)) => panic!("unexpected redeem error: {other}"),
                Err(_) => panic!("worker thread panicked"),
            }
        }
    });

    assert_eq!(successes, 10, "exactly the limit may succeed");
    assert_eq!(conflicts, 40, "every loser sees a retryable conflict");

    let coupon = engine
        .store()
        .coupon_by_code(&CouponCode::new("SAVE10"))
        .expect("coupon should exist");

    assert_eq!(coupon.redeemed_count, 10);

    Ok(())
}

#[test]
fn two_checkouts_race_for_the_last_slot() -> TestResult {
    let catalog = r"
coupons:
  - code: LAST1
    percent_off: 10
    max_redemptions: 1
";

    let engine = Arc::new(CouponEngine::new(store_from_yaml(catalog)?));
    let ctx = checkout(10_000)?;
    let code = vec![CouponCode::new("LAST1")];

    let (first, second) = thread::scope(|scope| {
        let a = {
            let engine = Arc::clone(&engine);
            let ctx = ctx.clone();
            let code = code.clone();

            scope.spawn(move || engine.try_redeem(&OrderId::new("order-a"), &ctx, &code))
        };

        let b = {
            let engine = Arc::clone(&engine);
            let ctx = ctx.clone();
            let code = code.clone();

            scope.spawn(move || engine.try_redeem(&OrderId::new("order-b"), &ctx, &code))
        };

        (a.join(), b.join())
    });

    let results = [
        first.expect("thread a should not panic"),
        second.expect("thread b should not panic"),
    ];

    let winners = results.iter().filter(|result| result.is_ok()).count();

    assert_eq!(winners, 1, "exactly one checkout wins the last slot");

    let loser = results
        .iter()
        .find_map(|result| result.as_ref().err())
        .expect("one checkout should lose");

    match loser {
        RedeemError::Ledger(error @ LedgerError::Conflict { .. }) => {
            assert!(error.is_retryable(), "conflicts must be retryable");
        }
        other => panic!("expected a ledger conflict, got {other}"),
    }

    let coupon = engine
        .store()
        .coupon_by_code(&CouponCode::new("LAST1"))
        .expect("coupon should exist");

    assert_eq!(coupon.redeemed_count, 1);

    Ok(())
}

#[test]
fn retrying_an_order_returns_the_original_record() -> TestResult {
    let engine = CouponEngine::new(store_from_yaml(LIMITED_CATALOG)?);
    let ctx = checkout(10_000)?;
    let order = OrderId::new("order-1");

    let first = engine.try_redeem(&order, &ctx, &save10())?;
    let retry = engine.try_redeem(&order, &ctx, &save10())?;

    assert_eq!(first, retry);

    let coupon = engine
        .store()
        .coupon_by_code(&CouponCode::new("SAVE10"))
        .expect("coupon should exist");

    assert_eq!(coupon.redeemed_count, 1, "retries must not double count");

    Ok(())
}

#[test]
fn stacked_redemption_is_all_or_nothing() -> TestResult {
    let catalog = r"
coupons:
  - code: OPEN
    percent_off: 10
    priority: 10
  - code: SCARCE
    amount_off_cents: 500
    max_redemptions: 1
    redeemed_count: 1
";

    // SCARCE is already exhausted, so the eligibility filter would normally
    // drop it; drive the ledger directly to exercise the rollback contract.
    let store = store_from_yaml(catalog)?;

    let open = store
        .coupon_by_code(&CouponCode::new("OPEN"))
        .expect("coupon should exist");
    let scarce = store
        .coupon_by_code(&CouponCode::new("SCARCE"))
        .expect("coupon should exist");

    let lines = [
        BreakdownLine {
            coupon_id: open.id.clone(),
            code: open.code.clone(),
            deduct_cents: 1_000,
        },
        BreakdownLine {
            coupon_id: scarce.id.clone(),
            code: scarce.code.clone(),
            deduct_cents: 500,
        },
    ];

    let now = "2026-06-01T00:00:00Z".parse()?;
    let result = store.try_redeem(&OrderId::new("order-1"), &lines, now);

    assert_eq!(
        result,
        Err(LedgerError::Conflict {
            code: CouponCode::new("SCARCE"),
        })
    );

    // OPEN's increment was rolled back; no half-applied stack is visible.
    let open_after = store
        .coupon_by_code(&CouponCode::new("OPEN"))
        .expect("coupon should exist");

    assert_eq!(open_after.redeemed_count, 0);
    assert_eq!(open_after.total_savings_cents, 0);
    assert_eq!(store.redemption(&OrderId::new("order-1")), None);

    Ok(())
}

#[test]
fn void_round_trip_restores_every_counter() -> TestResult {
    let catalog = r"
coupons:
  - code: SAVE10
    percent_off: 10
    priority: 10
    max_redemptions: 10
  - code: FLAT500
    amount_off_cents: 500
";

    let engine = CouponEngine::new(store_from_yaml(catalog)?);
    let ctx = checkout(10_000)?;
    let order = OrderId::new("order-1");
    let entered = vec![CouponCode::new("SAVE10"), CouponCode::new("FLAT500")];

    let before: Vec<_> = engine.store().coupons();

    engine.try_redeem(&order, &ctx, &entered)?;
    engine.void(&order)?;

    let mut after: Vec<_> = engine.store().coupons();
    let mut before = before;

    before.sort_by(|a, b| a.code.cmp(&b.code));
    after.sort_by(|a, b| a.code.cmp(&b.code));

    assert_eq!(before, after, "void must restore the pre-redemption state");

    let record = engine
        .store()
        .redemption(&order)
        .expect("the audit record must survive the void");

    assert_eq!(record.status, RedemptionStatus::Voided);

    // Voiding again stays a no-op.
    engine.void(&order)?;

    Ok(())
}

#[test]
fn redeeming_nothing_is_an_error_not_a_record() -> TestResult {
    let engine = CouponEngine::new(store_from_yaml(LIMITED_CATALOG)?);
    let ctx = checkout(10_000)?;

    let result = engine.try_redeem(&OrderId::new("order-1"), &ctx, &[]);

    assert_eq!(result, Err(RedeemError::NothingToRedeem));
    assert_eq!(engine.store().redemption(&OrderId::new("order-1")), None);

    Ok(())
}

#[test]
fn observer_sees_redemptions_and_voids() -> TestResult {
    #[derive(Debug, Default)]
    struct Counting {
        redeemed: AtomicUsize,
        voided: AtomicUsize,
    }

    impl EngineObserver for Counting {
        fn on_redeemed(&self, _redemption: &vouch::ledger::Redemption) {
            self.redeemed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_voided(&self, _order_id: &OrderId) {
            self.voided.fetch_add(1, Ordering::SeqCst);
        }
    }

    let engine = CouponEngine::with_observer(store_from_yaml(LIMITED_CATALOG)?, Counting::default());
    let ctx = checkout(10_000)?;
    let order = OrderId::new("order-1");

    engine.try_redeem(&order, &ctx, &save10())?;
    // The idempotent retry returns the existing record without an event.
    engine.try_redeem(&order, &ctx, &save10())?;
    engine.void(&order)?;
    // Neither does a replayed void.
    engine.void(&order)?;

    let observer = engine.observer();

    assert_eq!(observer.redeemed.load(Ordering::SeqCst), 1);
    assert_eq!(observer.voided.load(Ordering::SeqCst), 1);

    Ok(())
}

#[test]
fn losing_the_last_slot_is_a_conflict_not_an_empty_order() -> TestResult {
    let catalog = r"
coupons:
  - code: LAST1
    percent_off: 10
    max_redemptions: 1
";

    let engine = CouponEngine::new(store_from_yaml(catalog)?);
    let ctx = checkout(10_000)?;
    let code = vec![CouponCode::new("LAST1")];

    engine.try_redeem(&OrderId::new("order-a"), &ctx, &code)?;

    // The second order quoted before the first committed; its redeem must
    // surface the retryable conflict, not pretend there was nothing to do.
    let result = engine.try_redeem(&OrderId::new("order-b"), &ctx, &code);

    assert_eq!(
        result,
        Err(RedeemError::Ledger(LedgerError::Conflict {
            code: CouponCode::new("LAST1"),
        }))
    );

    Ok(())
}

#[test]
fn redeem_then_limit_blocks_further_quotes() -> TestResult {
    let catalog = r"
coupons:
  - code: ONCE
    percent_off: 10
    max_redemptions: 1
";

    let engine = CouponEngine::new(store_from_yaml(catalog)?);
    let ctx = checkout(10_000)?;
    let code = vec![CouponCode::new("ONCE")];

    engine.try_redeem(&OrderId::new("order-1"), &ctx, &code)?;

    // A later checkout sees the exhausted coupon rejected at quote time.
    let quote = engine.quote(&ctx, &code);

    assert_eq!(
        quote.rejected_codes,
        [RejectedCode {
            code: CouponCode::new("ONCE"),
            reason: RejectionReason::LimitReached,
        }]
    );
    assert_eq!(quote.final_price_cents, 10_000);

    Ok(())
}
