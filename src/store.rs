//! In-memory store

use std::{collections::hash_map::Entry, sync::Arc};

use jiff::Timestamp;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{info, warn};

use crate::{
    catalog::Catalog,
    coupons::{Coupon, CouponCode, CouponError, CouponId},
    ledger::{LedgerError, OrderId, Redemption, RedemptionLedger, RedemptionStatus},
    pricing::BreakdownLine,
};

type CouponCell = Arc<Mutex<Coupon>>;

/// In-memory coupon store and redemption ledger.
///
/// Reference implementation of [`Catalog`] and [`RedemptionLedger`]. Each
/// coupon sits behind its own mutex, so the limit check and counter
/// increment are one atomic unit per coupon without a store-wide lock:
/// cross-order contention is limited to the counters of a shared coupon.
///
/// Lock order is redemptions-then-coupon; no path holds two coupon locks at
/// once, and no path takes a coupon lock while holding the redemptions lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    coupons: RwLock<FxHashMap<CouponId, CouponCell>>,
    code_index: RwLock<FxHashMap<CouponCode, CouponId>>,
    redemptions: Mutex<FxHashMap<OrderId, Redemption>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given coupons.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponError`] raised by validation or a duplicate
    /// code.
    pub fn with_coupons<I: IntoIterator<Item = Coupon>>(coupons: I) -> Result<Self, CouponError> {
        let store = Self::new();

        for coupon in coupons {
            store.insert(coupon)?;
        }

        Ok(store)
    }

    /// Inserts or replaces a coupon.
    ///
    /// Replacing by id keeps the coupon's cell, so in-flight redemptions on
    /// the old definition still resolve against a single consistent coupon.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] if validation fails or another coupon
    /// already owns the (case-insensitive) code.
    pub fn insert(&self, coupon: Coupon) -> Result<(), CouponError> {
        coupon.validate()?;

        let mut code_index = self.code_index.write();
        let mut coupons = self.coupons.write();

        if let Some(owner) = code_index.get(&coupon.code)
            && *owner != coupon.id
        {
            return Err(CouponError::DuplicateCode(coupon.code));
        }

        code_index.insert(coupon.code.clone(), coupon.id.clone());

        match coupons.entry(coupon.id.clone()) {
            Entry::Occupied(entry) => {
                let mut existing = entry.get().lock();

                if existing.code != coupon.code {
                    code_index.remove(&existing.code);
                }

                *existing = coupon;
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(coupon)));
            }
        }

        Ok(())
    }

    fn cell(&self, id: &CouponId) -> Option<CouponCell> {
        self.coupons.read().get(id).cloned()
    }

    /// Rolls back counter increments from a failed or superseded attempt.
    fn rollback(&self, applied: &[(CouponCell, i64)]) {
        for (cell, deduct_cents) in applied {
            let mut coupon = cell.lock();
            coupon.redeemed_count = coupon.redeemed_count.saturating_sub(1);
            coupon.total_savings_cents = (coupon.total_savings_cents - deduct_cents).max(0);
        }
    }
}

impl Catalog for InMemoryStore {
    fn coupon_by_code(&self, code: &CouponCode) -> Option<Coupon> {
        let id = self.code_index.read().get(code).cloned()?;

        self.coupon_by_id(&id)
    }

    fn coupon_by_id(&self, id: &CouponId) -> Option<Coupon> {
        self.cell(id).map(|cell| cell.lock().clone())
    }

    fn coupons(&self) -> Vec<Coupon> {
        let cells: Vec<CouponCell> = self.coupons.read().values().cloned().collect();

        cells.iter().map(|cell| cell.lock().clone()).collect()
    }
}

impl RedemptionLedger for InMemoryStore {
    fn try_redeem(
        &self,
        order_id: &OrderId,
        lines: &[BreakdownLine],
        now: Timestamp,
    ) -> Result<Redemption, LedgerError> {
        if let Some(existing) = self.redemptions.lock().get(order_id) {
            return Ok(existing.clone());
        }

        // Resolve every cell up front so a missing coupon fails before any
        // counter moves.
        let mut cells: Vec<(CouponCell, &BreakdownLine)> = Vec::with_capacity(lines.len());

        for line in lines {
            let cell = self.cell(&line.coupon_id).ok_or(LedgerError::MissingCoupon {
                id: line.coupon_id.clone(),
            })?;

            cells.push((cell, line));
        }

        // Compare-and-increment each coupon under its own lock. On the first
        // conflict, compensate the increments already made by this attempt.
        let mut applied: Vec<(CouponCell, i64)> = Vec::with_capacity(cells.len());

        for (cell, line) in cells {
            let mut coupon = cell.lock();

            if coupon.limit_reached() {
                let code = coupon.code.clone();
                drop(coupon);

                self.rollback(&applied);

                info!(order_id = %order_id, coupon = %code, "redemption conflict, rolled back");

                return Err(LedgerError::Conflict { code });
            }

            coupon.redeemed_count += 1;
            coupon.total_savings_cents += line.deduct_cents;
            drop(coupon);

            applied.push((cell, line.deduct_cents));
        }

        let record = Redemption {
            order_id: order_id.clone(),
            lines: SmallVec::from(lines),
            status: RedemptionStatus::Active,
            created_at: now,
        };

        let existing = match self.redemptions.lock().entry(order_id.clone()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                None
            }
        };

        // Another attempt with the same order id finished first; ours must
        // not count twice.
        if let Some(existing) = existing {
            self.rollback(&applied);

            return Ok(existing);
        }

        info!(
            order_id = %order_id,
            coupons = record.lines.len(),
            discount_cents = record.discount_cents(),
            "recorded redemption"
        );

        Ok(record)
    }

    fn void(&self, order_id: &OrderId) -> Result<bool, LedgerError> {
        let lines = {
            let mut redemptions = self.redemptions.lock();

            match redemptions.get_mut(order_id) {
                None => return Ok(false),
                Some(redemption) if redemption.status == RedemptionStatus::Voided => {
                    return Ok(false);
                }
                Some(redemption) => {
                    redemption.status = RedemptionStatus::Voided;
                    redemption.lines.clone()
                }
            }
        };

        for line in &lines {
            let Some(cell) = self.cell(&line.coupon_id) else {
                // The admin removed the coupon after redemption; there is
                // nothing left to compensate.
                warn!(order_id = %order_id, coupon_id = %line.coupon_id, "voiding against removed coupon");
                continue;
            };

            let mut coupon = cell.lock();
            coupon.redeemed_count = coupon.redeemed_count.saturating_sub(1);
            coupon.total_savings_cents = (coupon.total_savings_cents - line.deduct_cents).max(0);
        }

        info!(order_id = %order_id, "voided redemption");

        Ok(true)
    }

    fn redemption(&self, order_id: &OrderId) -> Option<Redemption> {
        self.redemptions.lock().get(order_id).cloned()
    }
}
