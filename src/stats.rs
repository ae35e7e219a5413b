//! Catalog statistics

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::{
    coupons::{Coupon, CouponStatus},
    pricing::format_cents,
};

/// Horizon for the expiring-soon bucket.
const EXPIRING_SOON: SignedDuration = SignedDuration::from_hours(7 * 24);

/// Read-only catalog summary for the admin dashboard.
///
/// A pure projection over a catalog snapshot: no state, no write path, no
/// concurrency concerns. Recomputed on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    /// Coupons in the catalog.
    pub total: usize,

    /// Enabled coupons.
    pub enabled: usize,

    /// Manually disabled coupons.
    pub disabled: usize,

    /// Enabled coupons currently redeemable.
    pub active: usize,

    /// Coupons whose window has not started, whether or not enabled.
    pub scheduled: usize,

    /// Coupons whose window has ended, whether or not enabled.
    pub expired: usize,

    /// Active coupons whose window ends within the next seven days.
    pub expiring_soon: usize,

    /// Enabled coupons with every redemption slot consumed.
    pub limit_reached: usize,

    /// Redemptions recorded across the catalog.
    pub total_redemptions: u64,

    /// Cents saved across all recorded redemptions.
    pub total_savings_cents: i64,
}

impl CatalogStats {
    /// Renders the summary as a two-column table for the dashboard.
    #[must_use]
    pub fn render_table(&self) -> String {
        let mut builder = Builder::default();

        let rows: [(&str, String); 10] = [
            ("Coupons", self.total.to_string()),
            ("Enabled", self.enabled.to_string()),
            ("Disabled", self.disabled.to_string()),
            ("Active", self.active.to_string()),
            ("Scheduled", self.scheduled.to_string()),
            ("Expired", self.expired.to_string()),
            ("Expiring within 7 days", self.expiring_soon.to_string()),
            ("Limit reached", self.limit_reached.to_string()),
            ("Redemptions", self.total_redemptions.to_string()),
            ("Total savings", format_cents(self.total_savings_cents)),
        ];

        builder.push_record(["Metric", "Value"]);

        for (metric, value) in rows {
            builder.push_record([metric.to_string(), value]);
        }

        let mut table = builder.build();
        table.with(Style::rounded());

        table.to_string()
    }
}

/// Aggregates a catalog snapshot into dashboard counters.
pub fn aggregate<'a, I>(coupons: I, now: Timestamp) -> CatalogStats
where
    I: IntoIterator<Item = &'a Coupon>,
{
    let expiring_horizon = now.checked_add(EXPIRING_SOON).unwrap_or(Timestamp::MAX);

    let mut stats = CatalogStats::default();

    for coupon in coupons {
        stats.total += 1;
        stats.total_redemptions += u64::from(coupon.redeemed_count);
        stats.total_savings_cents += coupon.total_savings_cents;

        if coupon.enabled {
            stats.enabled += 1;
        } else {
            stats.disabled += 1;
        }

        match coupon.status(now) {
            CouponStatus::Disabled => {}
            CouponStatus::Expired => stats.expired += 1,
            CouponStatus::Scheduled => stats.scheduled += 1,
            CouponStatus::LimitReached => stats.limit_reached += 1,
            CouponStatus::Active => {
                stats.active += 1;

                if coupon
                    .ends_at
                    .is_some_and(|ends_at| ends_at <= expiring_horizon)
                {
                    stats.expiring_soon += 1;
                }
            }
        }
    }

    stats
}
