//! Vouch prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    catalog::Catalog,
    checkout::CheckoutContext,
    coupons::{
        Applicability, Assignment, ClientId, Coupon, CouponCategory, CouponCode, CouponError,
        CouponId, CouponStatus, Discount, ProductId,
    },
    eligibility::RejectionReason,
    engine::{CouponEngine, RedeemError},
    events::{EngineObserver, NoopObserver},
    fixtures::{FixtureError, catalog_from_yaml, store_from_yaml},
    ledger::{LedgerError, OrderId, Redemption, RedemptionLedger, RedemptionStatus},
    pricing::{BreakdownLine, Quote, RejectedCode},
    stacking::{Candidate, Resolution},
    stats::CatalogStats,
    store::InMemoryStore,
};
