//! Vouch
//!
//! Vouch is a deterministic coupon stacking and redemption engine: eligibility
//! filtering, conflict-free stack resolution, cent-exact discount computation,
//! and a redemption ledger that never exceeds a coupon's usage limit — even
//! when concurrent checkouts race for the last remaining slot.

pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod eligibility;
pub mod engine;
pub mod events;
pub mod fixtures;
pub mod ledger;
pub mod prelude;
pub mod pricing;
pub mod stacking;
pub mod stats;
pub mod store;
