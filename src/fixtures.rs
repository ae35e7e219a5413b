//! Catalog fixtures
//!
//! YAML catalogs for tests and the demo binary. The fixture shape is looser
//! than [`Coupon`] — optional fields default to what an admin-created coupon
//! starts with — and conversion validates everything on the way in.

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    coupons::{Coupon, CouponCategory, CouponError},
    store::InMemoryStore,
};

/// Errors raised while loading a catalog fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// YAML parse failure.
    #[error(transparent)]
    Yaml(#[from] serde_norway::Error),

    /// A coupon must carry exactly one of `percent_off` / `amount_off_cents`.
    #[error("coupon {code}: exactly one of percent_off or amount_off_cents must be set")]
    DiscountShape {
        /// Code of the offending coupon.
        code: String,
    },

    /// A parsed coupon failed validation.
    #[error("coupon {code}: {source}")]
    InvalidCoupon {
        /// Code of the offending coupon.
        code: String,

        /// The underlying validation error.
        #[source]
        source: CouponError,
    },
}

/// Catalog file shape: a list of coupons.
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Coupon fixtures in file order.
    pub coupons: Vec<CouponFixture>,
}

/// One coupon as written in YAML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CouponFixture {
    /// Stable id; defaults to the code.
    pub id: Option<String>,

    /// Coupon code.
    pub code: String,

    /// Percentage points off; mutually exclusive with `amount_off_cents`.
    pub percent_off: Option<Decimal>,

    /// Fixed cents off; mutually exclusive with `percent_off`.
    pub amount_off_cents: Option<i64>,

    /// Product ids the coupon applies to; omitted means all.
    pub applies_to: Option<Vec<String>>,

    /// Client ids the coupon is assigned to; omitted means all.
    pub assigned_to: Option<Vec<String>>,

    /// Whether the coupon is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether the coupon may combine with others.
    #[serde(default = "default_true")]
    pub stackable: bool,

    /// Stack group label.
    pub stack_group: Option<String>,

    /// Resolution priority.
    #[serde(default)]
    pub priority: i32,

    /// Minimum subtotal in cents.
    pub min_subtotal_cents: Option<i64>,

    /// Cap on the deductible cents.
    pub max_discount_cents: Option<i64>,

    /// Restricted to first purchases.
    #[serde(default)]
    pub first_time_only: bool,

    /// Inclusive window start.
    pub starts_at: Option<Timestamp>,

    /// Inclusive window end.
    pub ends_at: Option<Timestamp>,

    /// Redemption limit.
    pub max_redemptions: Option<u32>,

    /// Redemptions already recorded.
    #[serde(default)]
    pub redeemed_count: u32,

    /// Cents already saved.
    #[serde(default)]
    pub total_savings_cents: i64,

    /// Admin-facing category.
    #[serde(default)]
    pub category: CouponCategory,

    /// Free-text annotation.
    pub note: Option<String>,

    /// Participates in automatic best-deal selection.
    #[serde(default)]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<CouponFixture> for Coupon {
    type Error = FixtureError;

    fn try_from(fixture: CouponFixture) -> Result<Self, Self::Error> {
        use crate::coupons::Discount;

        let discount = match (fixture.percent_off, fixture.amount_off_cents) {
            (Some(percent_off), None) => Discount::Percent { percent_off },
            (None, Some(amount_off_cents)) => Discount::Fixed { amount_off_cents },
            _ => {
                return Err(FixtureError::DiscountShape {
                    code: fixture.code,
                });
            }
        };

        let id = fixture.id.unwrap_or_else(|| fixture.code.clone());

        let mut coupon = Coupon::new(id, &fixture.code, discount);

        if let Some(products) = fixture.applies_to {
            coupon = coupon.for_products(products.into_iter().map(crate::coupons::ProductId::new));
        }

        if let Some(clients) = fixture.assigned_to {
            coupon = coupon.for_clients(clients.into_iter().map(crate::coupons::ClientId::new));
        }

        coupon.enabled = fixture.enabled;
        coupon.stackable = fixture.stackable;
        coupon.stack_group = fixture.stack_group;
        coupon.priority = fixture.priority;
        coupon.min_subtotal_cents = fixture.min_subtotal_cents;
        coupon.max_discount_cents = fixture.max_discount_cents;
        coupon.first_time_only = fixture.first_time_only;
        coupon.starts_at = fixture.starts_at;
        coupon.ends_at = fixture.ends_at;
        coupon.max_redemptions = fixture.max_redemptions;
        coupon.redeemed_count = fixture.redeemed_count;
        coupon.total_savings_cents = fixture.total_savings_cents;
        coupon.category = fixture.category;
        coupon.note = fixture.note;
        coupon.is_public = fixture.is_public;

        coupon.validate().map_err(|source| FixtureError::InvalidCoupon {
            code: fixture.code,
            source,
        })?;

        Ok(coupon)
    }
}

/// Parses a YAML catalog into validated coupons, preserving file order.
///
/// # Errors
///
/// Returns a [`FixtureError`] on YAML syntax errors, an ambiguous discount
/// shape, or a coupon failing validation.
pub fn catalog_from_yaml(yaml: &str) -> Result<Vec<Coupon>, FixtureError> {
    let fixture: CatalogFixture = serde_norway::from_str(yaml)?;

    fixture
        .coupons
        .into_iter()
        .map(Coupon::try_from)
        .collect()
}

/// Parses a YAML catalog straight into an [`InMemoryStore`].
///
/// # Errors
///
/// Returns a [`FixtureError`] as [`catalog_from_yaml`] does, plus
/// [`FixtureError::InvalidCoupon`] for duplicate codes.
pub fn store_from_yaml(yaml: &str) -> Result<InMemoryStore, FixtureError> {
    let coupons = catalog_from_yaml(yaml)?;
    let store = InMemoryStore::new();

    for coupon in coupons {
        let code = coupon.code.to_string();

        store
            .insert(coupon)
            .map_err(|source| FixtureError::InvalidCoupon { code, source })?;
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::coupons::{Applicability, CouponCode, Discount, ProductId};

    use super::*;

    const CATALOG: &str = r"
coupons:
  - code: SAVE10
    percent_off: 10
    priority: 10
    is_public: true
  - code: FLAT500
    amount_off_cents: 500
    stack_group: amount
    priority: 5
    category: seasonal
  - code: LAUNCH
    percent_off: 25
    applies_to: [product-1]
    starts_at: 2026-01-01T00:00:00Z
    ends_at: 2026-12-31T23:59:59Z
    max_redemptions: 100
";

    #[test]
    fn parses_a_full_catalog() -> TestResult {
        let coupons = catalog_from_yaml(CATALOG)?;

        assert_eq!(coupons.len(), 3);

        let save10 = &coupons[0];
        assert_eq!(save10.code, CouponCode::new("SAVE10"));
        assert_eq!(save10.priority, 10);
        assert!(save10.is_public);
        assert!(save10.stackable);

        let launch = &coupons[2];
        assert_eq!(
            launch.applies_to,
            Applicability::ProductIds([ProductId::new("product-1")].into_iter().collect())
        );
        assert_eq!(launch.max_redemptions, Some(100));

        Ok(())
    }

    #[test]
    fn id_defaults_to_code() -> TestResult {
        let coupons = catalog_from_yaml("coupons:\n  - code: SAVE10\n    percent_off: 10\n")?;

        assert_eq!(coupons[0].id.as_str(), "SAVE10");

        Ok(())
    }

    #[test]
    fn rejects_both_discount_shapes() {
        let yaml = "coupons:\n  - code: BAD\n    percent_off: 10\n    amount_off_cents: 500\n";

        assert!(matches!(
            catalog_from_yaml(yaml),
            Err(FixtureError::DiscountShape { code }) if code == "BAD"
        ));
    }

    #[test]
    fn rejects_missing_discount() {
        let yaml = "coupons:\n  - code: BAD\n";

        assert!(matches!(
            catalog_from_yaml(yaml),
            Err(FixtureError::DiscountShape { code }) if code == "BAD"
        ));
    }

    #[test]
    fn rejects_invalid_percent() {
        let yaml = "coupons:\n  - code: BAD\n    percent_off: 250\n";

        assert!(matches!(
            catalog_from_yaml(yaml),
            Err(FixtureError::InvalidCoupon { code, .. }) if code == "BAD"
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "coupons:\n  - code: BAD\n    percent_off: 10\n    discount_kind: mystery\n";

        assert!(matches!(catalog_from_yaml(yaml), Err(FixtureError::Yaml(_))));
    }

    #[test]
    fn store_rejects_duplicate_codes() {
        let yaml = "coupons:\n  - code: DUP\n    percent_off: 10\n  - id: other\n    code: dup\n    amount_off_cents: 100\n";

        assert!(matches!(
            store_from_yaml(yaml),
            Err(FixtureError::InvalidCoupon { .. })
        ));
    }

    #[test]
    fn fixed_discount_parses() -> TestResult {
        let coupons = catalog_from_yaml(CATALOG)?;

        assert_eq!(coupons[1].discount, Discount::Fixed {
            amount_off_cents: 500,
        });

        Ok(())
    }
}
