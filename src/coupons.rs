//! Coupons

use std::fmt;

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a coupon definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CouponError {
    /// Percentage discounts must stay within `[0, 100]`.
    #[error("percent_off must be between 0 and 100, got {0}")]
    PercentOutOfRange(Decimal),

    /// A cent amount that must be non-negative was negative.
    #[error("{field} must be non-negative, got {value}")]
    NegativeAmount {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// `max_redemptions` must be at least 1 when set.
    #[error("max_redemptions must be at least 1 when set")]
    ZeroRedemptionLimit,

    /// The eligibility window ends before it starts.
    #[error("eligibility window ends ({ends_at}) before it starts ({starts_at})")]
    InvertedWindow {
        /// Start of the window.
        starts_at: Timestamp,
        /// End of the window.
        ends_at: Timestamp,
    },

    /// Coupon codes must be non-empty.
    #[error("coupon code must not be empty")]
    EmptyCode,

    /// Another coupon already owns this code (codes are unique
    /// case-insensitively).
    #[error("coupon code {0} already exists")]
    DuplicateCode(CouponCode),
}

/// Opaque coupon identifier, owned by the external catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CouponId(String);

impl CouponId {
    /// Creates a coupon id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CouponId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A coupon code as entered by a customer.
///
/// Codes are unique case-insensitively, so the code is normalised to ASCII
/// uppercase (and trimmed) at construction. `save10`, ` SAVE10 ` and `Save10`
/// all name the same coupon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
#[serde(into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    /// Creates a normalised coupon code.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// The normalised code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code is empty after normalisation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for CouponCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client identifier from the checkout collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a client id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Product identifier from the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a coupon's discount amount is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discount {
    /// Deduct a percentage of the remaining balance.
    Percent {
        /// Percentage points off, in `[0, 100]`.
        percent_off: Decimal,
    },

    /// Deduct a fixed cent amount (capped at the remaining balance).
    Fixed {
        /// Amount off in cents.
        amount_off_cents: i64,
    },
}

/// Which products a coupon applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    /// Applies to every product.
    All,

    /// Applies only to the listed products.
    ProductIds(FxHashSet<ProductId>),
}

impl Applicability {
    /// Whether the coupon applies to the given product.
    #[must_use]
    pub fn admits(&self, product: &ProductId) -> bool {
        match self {
            Applicability::All => true,
            Applicability::ProductIds(ids) => ids.contains(product),
        }
    }
}

/// Which clients a coupon is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    /// Assigned to every client.
    All,

    /// Assigned only to the listed clients.
    ClientIds(FxHashSet<ClientId>),
}

impl Assignment {
    /// Whether the coupon is assigned to the given client.
    #[must_use]
    pub fn admits(&self, client: &ClientId) -> bool {
        match self {
            Assignment::All => true,
            Assignment::ClientIds(ids) => ids.contains(client),
        }
    }
}

/// Admin-facing coupon classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponCategory {
    /// General promotional coupon.
    Promo,

    /// Partner-distributed coupon.
    Partner,

    /// Loyalty reward.
    Loyalty,

    /// Seasonal campaign.
    Seasonal,

    /// Referral reward.
    Referral,

    /// Anything else.
    #[default]
    Other,
}

/// Lifecycle status derived from a coupon definition and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    /// Manually disabled.
    Disabled,

    /// The eligibility window has ended.
    Expired,

    /// The eligibility window has not started yet.
    Scheduled,

    /// Every redemption slot has been consumed.
    LimitReached,

    /// Currently redeemable.
    Active,
}

/// A coupon definition plus its redemption counters.
///
/// Definitions are authored by the (external) admin collaborator; this crate
/// only reads them and mutates `redeemed_count` / `total_savings_cents`
/// through the redemption ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    /// Stable identifier.
    pub id: CouponId,

    /// Case-insensitively unique code.
    pub code: CouponCode,

    /// How the discount amount is computed.
    pub discount: Discount,

    /// Products the coupon applies to.
    pub applies_to: Applicability,

    /// Clients the coupon is assigned to.
    pub assigned_to: Assignment,

    /// Manual on/off switch.
    pub enabled: bool,

    /// Whether the coupon may combine with other coupons.
    pub stackable: bool,

    /// Stack group label; at most one coupon per group applies.
    pub stack_group: Option<String>,

    /// Resolution priority; higher resolves (and applies) first.
    pub priority: i32,

    /// Minimum subtotal in cents for the coupon to apply.
    pub min_subtotal_cents: Option<i64>,

    /// Cap on the cent amount this coupon may deduct in one application.
    pub max_discount_cents: Option<i64>,

    /// Restricted to a client's first purchase.
    pub first_time_only: bool,

    /// Inclusive start of the eligibility window.
    pub starts_at: Option<Timestamp>,

    /// Inclusive end of the eligibility window.
    pub ends_at: Option<Timestamp>,

    /// Total number of redemptions allowed across all orders.
    pub max_redemptions: Option<u32>,

    /// Redemptions recorded so far; never exceeds `max_redemptions`.
    pub redeemed_count: u32,

    /// Cents saved across all recorded redemptions.
    pub total_savings_cents: i64,

    /// Admin-facing classification.
    pub category: CouponCategory,

    /// Free-text annotation.
    pub note: Option<String>,

    /// Public coupons participate in automatic best-deal selection;
    /// private ones must be entered explicitly.
    pub is_public: bool,
}

impl Coupon {
    /// Creates an enabled, stackable, unrestricted coupon.
    ///
    /// The result matches what an admin-created coupon starts as: no window,
    /// no limits, assigned to all clients and products.
    pub fn new(id: impl Into<String>, code: impl AsRef<str>, discount: Discount) -> Self {
        Self {
            id: CouponId::new(id),
            code: CouponCode::new(code),
            discount,
            applies_to: Applicability::All,
            assigned_to: Assignment::All,
            enabled: true,
            stackable: true,
            stack_group: None,
            priority: 0,
            min_subtotal_cents: None,
            max_discount_cents: None,
            first_time_only: false,
            starts_at: None,
            ends_at: None,
            max_redemptions: None,
            redeemed_count: 0,
            total_savings_cents: 0,
            category: CouponCategory::default(),
            note: None,
            is_public: false,
        }
    }

    /// Places the coupon in a stack group.
    #[must_use]
    pub fn with_stack_group(mut self, group: impl Into<String>) -> Self {
        self.stack_group = Some(group.into());
        self
    }

    /// Sets the resolution priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the coupon solo: non-stackable and group-less, so it excludes
    /// every other coupon when selected.
    #[must_use]
    pub fn solo(mut self) -> Self {
        self.stackable = false;
        self.stack_group = None;
        self
    }

    /// Limits the total number of redemptions.
    #[must_use]
    pub fn with_max_redemptions(mut self, max: u32) -> Self {
        self.max_redemptions = Some(max);
        self
    }

    /// Sets the eligibility window (either bound may be `None` for
    /// unbounded).
    #[must_use]
    pub fn with_window(mut self, starts_at: Option<Timestamp>, ends_at: Option<Timestamp>) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }

    /// Requires a minimum subtotal.
    #[must_use]
    pub fn with_min_subtotal(mut self, cents: i64) -> Self {
        self.min_subtotal_cents = Some(cents);
        self
    }

    /// Caps the deductible amount.
    #[must_use]
    pub fn with_max_discount(mut self, cents: i64) -> Self {
        self.max_discount_cents = Some(cents);
        self
    }

    /// Restricts to first purchases.
    #[must_use]
    pub fn first_time_only(mut self) -> Self {
        self.first_time_only = true;
        self
    }

    /// Restricts the coupon to specific products.
    #[must_use]
    pub fn for_products<I: IntoIterator<Item = ProductId>>(mut self, products: I) -> Self {
        self.applies_to = Applicability::ProductIds(products.into_iter().collect());
        self
    }

    /// Restricts the coupon to specific clients.
    #[must_use]
    pub fn for_clients<I: IntoIterator<Item = ClientId>>(mut self, clients: I) -> Self {
        self.assigned_to = Assignment::ClientIds(clients.into_iter().collect());
        self
    }

    /// Marks the coupon public (eligible for automatic best-deal selection).
    #[must_use]
    pub fn public(mut self) -> Self {
        self.is_public = true;
        self
    }

    /// Disables the coupon.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Sets the admin-facing category.
    #[must_use]
    pub fn with_category(mut self, category: CouponCategory) -> Self {
        self.category = category;
        self
    }

    /// Validates the definition.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] describing the first constraint violated:
    /// empty code, out-of-range percentage, negative cent amounts, a zero
    /// redemption limit, or an inverted eligibility window.
    pub fn validate(&self) -> Result<(), CouponError> {
        if self.code.is_empty() {
            return Err(CouponError::EmptyCode);
        }

        match &self.discount {
            Discount::Percent { percent_off } => {
                if *percent_off < Decimal::ZERO || *percent_off > Decimal::ONE_HUNDRED {
                    return Err(CouponError::PercentOutOfRange(*percent_off));
                }
            }
            Discount::Fixed { amount_off_cents } => {
                if *amount_off_cents < 0 {
                    return Err(CouponError::NegativeAmount {
                        field: "amount_off_cents",
                        value: *amount_off_cents,
                    });
                }
            }
        }

        for (field, value) in [
            ("min_subtotal_cents", self.min_subtotal_cents),
            ("max_discount_cents", self.max_discount_cents),
        ] {
            if let Some(value) = value
                && value < 0
            {
                return Err(CouponError::NegativeAmount { field, value });
            }
        }

        if self.max_redemptions == Some(0) {
            return Err(CouponError::ZeroRedemptionLimit);
        }

        if let (Some(starts_at), Some(ends_at)) = (self.starts_at, self.ends_at)
            && ends_at < starts_at
        {
            return Err(CouponError::InvertedWindow { starts_at, ends_at });
        }

        Ok(())
    }

    /// Whether the coupon is solo: non-stackable and group-less.
    #[must_use]
    pub fn is_solo(&self) -> bool {
        !self.stackable && self.stack_group.is_none()
    }

    /// Whether every redemption slot has been consumed.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        self.max_redemptions
            .is_some_and(|max| self.redeemed_count >= max)
    }

    /// Derives the lifecycle status at the given instant.
    ///
    /// The window outranks the manual switch: a disabled coupon past its
    /// window reads as expired, since re-enabling it would not bring it back.
    #[must_use]
    pub fn status(&self, now: Timestamp) -> CouponStatus {
        if self.ends_at.is_some_and(|ends_at| ends_at < now) {
            return CouponStatus::Expired;
        }

        if self.starts_at.is_some_and(|starts_at| now < starts_at) {
            return CouponStatus::Scheduled;
        }

        if !self.enabled {
            return CouponStatus::Disabled;
        }

        if self.limit_reached() {
            return CouponStatus::LimitReached;
        }

        CouponStatus::Active
    }
}
