//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::round_money;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType { Percentage, Fixed }

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = super::order::UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(super::order::UnknownVariant(other.to_string())),
        }
    }
}

/// Why a coupon cannot be used right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection { Inactive, NotYetValid, Expired, UsageLimitReached, BelowMinimum(Decimal) }

impl std::error::Error for CouponRejection {}
impl std::fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "coupon is not active"),
            Self::NotYetValid => write!(f, "coupon is not valid yet"),
            Self::Expired => write!(f, "coupon has expired"),
            Self::UsageLimitReached => write!(f, "coupon usage limit reached"),
            Self::BelowMinimum(min) => write!(f, "order must be at least {min} to use this coupon"),
        }
    }
}

/// Codes are matched case-insensitively and stored upper-cased.
pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

impl Coupon {
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active { return Err(CouponRejection::Inactive); }
        if now < self.valid_from { return Err(CouponRejection::NotYetValid); }
        if now > self.valid_until { return Err(CouponRejection::Expired); }
        if let Some(limit) = self.usage_limit {
            if self.used_count >= limit { return Err(CouponRejection::UsageLimitReached); }
        }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal` in cents, never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: Decimal) -> Result<Decimal, CouponRejection> {
        if let Some(min) = self.min_order_amount {
            if subtotal < min { return Err(CouponRejection::BelowMinimum(min)); }
        }
        let amount = match self.discount_type {
            DiscountType::Percentage => subtotal * self.discount_value.min(Decimal::ONE_HUNDRED) / Decimal::ONE_HUNDRED,
            DiscountType::Fixed => self.discount_value,
        };
        Ok(round_money(amount).max(Decimal::ZERO).min(subtotal))
    }
}
