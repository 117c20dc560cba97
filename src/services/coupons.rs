//! Coupon lookup and quoting.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{normalize_code, Coupon, DiscountType};
use crate::error::{EcommerceError, Result};
use crate::store::CouponRepository;

#[derive(Clone, Debug, Deserialize)]
pub struct CouponQuery {
    pub code: String,
    pub subtotal: Option<Decimal>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CouponQuote {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Present when a subtotal was supplied.
    pub discount: Option<Decimal>,
}

/// Finds an applicable coupon and the discount it grants on `subtotal`.
/// Failures are reported against the `coupon_code` field.
pub async fn resolve<S>(store: &S, code: &str, subtotal: Decimal) -> Result<(Coupon, Decimal)>
where
    S: CouponRepository,
{
    let coupon = applicable(store, code).await?;
    let discount = coupon
        .discount_for(subtotal)
        .map_err(|rejection| EcommerceError::invalid("coupon_code", rejection.to_string()))?;
    Ok((coupon, discount))
}

pub async fn quote<S>(store: &S, query: CouponQuery) -> Result<CouponQuote>
where
    S: CouponRepository,
{
    let (coupon, discount) = match query.subtotal {
        Some(subtotal) if subtotal < Decimal::ZERO => {
            return Err(EcommerceError::invalid("subtotal", "must not be negative"));
        }
        Some(subtotal) => {
            let (coupon, discount) = resolve(store, &query.code, subtotal).await?;
            (coupon, Some(discount))
        }
        None => (applicable(store, &query.code).await?, None),
    };
    Ok(CouponQuote {
        code: coupon.code,
        discount_type: coupon.discount_type,
        discount_value: coupon.discount_value,
        discount,
    })
}

async fn applicable<S>(store: &S, code: &str) -> Result<Coupon>
where
    S: CouponRepository,
{
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(EcommerceError::invalid("coupon_code", "enter a coupon code"));
    }
    let coupon = store
        .find_coupon(&code)
        .await?
        .ok_or_else(|| EcommerceError::invalid("coupon_code", "coupon not found"))?;
    coupon
        .check(Utc::now())
        .map_err(|rejection| EcommerceError::invalid("coupon_code", rejection.to_string()))?;
    Ok(coupon)
}
