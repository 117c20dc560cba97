use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::{ApiResponse, ApiResult, AppState, Payload};
use crate::error::EcommerceError;
use crate::middleware::RequireUser;
use crate::services::checkout::{self, CheckoutSubmission};
use crate::services::coupons::{self, CouponQuery, CouponQuote};
use crate::store::Store;

pub(super) async fn checkout<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    Payload(submission): Payload<CheckoutSubmission>,
) -> Result<impl IntoResponse, EcommerceError> {
    let receipt =
        checkout::checkout(&state.store, &state.notifier, &state.payments, Some(&caller), submission).await?;
    let message = format!("order {} placed", receipt.order.order_number);
    Ok((StatusCode::CREATED, ApiResponse::with_message(message, receipt)))
}

pub(super) async fn validate_coupon<S: Store>(
    State(state): State<AppState<S>>,
    Payload(query): Payload<CouponQuery>,
) -> ApiResult<CouponQuote> {
    Ok(ApiResponse::ok(coupons::quote(&state.store, query).await?))
}
