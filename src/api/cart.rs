use axum::extract::State;
use uuid::Uuid;

use super::{ApiResponse, ApiResult, AppState, PathParam, Payload};
use crate::domain::aggregates::PricedCart;
use crate::middleware::RequireUser;
use crate::services::cart::{self, AddToCart, SetQuantity};
use crate::store::Store;

pub(super) async fn view<S: Store>(State(state): State<AppState<S>>, RequireUser(caller): RequireUser) -> ApiResult<PricedCart> {
    Ok(ApiResponse::ok(cart::view(&state.store, caller.user_id).await?))
}

pub(super) async fn add_item<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    Payload(input): Payload<AddToCart>,
) -> ApiResult<PricedCart> {
    let priced = cart::add_item(&state.store, caller.user_id, input).await?;
    Ok(ApiResponse::with_message("added to cart", priced))
}

pub(super) async fn set_quantity<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    PathParam(product_id): PathParam<Uuid>,
    Payload(input): Payload<SetQuantity>,
) -> ApiResult<PricedCart> {
    Ok(ApiResponse::ok(cart::set_quantity(&state.store, caller.user_id, product_id, input).await?))
}

pub(super) async fn remove_item<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    PathParam(product_id): PathParam<Uuid>,
) -> ApiResult<PricedCart> {
    let priced = cart::remove_item(&state.store, caller.user_id, product_id).await?;
    Ok(ApiResponse::with_message("removed from cart", priced))
}

pub(super) async fn clear<S: Store>(State(state): State<AppState<S>>, RequireUser(caller): RequireUser) -> ApiResult<()> {
    cart::clear(&state.store, caller.user_id).await?;
    Ok(ApiResponse::message("cart cleared"))
}
