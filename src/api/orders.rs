use axum::extract::State;
use uuid::Uuid;

use super::{ApiResponse, ApiResult, AppState, PathParam, Payload, QueryParams};
use crate::domain::aggregates::{Order, OrderUpdate};
use crate::middleware::{RequireAdmin, RequireUser};
use crate::services::orders::{self, OrderDetail, OrderQuery};
use crate::store::{Page, Store};

pub(super) async fn list<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    QueryParams(query): QueryParams<OrderQuery>,
) -> ApiResult<Page<Order>> {
    Ok(ApiResponse::ok(orders::list(&state.store, &caller, query).await?))
}

pub(super) async fn get<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<OrderDetail> {
    Ok(ApiResponse::ok(orders::get(&state.store, &caller, id).await?))
}

pub(super) async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(caller): RequireAdmin,
    PathParam(id): PathParam<Uuid>,
    Payload(input): Payload<OrderUpdate>,
) -> ApiResult<OrderDetail> {
    let detail = orders::update(&state.store, &state.notifier, Some(&caller), id, input).await?;
    Ok(ApiResponse::with_message("order updated", detail))
}

pub(super) async fn cancel<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Order> {
    let order = orders::cancel(&state.store, &state.notifier, Some(&caller), id).await?;
    Ok(ApiResponse::with_message("order cancelled", order))
}
