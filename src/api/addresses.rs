use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use super::{ApiResponse, ApiResult, AppState, PathParam, Payload};
use crate::domain::aggregates::{Address, AddressInput};
use crate::error::EcommerceError;
use crate::middleware::RequireUser;
use crate::services::addresses;
use crate::store::Store;

pub(super) async fn list<S: Store>(State(state): State<AppState<S>>, RequireUser(caller): RequireUser) -> ApiResult<Vec<Address>> {
    Ok(ApiResponse::ok(addresses::list(&state.store, caller.user_id).await?))
}

pub(super) async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    Payload(input): Payload<AddressInput>,
) -> Result<impl IntoResponse, EcommerceError> {
    let address = addresses::create(&state.store, caller.user_id, input).await?;
    Ok((StatusCode::CREATED, ApiResponse::with_message("address saved", address)))
}

pub(super) async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<Uuid>,
    Payload(input): Payload<AddressInput>,
) -> ApiResult<Address> {
    let address = addresses::update(&state.store, caller.user_id, id, input).await?;
    Ok(ApiResponse::with_message("address updated", address))
}

/// Returns the newly promoted default address, if one was promoted.
pub(super) async fn delete<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Option<Address>> {
    let promoted = addresses::delete(&state.store, caller.user_id, id).await?;
    Ok(ApiResponse::with_message("address deleted", promoted))
}

pub(super) async fn set_default<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(caller): RequireUser,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Address> {
    let address = addresses::set_default(&state.store, caller.user_id, id).await?;
    Ok(ApiResponse::with_message("default address updated", address))
}
