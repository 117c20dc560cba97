use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiResponse, ApiResult, AppState, PathParam, Payload, QueryParams};
use crate::assets::CleanupSummary;
use crate::domain::aggregates::{Category, CategoryInput, Product, ProductFilter, ProductInput};
use crate::error::EcommerceError;
use crate::middleware::{CurrentCaller, RequireAdmin};
use crate::services::catalog::{self, ProductView};
use crate::store::{Page, PageRequest, Store};

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductWrite {
    product: Product,
    images_removed: CleanupSummary,
}

pub(super) async fn list_categories<S: Store>(State(state): State<AppState<S>>) -> ApiResult<Vec<Category>> {
    Ok(ApiResponse::ok(catalog::list_categories(&state.store).await?))
}

pub(super) async fn get_category<S: Store>(State(state): State<AppState<S>>, PathParam(id): PathParam<Uuid>) -> ApiResult<Category> {
    Ok(ApiResponse::ok(catalog::get_category(&state.store, id).await?))
}

pub(super) async fn create_category<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(caller): RequireAdmin,
    Payload(input): Payload<CategoryInput>,
) -> Result<impl IntoResponse, EcommerceError> {
    let category = catalog::create_category(&state.store, Some(&caller), input).await?;
    Ok((StatusCode::CREATED, ApiResponse::with_message("category created", category)))
}

pub(super) async fn update_category<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(caller): RequireAdmin,
    PathParam(id): PathParam<Uuid>,
    Payload(input): Payload<CategoryInput>,
) -> ApiResult<Category> {
    let category = catalog::update_category(&state.store, Some(&caller), id, input).await?;
    Ok(ApiResponse::with_message("category updated", category))
}

pub(super) async fn delete_category<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(caller): RequireAdmin,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<()> {
    catalog::delete_category(&state.store, Some(&caller), id).await?;
    Ok(ApiResponse::message("category deleted"))
}

pub(super) async fn list_products<S: Store>(
    State(state): State<AppState<S>>,
    CurrentCaller(caller): CurrentCaller,
    QueryParams(query): QueryParams<ProductQuery>,
) -> ApiResult<Page<ProductView>> {
    let defaults = PageRequest::default();
    let page = PageRequest::new(query.page.unwrap_or(defaults.page), query.limit.unwrap_or(defaults.limit));
    let filter = ProductFilter {
        category_id: query.category_id,
        search: query.search,
        include_inactive: query.include_inactive,
    };
    Ok(ApiResponse::ok(catalog::list_products(&state.store, caller.as_ref(), filter, page).await?))
}

pub(super) async fn get_product<S: Store>(
    State(state): State<AppState<S>>,
    CurrentCaller(caller): CurrentCaller,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<ProductView> {
    Ok(ApiResponse::ok(catalog::get_product(&state.store, caller.as_ref(), id).await?))
}

pub(super) async fn create_product<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(caller): RequireAdmin,
    Payload(input): Payload<ProductInput>,
) -> Result<impl IntoResponse, EcommerceError> {
    let product = catalog::create_product(&state.store, Some(&caller), input).await?;
    Ok((StatusCode::CREATED, ApiResponse::with_message("product created", product)))
}

pub(super) async fn update_product<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(caller): RequireAdmin,
    PathParam(id): PathParam<Uuid>,
    Payload(input): Payload<ProductInput>,
) -> ApiResult<ProductWrite> {
    let change = catalog::update_product(&state.store, &state.assets, Some(&caller), id, input).await?;
    let images_removed = change.summary();
    Ok(ApiResponse::with_message("product updated", ProductWrite { product: change.product, images_removed }))
}

pub(super) async fn delete_product<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(caller): RequireAdmin,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<CleanupSummary> {
    let cleanup = catalog::delete_product(&state.store, &state.assets, &state.notifier, Some(&caller), id).await?;
    Ok(ApiResponse::with_message("product deleted", CleanupSummary::of(&cleanup)))
}
