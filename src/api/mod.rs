mod accounts;
mod addresses;
mod cart;
mod catalog;
mod checkout;
mod orders;

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::assets::AssetStore;
use crate::error::{EcommerceError, FieldErrors};
use crate::middleware::{request_id, resolve_caller};
use crate::notify::Notifier;
use crate::payment::OfflineGateway;
use crate::store::Store;

/// Process-scoped collaborators shared by every handler.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub assets: Arc<AssetStore>,
    pub notifier: Notifier,
    pub payments: OfflineGateway,
    pub session_ttl_hours: i64,
}

impl<S> AppState<S> {
    pub fn new(store: S, assets: AssetStore, notifier: Notifier) -> Self {
        Self { store, assets: Arc::new(assets), notifier, payments: OfflineGateway::new(), session_ttl_hours: 168 }
    }

    pub fn with_session_ttl(mut self, hours: i64) -> Self {
        self.session_ttl_hours = hours;
        self
    }
}

/// Success envelope: `{success: true, message?, data?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self { Self { success: true, message: None, data: Some(data) } }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: Some(message.into()), data: Some(data) }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self { success: true, message: Some(message.into()), data: None }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Failure envelope: `{success: false, error, fields?}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = match self {
            Self::Unexpected(detail) => {
                tracing::error!(error = %detail, "request failed");
                ApiError { success: false, error: "something went wrong, please try again".to_string(), fields: None }
            }
            Self::ValidationFailed { message, fields } => ApiError { success: false, error: message, fields: Some(fields) },
            other => {
                tracing::debug!(kind = other.kind(), error = %other, "request rejected");
                ApiError { success: false, error: other.to_string(), fields: None }
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, EcommerceError>;

/// JSON body extractor whose rejections use the error envelope.
pub struct Payload<T>(pub T);

#[axum::async_trait]
impl<T, St> FromRequest<St> for Payload<T>
where
    T: DeserializeOwned,
    St: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| EcommerceError::invalid("body", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Path extractor; a malformed segment is reported against `id`.
pub struct PathParam<T>(pub T);

#[axum::async_trait]
impl<T, St> FromRequestParts<St> for PathParam<T>
where
    T: DeserializeOwned + Send,
    St: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| EcommerceError::invalid("id", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query-string extractor; failures are reported against `query`.
pub struct QueryParams<T>(pub T);

#[axum::async_trait]
impl<T, St> FromRequestParts<St> for QueryParams<T>
where
    T: DeserializeOwned,
    St: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| EcommerceError::invalid("query", rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, HeaderName::from_static("x-request-id")])
}

fn api_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::<S>))
        .route("/auth/register", post(accounts::register::<S>))
        .route("/auth/login", post(accounts::login::<S>))
        .route("/auth/verify", post(accounts::verify::<S>))
        .route("/auth/resend-verification", post(accounts::resend_verification::<S>))
        .route("/cart", get(cart::view::<S>).delete(cart::clear::<S>))
        .route("/cart/items", post(cart::add_item::<S>))
        .route("/cart/items/:product_id", put(cart::set_quantity::<S>).delete(cart::remove_item::<S>))
        .route("/checkout", post(checkout::checkout::<S>))
        .route("/checkout/coupon", post(checkout::validate_coupon::<S>))
        .route("/orders", get(orders::list::<S>))
        .route("/orders/:id", get(orders::get::<S>).put(orders::update::<S>))
        .route("/orders/:id/cancel", post(orders::cancel::<S>))
        .route("/categories", get(catalog::list_categories::<S>).post(catalog::create_category::<S>))
        .route(
            "/categories/:id",
            get(catalog::get_category::<S>)
                .put(catalog::update_category::<S>)
                .delete(catalog::delete_category::<S>),
        )
        .route("/products", get(catalog::list_products::<S>).post(catalog::create_product::<S>))
        .route(
            "/products/:id",
            get(catalog::get_product::<S>)
                .put(catalog::update_product::<S>)
                .delete(catalog::delete_product::<S>),
        )
        .route("/addresses", get(addresses::list::<S>).post(addresses::create::<S>))
        .route("/addresses/:id", put(addresses::update::<S>).delete(addresses::delete::<S>))
        .route("/addresses/:id/default", post(addresses::set_default::<S>))
}

pub fn build_app<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes::<S>())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn_with_state(state.clone(), resolve_caller::<S>)),
        )
        .with_state(state)
}

async fn health<S: Store>(State(state): State<AppState<S>>) -> Response {
    match state.store.health_check().await {
        Ok(()) => ApiResponse::ok(HealthData { status: "ok", database: "ok" }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            let body = ApiResponse {
                success: false,
                message: Some("database unavailable".to_string()),
                data: Some(HealthData { status: "degraded", database: "unavailable" }),
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}
