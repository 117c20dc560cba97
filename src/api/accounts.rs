use axum::{extract::State, http::StatusCode, response::IntoResponse};

use super::{ApiResponse, ApiResult, AppState, Payload};
use crate::domain::aggregates::{LoginInput, RegisterInput};
use crate::error::EcommerceError;
use crate::services::accounts::{self, LoginResult, ResendInput, VerifyInput};
use crate::store::Store;

pub(super) async fn register<S: Store>(
    State(state): State<AppState<S>>,
    Payload(input): Payload<RegisterInput>,
) -> Result<impl IntoResponse, EcommerceError> {
    let user = accounts::register(&state.store, &state.notifier, input).await?;
    Ok((StatusCode::CREATED, ApiResponse::with_message("check your inbox to verify your email", user)))
}

pub(super) async fn login<S: Store>(State(state): State<AppState<S>>, Payload(input): Payload<LoginInput>) -> ApiResult<LoginResult> {
    Ok(ApiResponse::ok(accounts::login(&state.store, input, state.session_ttl_hours).await?))
}

pub(super) async fn verify<S: Store>(State(state): State<AppState<S>>, Payload(input): Payload<VerifyInput>) -> ApiResult<()> {
    accounts::verify_email(&state.store, input).await?;
    Ok(ApiResponse::message("email verified"))
}

pub(super) async fn resend_verification<S: Store>(
    State(state): State<AppState<S>>,
    Payload(input): Payload<ResendInput>,
) -> ApiResult<()> {
    accounts::resend_verification(&state.store, &state.notifier, input).await?;
    Ok(ApiResponse::message("verification email sent"))
}
