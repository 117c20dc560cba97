use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::EcommerceError;
use crate::services::{accounts, admin, Caller};
use crate::store::Store;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is stored in the request
/// extensions as [`RequestId`] and echoed on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// The session behind the request, if any. Always present in extensions
/// once [`resolve_caller`] has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentCaller(pub Option<Caller>);

/// Resolves a `Bearer` session token into a [`CurrentCaller`].
///
/// Unknown or expired tokens leave the request anonymous; routes that need a
/// user reject it through [`RequireUser`].
pub async fn resolve_caller<S: Store>(State(state): State<AppState<S>>, mut req: Request, next: Next) -> Response {
    let caller = match extract_bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) => match accounts::authenticate(&state.store, token).await {
            Ok(caller) => caller,
            Err(error) => return error.into_response(),
        },
        None => None,
    };

    req.extensions_mut().insert(CurrentCaller(caller));
    next.run(req).await
}

#[axum::async_trait]
impl<St: Send + Sync> FromRequestParts<St> for CurrentCaller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentCaller>().copied().unwrap_or_default())
    }
}

/// Extractor for routes that need a signed-in user.
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub Caller);

#[axum::async_trait]
impl<St: Send + Sync> FromRequestParts<St> for RequireUser {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentCaller>()
            .and_then(|c| c.0)
            .map(RequireUser)
            .ok_or_else(EcommerceError::unauthorized)
    }
}

/// Extractor for admin-only routes. A missing session and a missing privilege
/// both reject with 401.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub Caller);

#[axum::async_trait]
impl<St: Send + Sync> FromRequestParts<St> for RequireAdmin {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let caller = parts.extensions.get::<CurrentCaller>().and_then(|c| c.0);
        admin(caller.as_ref()).copied().map(RequireAdmin)
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Role;

    fn parts_for(caller: Option<Caller>) -> Parts {
        let (mut parts, _) = Request::new(axum::body::Body::empty()).into_parts();
        parts.extensions.insert(CurrentCaller(caller));
        parts
    }

    #[tokio::test]
    async fn require_admin_checks_the_role() {
        let admin = Caller { user_id: Uuid::new_v4(), role: Role::Admin };
        let customer = Caller { user_id: Uuid::new_v4(), role: Role::Customer };

        let RequireAdmin(found) = RequireAdmin::from_request_parts(&mut parts_for(Some(admin)), &()).await.unwrap();
        assert_eq!(found, admin);
        for caller in [Some(customer), None] {
            let err = RequireAdmin::from_request_parts(&mut parts_for(caller), &()).await.unwrap_err();
            assert!(matches!(err, EcommerceError::Unauthorized(_)));
        }
    }

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
        assert_eq!(extract_bearer_token(Some(&HeaderValue::from_static("Bearer   "))), None);
        assert_eq!(extract_bearer_token(None), None);
    }
}
