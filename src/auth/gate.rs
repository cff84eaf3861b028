//! Bearer-token gate for user-scoped routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::{AuthUser, TokenService};
use crate::error::ApiError;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(ApiError::unauthenticated)?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::malformed_credential())?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(ApiError::malformed_credential()),
    }
}

/// Middleware that rejects the request unless it carries a valid token,
/// then binds the [`AuthUser`] into request extensions.
pub async fn require_bearer(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = {
        let token = bearer_token(request.headers())?;
        tokens.verify(token).map_err(|e| {
            debug!(event = "auth.rejected", error = %e, "Bearer token rejected");
            ApiError::from(e)
        })?
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(ApiError::unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = value {
            map.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn missing_header_is_unauthenticated() {
        let err = bearer_token(&headers(None)).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthenticated);
    }

    #[test]
    fn wrong_shape_is_malformed() {
        for value in ["Bearer", "Token abc", "Bearer a b", "bearer abc", "abc"] {
            let err = bearer_token(&headers(Some(value))).unwrap_err();
            assert_eq!(err.code, ErrorCode::MalformedCredential, "{}", value);
        }
    }

    #[test]
    fn extracts_token() {
        assert_eq!(bearer_token(&headers(Some("Bearer abc.def"))).unwrap(), "abc.def");
    }
}
