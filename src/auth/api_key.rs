//! Static API key gate for the batch-integration surface.
//!
//! This path never touches bearer tokens and grants access only to
//! ownerless tasks.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderName, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::{ApiError, ErrorCode};

/// Header carrying the integration key.
pub static API_KEY_HEADER: HeaderName = HeaderName::from_static("appian_api_key");

/// The configured integration key.
#[derive(Clone)]
pub struct IntegrationKey(String);

impl IntegrationKey {
    /// Returns `None` for an empty key so an unset key never matches.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.is_empty() { None } else { Some(Self(key)) }
    }

    /// Constant-time comparison against a presented key.
    pub fn check(&self, presented: &str) -> Option<IntegrationAccess> {
        let ok: bool = self.0.as_bytes().ct_eq(presented.as_bytes()).into();
        ok.then_some(IntegrationAccess { _private: () })
    }
}

/// Proof that the request presented the integration key.
#[derive(Debug, Clone)]
pub struct IntegrationAccess {
    _private: (),
}

/// Middleware for `/appian/*`.
pub async fn require_api_key(
    State(key): State<Arc<IntegrationKey>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get(&API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let access = key.check(presented).ok_or_else(|| {
        warn!(event = "integration.rejected", "Invalid or missing integration API key");
        ApiError::new(ErrorCode::InvalidCredential, "Invalid API key")
    })?;

    request.extensions_mut().insert(access);
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for IntegrationAccess
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IntegrationAccess>()
            .cloned()
            .ok_or_else(|| ApiError::new(ErrorCode::Unauthenticated, "API key required"))
    }
}
