//! Bearer token issuance and verification (HS256 JWT).

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AuthUser;
use crate::error::ApiError;

/// Tokens expire this long after issuance unless configured otherwise.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Lifetime of the `state` value carried through the calendar OAuth redirect.
pub const OAUTH_STATE_LIFETIME_SECS: i64 = 10 * 60;

const OAUTH_STATE_PURPOSE: &str = "calendar-oauth";

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
    /// Token ID
    pub jti: String,
    /// Set on single-purpose tokens, which are never accepted as bearer tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token creation failed: {0}")]
    Encode(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::Invalid(_) => ApiError::invalid_credential(),
            TokenError::Encode(reason) => ApiError::internal(reason),
        }
    }
}

/// Signs and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_lifetime(secret, Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS))
    }

    pub fn with_lifetime(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    /// Issue a token for the given user.
    pub fn issue(&self, user_id: &str) -> Result<String, TokenError> {
        self.sign(user_id, self.lifetime, None)
    }

    /// Verify signature and expiry, returning the authenticated user.
    pub fn verify(&self, token: &str) -> Result<AuthUser, TokenError> {
        let claims = self.decode_claims(token)?;
        if claims.purpose.is_some() {
            return Err(TokenError::Invalid("not a bearer token".into()));
        }
        Ok(AuthUser::new(claims.sub))
    }

    /// Short-lived value binding a calendar OAuth round trip to a user.
    pub fn issue_oauth_state(&self, user: &AuthUser) -> Result<String, TokenError> {
        self.sign(
            user.user_id(),
            Duration::seconds(OAUTH_STATE_LIFETIME_SECS),
            Some(OAUTH_STATE_PURPOSE),
        )
    }

    /// Recover the user an OAuth `state` value was issued for.
    pub fn verify_oauth_state(&self, state: &str) -> Result<AuthUser, TokenError> {
        let claims = self.decode_claims(state)?;
        if claims.purpose.as_deref() != Some(OAUTH_STATE_PURPOSE) {
            return Err(TokenError::Invalid("not an oauth state token".into()));
        }
        Ok(AuthUser::new(claims.sub))
    }

    fn sign(
        &self,
        user_id: &str,
        lifetime: Duration,
        purpose: Option<&str>,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            purpose: purpose.map(String::from),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0; // No clock skew tolerance

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.sub.is_empty() {
            return Err(TokenError::Invalid("empty subject".into()));
        }

        Ok(data.claims)
    }
}
