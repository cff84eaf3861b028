//! Authentication: credentials, bearer tokens and the request gates.

pub mod api_key;
pub mod gate;
pub mod password;
pub mod token;

pub use api_key::{IntegrationAccess, IntegrationKey};
pub use token::{TokenError, TokenService};

use crate::db::Database;
use crate::error::ApiError;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

/// Result of a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

/// Check credentials and issue a bearer token.
pub fn authenticate(
    db: &Database,
    tokens: &TokenService,
    username: &str,
    password: &str,
) -> Result<Session> {
    let user = db.verify_credentials(username, password)?;
    let token = tokens.issue(&user.id).map_err(ApiError::from)?;
    info!(user_id = %user.id, "User logged in");
    Ok(Session {
        token,
        user_id: user.id,
    })
}

/// A user identity proven by a verified bearer token.
///
/// Only [`TokenService::verify`] constructs this, so holding one means the
/// gate has run. Every user-scoped repository call requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    user_id: String,
}

impl AuthUser {
    fn new(user_id: String) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
