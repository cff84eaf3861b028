//! Registration and login.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::extract::ApiJson;
use crate::auth::{self, Session};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl CredentialsRequest {
    fn into_parts(self) -> ApiResult<(String, String)> {
        match (self.username, self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok((username, password))
            }
            (username, _) => {
                let field = if username.as_deref().is_none_or(str::is_empty) {
                    "username"
                } else {
                    "password"
                };
                Err(ApiError::invalid_value(
                    field,
                    "Username and password are required",
                ))
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

/// Password hashing is CPU-bound, so it runs off the async workers.
async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let (username, password) = body.into_parts()?;
    let db = state.db().clone();

    blocking(move || db.register_user(&username, &password)).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully",
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CredentialsRequest>,
) -> ApiResult<Json<Session>> {
    let (username, password) = body.into_parts()?;
    let db = state.db().clone();
    let tokens = state.tokens().clone();

    let session =
        blocking(move || auth::authenticate(&db, &tokens, &username, &password)).await?;
    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: Option<&str>, password: Option<&str>) -> CredentialsRequest {
        CredentialsRequest {
            username: username.map(String::from),
            password: password.map(String::from),
        }
    }

    #[test]
    fn both_fields_required() {
        assert!(request(Some("alice"), Some("pw")).into_parts().is_ok());

        let err = request(None, Some("pw")).into_parts().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("username"));

        let err = request(Some("alice"), Some("")).into_parts().unwrap_err();
        assert_eq!(err.field.as_deref(), Some("password"));
    }
}
