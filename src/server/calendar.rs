//! Calendar endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use super::extract::ApiQuery;
use crate::auth::AuthUser;
use crate::calendar::{self, SyncReport};
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::types::{CalendarCredentials, CalendarEvent};

/// Where the browser lands once the provider has granted access.
const CONNECTED_PAGE: &str = "/calendar-connected.html";

/// Default listing window when `timeMax` is omitted.
const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Domain errors pass through; anything else came from the provider.
fn provider_error(err: anyhow::Error) -> ApiError {
    match err.downcast::<ApiError>() {
        Ok(api_err) => api_err,
        Err(err) if err.downcast_ref::<rusqlite::Error>().is_some() => ApiError::from(err),
        Err(err) => ApiError::provider(format!("{:#}", err)),
    }
}

fn linked_credentials(state: &AppState, user: &AuthUser) -> ApiResult<CalendarCredentials> {
    let account = state
        .db()
        .get_user(user.user_id())?
        .ok_or_else(ApiError::user_not_found)?;

    if !account.calendar.is_usable() {
        return Err(ApiError::calendar_not_connected());
    }
    account
        .calendar
        .credentials
        .ok_or_else(ApiError::calendar_not_connected)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlResponse {
    auth_url: String,
}

pub async fn auth_url(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<AuthUrlResponse>> {
    let provider = state.calendar()?;
    let oauth_state = state.tokens().issue_oauth_state(&user)?;
    Ok(Json(AuthUrlResponse {
        auth_url: provider.auth_url(&oauth_state),
    }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CallbackParams>,
) -> ApiResult<Redirect> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::invalid_value("code", "Authorization code is required"))?;
    let oauth_state = params.state.filter(|s| !s.is_empty()).ok_or_else(|| {
        ApiError::new(ErrorCode::Unauthenticated, "User identification missing")
    })?;

    let user = state
        .tokens()
        .verify_oauth_state(&oauth_state)
        .map_err(|e| {
            warn!(error = %e, "Rejected calendar callback state");
            ApiError::from(e)
        })?;

    let credentials = state
        .calendar()?
        .exchange_code(&code)
        .await
        .map_err(provider_error)?;

    state
        .db()
        .set_calendar_link(user.user_id(), &credentials)?;
    info!(user_id = %user.user_id(), "Calendar connected");

    Ok(Redirect::to(CONNECTED_PAGE))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    connected: bool,
    last_sync: Option<DateTime<Utc>>,
}

pub async fn status(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<StatusResponse>> {
    let account = state
        .db()
        .get_user(user.user_id())?
        .ok_or_else(ApiError::user_not_found)?;

    let connected = account.calendar.is_usable();
    Ok(Json(StatusResponse {
        connected,
        last_sync: if connected {
            account.calendar.last_sync
        } else {
            None
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWindow {
    #[serde(default)]
    time_min: Option<DateTime<Utc>>,
    #[serde(default)]
    time_max: Option<DateTime<Utc>>,
}

impl EventWindow {
    fn resolve(&self, now: DateTime<Utc>) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
        let min = self.time_min.unwrap_or(now);
        let max = self
            .time_max
            .unwrap_or(min + Duration::days(DEFAULT_WINDOW_DAYS));
        if max <= min {
            return Err(ApiError::invalid_value(
                "timeMax",
                "timeMax must be after timeMin",
            ));
        }
        Ok((min, max))
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(window): ApiQuery<EventWindow>,
) -> ApiResult<Json<Vec<CalendarEvent>>> {
    let (time_min, time_max) = window.resolve(Utc::now())?;
    let credentials = linked_credentials(&state, &user)?;

    let events = state
        .calendar()?
        .list_events(&credentials, time_min, time_max)
        .await
        .map_err(provider_error)?;
    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<CalendarEvent>)> {
    let credentials = linked_credentials(&state, &user)?;
    let provider = state.calendar()?;

    let event = calendar::mirror_task(provider.as_ref(), state.db(), &user, &credentials, &id)
        .await
        .map_err(provider_error)?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn sync(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<SyncReport>> {
    let credentials = linked_credentials(&state, &user)?;
    let provider = state.calendar()?;

    let report = calendar::sync_tasks(provider.as_ref(), state.db(), &user, &credentials).await?;
    info!(
        user_id = %user.user_id(),
        created = report.created.len(),
        failed = report.errors.len(),
        "Calendar sync finished"
    );
    Ok(Json(report))
}
