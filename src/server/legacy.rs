//! `/appian/todos`: the API-key surface over ownerless tasks.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::AppState;
use super::extract::{ApiJson, ApiQuery};
use super::todos::{ListParams, list_view};
use crate::auth::IntegrationAccess;
use crate::error::ApiResult;
use crate::types::{NewTask, Task, TaskPatch};

pub async fn list(
    State(state): State<AppState>,
    access: IntegrationAccess,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<Task>>> {
    let scope = state.db().legacy_tasks(&access);
    let tasks = list_view(&params, state.list_settings(), |page| scope.list(page))?;
    Ok(Json(tasks))
}

pub async fn create(
    State(state): State<AppState>,
    access: IntegrationAccess,
    ApiJson(input): ApiJson<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.db().legacy_tasks(&access).create(input)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update(
    State(state): State<AppState>,
    access: IntegrationAccess,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> ApiResult<Json<Task>> {
    let task = state.db().legacy_tasks(&access).update(&id, patch)?;
    Ok(Json(task))
}

pub async fn delete(
    State(state): State<AppState>,
    access: IntegrationAccess,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = state.db().legacy_tasks(&access).delete(&id)?;
    Ok(Json(task))
}
