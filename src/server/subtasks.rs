//! Subtask endpoints, addressed by position in the parent's list.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::AppState;
use super::extract::ApiJson;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::types::{SubtaskPatch, Task};

#[derive(Debug, Deserialize)]
pub struct AddSubtaskRequest {
    #[serde(default)]
    text: Option<String>,
}

/// A non-numeric index can't name a subtask.
fn parse_index(task_id: &str, raw: &str) -> ApiResult<usize> {
    raw.parse()
        .map_err(|_| ApiError::subtask_not_found(task_id, raw))
}

pub async fn add(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AddSubtaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let text = body.text.ok_or_else(|| ApiError::missing_field("text"))?;
    let task = state.db().tasks(&user).add_subtask(&id, &text)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, index)): Path<(String, String)>,
    ApiJson(patch): ApiJson<SubtaskPatch>,
) -> ApiResult<Json<Task>> {
    let index = parse_index(&id, &index)?;
    let task = state.db().tasks(&user).update_subtask(&id, index, patch)?;
    Ok(Json(task))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, index)): Path<(String, String)>,
) -> ApiResult<Json<Task>> {
    let index = parse_index(&id, &index)?;
    let task = state.db().tasks(&user).delete_subtask(&id, index)?;
    Ok(Json(task))
}
