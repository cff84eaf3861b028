//! User-scoped task endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::extract::{ApiJson, ApiQuery};
use super::{AppState, ListSettings};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::filter;
use crate::types::{
    NewTask, Pagination, PriorityFilter, ReorderItem, StatusFilter, Task, TaskFilter, TaskPatch,
};

/// Query string for list endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    batch: Option<u32>,
    #[serde(default)]
    batch_size: Option<u32>,
    #[serde(default)]
    status: StatusFilter,
    #[serde(default)]
    priority: PriorityFilter,
    #[serde(default)]
    due_date: Option<NaiveDate>,
}

impl ListParams {
    /// `None` means the whole list.
    pub fn pagination(&self, settings: ListSettings) -> ApiResult<Option<Pagination>> {
        if self.batch.is_none() && self.batch_size.is_none() {
            return Ok(None);
        }

        let batch = self.batch.unwrap_or(1);
        let batch_size = self.batch_size.unwrap_or(settings.default_batch_size);

        if batch == 0 {
            return Err(ApiError::invalid_value("batch", "batch starts at 1"));
        }
        if batch_size == 0 || batch_size > settings.max_batch_size {
            return Err(ApiError::invalid_value(
                "batchSize",
                format!("batchSize must be between 1 and {}", settings.max_batch_size),
            ));
        }

        Ok(Some(Pagination::new(batch, batch_size)))
    }

    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
        }
    }
}

/// Filter first, then page the filtered list.
pub(super) fn list_view<F>(
    params: &ListParams,
    settings: ListSettings,
    fetch: F,
) -> ApiResult<Vec<Task>>
where
    F: Fn(Option<Pagination>) -> anyhow::Result<Vec<Task>>,
{
    let page = params.pagination(settings)?;
    let criteria = params.filter();

    if criteria.is_noop() {
        return Ok(fetch(page)?);
    }

    let filtered = filter::apply(&fetch(None)?, &criteria);
    Ok(match page {
        Some(page) => filtered
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .collect(),
        None => filtered,
    })
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> ApiResult<Json<Vec<Task>>> {
    let scope = state.db().tasks(&user);
    let tasks = list_view(&params, state.list_settings(), |page| scope.list(page))?;
    Ok(Json(tasks))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.db().tasks(&user).create(input)?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> ApiResult<Json<Task>> {
    let task = state.db().tasks(&user).update(&id, patch)?;
    Ok(Json(task))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task = state.db().tasks(&user).delete(&id)?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    tasks: Vec<ReorderItem>,
}

#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    message: &'static str,
    updated: usize,
    skipped: Vec<String>,
}

pub async fn reorder(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<ReorderRequest>,
) -> ApiResult<Json<ReorderResponse>> {
    let outcome = state.db().tasks(&user).reorder(&body.tasks)?;
    if !outcome.skipped.is_empty() {
        debug!(skipped = outcome.skipped.len(), "Reorder ignored unknown task ids");
    }
    Ok(Json(ReorderResponse {
        message: "Tasks reordered successfully",
        updated: outcome.updated,
        skipped: outcome.skipped,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn task(id: &str, completed: bool) -> Task {
        Task {
            id: id.into(),
            user_id: Some("u".into()),
            title: id.into(),
            completed,
            due_date: None,
            priority: Priority::Medium,
            order: 0,
            subtasks: vec![],
            calendar_event_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn params(query: &str) -> ListParams {
        serde_json::from_value(serde_json::from_str(query).unwrap()).unwrap()
    }

    #[test]
    fn no_paging_params_means_everything() {
        let p = ListParams::default();
        assert_eq!(p.pagination(ListSettings::default()).unwrap(), None);
    }

    #[test]
    fn batch_defaults_size_and_rejects_zero() {
        let settings = ListSettings::default();

        let p = params(r#"{"batch": 2}"#);
        assert_eq!(
            p.pagination(settings).unwrap(),
            Some(Pagination::new(2, settings.default_batch_size))
        );

        assert!(params(r#"{"batch": 0}"#).pagination(settings).is_err());
        assert!(params(r#"{"batchSize": 0}"#).pagination(settings).is_err());
        assert!(params(r#"{"batchSize": 1001}"#).pagination(settings).is_err());
    }

    #[test]
    fn filtered_lists_are_paged_after_filtering() {
        let all = vec![
            task("a", true),
            task("b", false),
            task("c", true),
            task("d", true),
        ];
        let p = params(r#"{"status": "completed", "batch": 2, "batchSize": 2}"#);

        let view = list_view(&p, ListSettings::default(), |page| {
            assert!(page.is_none());
            Ok(all.clone())
        })
        .unwrap();

        let ids: Vec<_> = view.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["d"]);
    }
}
