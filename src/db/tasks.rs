//! Task CRUD scoped to one owner.

use super::{Database, now_ms, optional, time_from_sql, time_to_sql};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::types::{NewTask, Pagination, Priority, Subtask, Task, TaskPatch};
use anyhow::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, TransactionBehavior, params};
use tracing::debug;
use uuid::Uuid;

/// Longest accepted task title, in characters.
pub const MAX_TITLE_LEN: usize = 500;

const TASK_COLUMNS: &str = "id, user_id, title, completed, due_date, priority, sort_order, \
     subtasks, calendar_event_id, created_at, updated_at";

/// Stable display order: order position, then creation time, then id.
const ORDER_BY: &str = "ORDER BY sort_order ASC, created_at ASC, id ASC";

/// Report a stored value that does not decode instead of replacing it.
fn conversion_failure<E>(row: &Row, column: &str, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match row.as_ref().column_index(column) {
        Ok(idx) => rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into()),
        Err(e) => e,
    }
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let due_date: Option<String> = row.get("due_date")?;
    let subtasks_json: String = row.get("subtasks")?;

    let priority = priority
        .parse::<Priority>()
        .map_err(|e: String| conversion_failure(row, "priority", e))?;
    let subtasks = serde_json::from_str::<Vec<Subtask>>(&subtasks_json)
        .map_err(|e| conversion_failure(row, "subtasks", e))?;

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        completed: row.get("completed")?,
        due_date: time_from_sql(due_date),
        priority,
        order: row.get("sort_order")?,
        subtasks,
        calendar_event_id: row.get("calendar_event_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Fetch a task only if it belongs to `owner` (`None` = ownerless).
pub(super) fn get_owned(conn: &Connection, owner: Option<&str>, task_id: &str) -> Result<Option<Task>> {
    let sql = format!(
        "SELECT {} FROM tasks WHERE id = ?1 AND user_id IS ?2",
        TASK_COLUMNS
    );
    optional(conn.query_row(&sql, params![task_id, owner], parse_task_row))
}

pub(super) fn require_owned(conn: &Connection, owner: Option<&str>, task_id: &str) -> Result<Task> {
    get_owned(conn, owner, task_id)?.ok_or_else(|| ApiError::task_not_found(task_id).into())
}

/// Persist every mutable field of an owned task.
pub(super) fn write_task(conn: &Connection, task: &Task) -> Result<()> {
    let subtasks_json = serde_json::to_string(&task.subtasks)?;
    let updated = conn.execute(
        "UPDATE tasks SET title = ?1, completed = ?2, due_date = ?3, priority = ?4,
             sort_order = ?5, subtasks = ?6, calendar_event_id = ?7, updated_at = ?8
         WHERE id = ?9 AND user_id IS ?10",
        params![
            &task.title,
            task.completed,
            task.due_date.as_ref().map(time_to_sql),
            task.priority.as_str(),
            task.order,
            subtasks_json,
            &task.calendar_event_id,
            task.updated_at,
            &task.id,
            &task.user_id,
        ],
    )?;
    if updated == 0 {
        return Err(ApiError::task_not_found(&task.id).into());
    }
    Ok(())
}

fn validate_title(title: Option<&str>) -> Result<String, ApiError> {
    let title = title.map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(ApiError::missing_field("title"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::invalid_value(
            "title",
            format!("title must be at most {} characters", MAX_TITLE_LEN),
        ));
    }
    Ok(title.to_string())
}

/// Task operations bound to a single owner.
///
/// Built from an [`AuthUser`] via [`Database::tasks`], or internally for the
/// ownerless integration collection.
pub struct TaskScope<'a> {
    pub(super) db: &'a Database,
    pub(super) owner: Option<&'a str>,
}

impl Database {
    /// Task operations for the authenticated user.
    pub fn tasks<'a>(&'a self, user: &'a AuthUser) -> TaskScope<'a> {
        TaskScope {
            db: self,
            owner: Some(user.user_id()),
        }
    }
}

impl<'a> TaskScope<'a> {
    pub fn owner(&self) -> Option<&str> {
        self.owner
    }

    /// Tasks in display order. With a page, returns only that window; a
    /// page past the end is empty.
    pub fn list(&self, page: Option<Pagination>) -> Result<Vec<Task>> {
        self.db.with_conn(|conn| {
            let tasks = match page {
                Some(page) => {
                    let sql = format!(
                        "SELECT {} FROM tasks WHERE user_id IS ?1 {} LIMIT ?2 OFFSET ?3",
                        TASK_COLUMNS, ORDER_BY
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map(
                        params![self.owner, page.limit() as i64, page.offset() as i64],
                        parse_task_row,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let sql = format!(
                        "SELECT {} FROM tasks WHERE user_id IS ?1 {}",
                        TASK_COLUMNS, ORDER_BY
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map(params![self.owner], parse_task_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(tasks)
        })
    }

    /// Number of tasks owned by this scope.
    pub fn count(&self) -> Result<i64> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE user_id IS ?1",
                params![self.owner],
                |row| row.get(0),
            )?)
        })
    }

    /// Get one task; `NotFound` if absent or owned by someone else.
    pub fn get(&self, task_id: &str) -> Result<Task> {
        self.db.with_conn(|conn| require_owned(conn, self.owner, task_id))
    }

    /// Tasks that have a due date, in display order.
    pub fn list_with_due_dates(&self) -> Result<Vec<Task>> {
        Ok(self
            .list(None)?
            .into_iter()
            .filter(|t| t.due_date.is_some())
            .collect())
    }

    /// Create a task at the tail of the owner's list.
    pub fn create(&self, input: NewTask) -> Result<Task> {
        let title = validate_title(input.title.as_deref())?;
        let now = now_ms();

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let order: i64 = tx.query_row(
                "SELECT COUNT(*) FROM tasks WHERE user_id IS ?1",
                params![self.owner],
                |row| row.get(0),
            )?;

            let task = Task {
                id: Uuid::now_v7().to_string(),
                user_id: self.owner.map(str::to_string),
                title,
                completed: false,
                due_date: input.due_date,
                priority: input.priority.unwrap_or_default(),
                order,
                subtasks: Vec::new(),
                calendar_event_id: None,
                created_at: now,
                updated_at: now,
            };

            tx.execute(
                "INSERT INTO tasks (
                    id, user_id, title, completed, due_date, priority, sort_order,
                    subtasks, calendar_event_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, '[]', NULL, ?7, ?8)",
                params![
                    &task.id,
                    &task.user_id,
                    &task.title,
                    task.due_date.as_ref().map(time_to_sql),
                    task.priority.as_str(),
                    task.order,
                    now,
                    now,
                ],
            )?;

            tx.commit()?;
            debug!(task_id = %task.id, order = task.order, "Created task");
            Ok(task)
        })
    }

    /// Apply only the fields present in `patch`. An empty patch returns the
    /// task unchanged.
    pub fn update(&self, task_id: &str, patch: TaskPatch) -> Result<Task> {
        let title = match patch.title.as_deref() {
            Some(t) => Some(validate_title(Some(t))?),
            None => None,
        };

        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut task = require_owned(&tx, self.owner, task_id)?;

            if patch.is_empty() {
                return Ok(task);
            }

            if let Some(title) = title {
                task.title = title;
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
            if let Some(due_date) = patch.due_date {
                task.due_date = due_date;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            task.updated_at = now_ms();

            write_task(&tx, &task)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Delete a task and return the removed record.
    pub fn delete(&self, task_id: &str) -> Result<Task> {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let task = require_owned(&tx, self.owner, task_id)?;
            tx.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id IS ?2",
                params![task_id, self.owner],
            )?;
            tx.commit()?;
            debug!(task_id = %task_id, "Deleted task");
            Ok(task)
        })
    }

    /// Store the calendar event created for a task.
    pub fn set_calendar_event_id(&self, task_id: &str, event_id: &str) -> Result<Task> {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut task = require_owned(&tx, self.owner, task_id)?;
            task.calendar_event_id = Some(event_id.to_string());
            task.updated_at = now_ms();
            write_task(&tx, &task)?;
            tx.commit()?;
            Ok(task)
        })
    }
}
