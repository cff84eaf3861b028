//! Core types for the todo server.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// A checklist item embedded in its parent task.
///
/// Subtasks are addressed by position within the parent. The `id` is
/// stable for the lifetime of the item and lets clients notice that the
/// index they hold no longer points at the item they read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default = "new_subtask_id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

/// Items stored before subtasks carried ids get a fresh one on read.
pub fn new_subtask_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A task owned by one user, or by nobody on the integration path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub order: i64,
    pub subtasks: Vec<Subtask>,
    pub calendar_event_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Calendar day (UTC) of the due date, if any.
    pub fn due_day(&self) -> Option<NaiveDate> {
        self.due_date.map(|d| d.date_naive())
    }
}

/// Request body for creating a task.
///
/// `task` is accepted as an alias for `title` for older clients.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default, alias = "task")]
    pub title: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// Partial update. Absent fields are left untouched; `dueDate: null`
/// clears the due date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, alias = "task")]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.completed.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
    }
}

/// Partial update of a subtask.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtaskPatch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// One entry of a reorder request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderItem {
    pub id: String,
    pub order: i64,
}

/// Outcome of a reorder request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReorderOutcome {
    pub updated: usize,
    pub skipped: Vec<String>,
}

/// A window over a task list. `batch` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub batch: u32,
    pub batch_size: u32,
}

impl Pagination {
    pub fn new(batch: u32, batch_size: u32) -> Self {
        Self { batch, batch_size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.batch.saturating_sub(1)) * u64::from(self.batch_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.batch_size)
    }
}

/// Completion status filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

/// Priority filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityFilter {
    #[default]
    All,
    High,
    Medium,
    Low,
}

impl PriorityFilter {
    pub fn matches(&self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::High => priority == Priority::High,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::Low => priority == Priority::Low,
        }
    }
}

/// Conjunction of view criteria over a task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: StatusFilter,
    pub priority: PriorityFilter,
    pub due_date: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn is_noop(&self) -> bool {
        self.status == StatusFilter::All
            && self.priority == PriorityFilter::All
            && self.due_date.is_none()
    }
}

/// OAuth credentials granted by the calendar provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarCredentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as unix milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Calendar connection state stored on the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarLink {
    #[serde(skip_serializing)]
    pub credentials: Option<CalendarCredentials>,
    pub connected: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

impl CalendarLink {
    /// Connected and holding an access token.
    pub fn is_usable(&self) -> bool {
        self.connected
            && self
                .credentials
                .as_ref()
                .is_some_and(|c| !c.access_token.is_empty())
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub calendar: CalendarLink,
    pub created_at: i64,
}

/// Start or end of a calendar event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// A calendar event as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_defaults_to_medium() {
        let task: NewTask = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(task.priority.unwrap_or_default(), Priority::Medium);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn new_task_accepts_task_alias() {
        let task: NewTask = serde_json::from_str(r#"{"task":"Buy milk"}"#).unwrap();
        assert_eq!(task.title.as_deref(), Some("Buy milk"));
    }

    #[test]
    fn patch_distinguishes_null_from_absent_due_date() {
        let absent: TaskPatch = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert!(absent.due_date.is_none());

        let cleared: TaskPatch = serde_json::from_str(r#"{"dueDate":null}"#).unwrap();
        assert_eq!(cleared.due_date, Some(None));

        let set: TaskPatch =
            serde_json::from_str(r#"{"dueDate":"2026-03-01T10:00:00.000Z"}"#).unwrap();
        assert!(matches!(set.due_date, Some(Some(_))));
    }

    #[test]
    fn unknown_patch_fields_are_ignored() {
        let patch: TaskPatch = serde_json::from_str(r#"{"colour":"blue"}"#).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn pagination_offset_is_one_based() {
        assert_eq!(Pagination::new(1, 10).offset(), 0);
        assert_eq!(Pagination::new(3, 10).offset(), 20);
        assert_eq!(Pagination::new(0, 10).offset(), 0);
    }

    #[test]
    fn task_serializes_camel_case() {
        let task = Task {
            id: "t1".into(),
            user_id: Some("u1".into()),
            title: "Buy milk".into(),
            completed: false,
            due_date: None,
            priority: Priority::Medium,
            order: 0,
            subtasks: vec![],
            calendar_event_id: None,
            created_at: 1,
            updated_at: 1,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["priority"], "medium");
        assert!(json.get("calendarEventId").is_some());
    }
}
