//! Calendar integration.
//!
//! The core only needs a [`CalendarProvider`]; [`google::GoogleCalendar`]
//! is the shipped implementation. Calendar calls never run inside task
//! CRUD, only on explicit calendar requests.

pub mod google;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::db::Database;
use crate::types::{CalendarCredentials, CalendarEvent, EventTime, Task};

pub use google::{GoogleCalendar, GoogleCalendarConfig};

/// The narrow surface the server calls on a calendar provider.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// URL the user visits to grant access. `state` comes back unchanged on
    /// the callback.
    fn auth_url(&self, state: &str) -> String;

    /// Exchange an authorization code for credentials.
    async fn exchange_code(&self, code: &str) -> Result<CalendarCredentials>;

    /// Create an event mirroring `task`.
    async fn create_event_from_task(
        &self,
        credentials: &CalendarCredentials,
        task: &Task,
    ) -> Result<CalendarEvent>;

    /// Events in `[time_min, time_max)`.
    async fn list_events(
        &self,
        credentials: &CalendarCredentials,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;
}

/// Request body for a new event derived from a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
}

impl EventDraft {
    /// Starts at the due date, or an hour from `now` when there is none,
    /// and lasts one hour.
    pub fn from_task(task: &Task, time_zone: &str, now: DateTime<Utc>) -> Self {
        let start = task.due_date.unwrap_or(now + Duration::hours(1));
        let end = start + Duration::hours(1);
        let at = |t: DateTime<Utc>| EventTime {
            date_time: Some(t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            date: None,
            time_zone: Some(time_zone.to_string()),
        };

        Self {
            summary: task.title.clone(),
            description: "Todo task from your Todo App.".to_string(),
            start: at(start),
            end: at(end),
        }
    }
}

/// A task that could not be mirrored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub task_id: String,
    pub error: String,
}

/// Outcome of a bulk sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub created: Vec<CalendarEvent>,
    pub skipped: Vec<String>,
    pub errors: Vec<SyncFailure>,
}

/// Store a provider event id on its task. On failure the event exists
/// upstream with nothing pointing at it, so its id is logged.
fn record_event(db: &Database, user: &AuthUser, task_id: &str, event: &CalendarEvent) -> Result<()> {
    db.tasks(user)
        .set_calendar_event_id(task_id, &event.id)
        .map_err(|e| {
            warn!(
                task_id = %task_id,
                event_id = %event.id,
                error = %e,
                "Calendar event created but not recorded on the task"
            );
            e
        })
        .map(|_| ())
}

/// Create an event for one task and store the event id on it.
pub async fn mirror_task(
    provider: &dyn CalendarProvider,
    db: &Database,
    user: &AuthUser,
    credentials: &CalendarCredentials,
    task_id: &str,
) -> Result<CalendarEvent> {
    let task = db.tasks(user).get(task_id)?;
    let event = provider.create_event_from_task(credentials, &task).await?;
    record_event(db, user, &task.id, &event)?;
    info!(task_id = %task.id, event_id = %event.id, "Mirrored task to calendar");
    Ok(event)
}

/// Mirror every due-dated task that has no event yet.
///
/// Failures are collected per task; one failing task does not stop the
/// rest.
pub async fn sync_tasks(
    provider: &dyn CalendarProvider,
    db: &Database,
    user: &AuthUser,
    credentials: &CalendarCredentials,
) -> Result<SyncReport> {
    let tasks = db.tasks(user).list_with_due_dates()?;
    let mut report = SyncReport::default();

    for task in tasks {
        if task.calendar_event_id.is_some() {
            report.skipped.push(task.id);
            continue;
        }

        let result = match provider.create_event_from_task(credentials, &task).await {
            Ok(event) => record_event(db, user, &task.id, &event).map(|_| event),
            Err(e) => Err(e),
        };

        match result {
            Ok(event) => report.created.push(event),
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "Calendar sync failed for task");
                report.errors.push(SyncFailure {
                    task_id: task.id,
                    error: e.to_string(),
                });
            }
        }
    }

    db.touch_calendar_sync(user.user_id())?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenService;
    use crate::error::{ApiError, ErrorCode};
    use crate::types::{NewTask, Priority};
    use chrono::TimeZone;

    fn task(due: Option<DateTime<Utc>>) -> Task {
        Task {
            id: "t1".into(),
            user_id: Some("u1".into()),
            title: "Dentist".into(),
            completed: false,
            due_date: due,
            priority: Priority::Medium,
            order: 0,
            subtasks: vec![],
            calendar_event_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn draft_starts_at_due_date() {
        let due = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let draft = EventDraft::from_task(&task(Some(due)), "UTC", Utc::now());
        assert_eq!(draft.summary, "Dentist");
        assert_eq!(draft.start.date_time.as_deref(), Some("2026-05-04T09:00:00Z"));
        assert_eq!(draft.end.date_time.as_deref(), Some("2026-05-04T10:00:00Z"));
        assert_eq!(draft.start.time_zone.as_deref(), Some("UTC"));
    }

    #[test]
    fn draft_without_due_date_starts_in_an_hour() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let draft = EventDraft::from_task(&task(None), "America/New_York", now);
        assert_eq!(draft.start.date_time.as_deref(), Some("2026-05-04T10:00:00Z"));
        assert_eq!(draft.end.date_time.as_deref(), Some("2026-05-04T11:00:00Z"));
    }

    #[test]
    fn recording_an_event_on_a_missing_task_fails() {
        let db = Database::open_in_memory().unwrap();
        let tokens = TokenService::new("secret");
        let account = db.register_user("alice", "pw1").unwrap();
        let user = tokens.verify(&tokens.issue(&account.id).unwrap()).unwrap();
        let event = CalendarEvent {
            id: "evt-1".into(),
            summary: None,
            description: None,
            start: None,
            end: None,
            html_link: None,
        };

        let err = record_event(&db, &user, "gone", &event).unwrap_err();
        assert_eq!(ApiError::from(err).code, ErrorCode::NotFound);

        let task = db.tasks(&user).create(NewTask::titled("A")).unwrap();
        record_event(&db, &user, &task.id, &event).unwrap();
        assert_eq!(
            db.tasks(&user).get(&task.id).unwrap().calendar_event_id.as_deref(),
            Some("evt-1")
        );
    }
}
