//! Derived views over a loaded task list. Nothing here touches storage.

use crate::types::{StatusFilter, Task, TaskFilter};

/// Tasks matching every criterion of `filter`, in their original order.
pub fn apply(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| matches(task, filter))
        .cloned()
        .collect()
}

/// Whether a single task passes the filter.
pub fn matches(task: &Task, filter: &TaskFilter) -> bool {
    let status_ok = match filter.status {
        StatusFilter::All => true,
        StatusFilter::Completed => task.completed,
        StatusFilter::Incomplete => !task.completed,
    };

    let due_ok = match filter.due_date {
        None => true,
        Some(day) => task.due_day() == Some(day),
    };

    status_ok && filter.priority.matches(task.priority) && due_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, PriorityFilter};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn task(id: &str, completed: bool, priority: Priority, due: Option<(i32, u32, u32)>) -> Task {
        Task {
            id: id.into(),
            user_id: Some("u".into()),
            title: id.into(),
            completed,
            due_date: due.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 15, 30, 0).unwrap()),
            priority,
            order: 0,
            subtasks: vec![],
            calendar_event_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", false, Priority::High, Some((2026, 3, 1))),
            task("b", true, Priority::High, None),
            task("c", false, Priority::Low, Some((2026, 3, 2))),
            task("d", true, Priority::Medium, Some((2026, 3, 1))),
        ]
    }

    #[test]
    fn default_filter_keeps_everything() {
        let tasks = sample();
        assert_eq!(ids(&apply(&tasks, &TaskFilter::default())), ["a", "b", "c", "d"]);
    }

    #[test]
    fn status_filters() {
        let tasks = sample();
        let completed = TaskFilter {
            status: StatusFilter::Completed,
            ..Default::default()
        };
        let incomplete = TaskFilter {
            status: StatusFilter::Incomplete,
            ..Default::default()
        };
        assert_eq!(ids(&apply(&tasks, &completed)), ["b", "d"]);
        assert_eq!(ids(&apply(&tasks, &incomplete)), ["a", "c"]);
    }

    #[test]
    fn criteria_compose_as_conjunction() {
        let tasks = sample();
        let filter = TaskFilter {
            status: StatusFilter::Incomplete,
            priority: PriorityFilter::High,
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        };
        assert_eq!(ids(&apply(&tasks, &filter)), ["a"]);
    }

    #[test]
    fn due_date_matches_calendar_day_only() {
        let tasks = sample();
        let filter = TaskFilter {
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&tasks, &filter)), ["a", "d"]);
    }

    #[test]
    fn apply_does_not_mutate_input() {
        let tasks = sample();
        let before = tasks.clone();
        let filter = TaskFilter {
            priority: PriorityFilter::Low,
            ..Default::default()
        };
        let _ = apply(&tasks, &filter);
        assert_eq!(tasks, before);
    }
}
