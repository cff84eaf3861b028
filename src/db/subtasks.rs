//! Subtask edits. Each operation rewrites the parent task inside one
//! transaction; indices refer to the list as stored at that moment.

use super::tasks::{require_owned, write_task};
use super::{TaskScope, now_ms};
use crate::error::ApiError;
use crate::types::{Subtask, SubtaskPatch, Task, new_subtask_id};
use anyhow::Result;
use rusqlite::TransactionBehavior;

impl TaskScope<'_> {
    /// Read-modify-write the parent task under an immediate transaction.
    fn modify_task<F>(&self, task_id: &str, f: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        self.db.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut task = require_owned(&tx, self.owner, task_id)?;
            f(&mut task)?;
            task.updated_at = now_ms();
            write_task(&tx, &task)?;
            tx.commit()?;
            Ok(task)
        })
    }

    /// Append a subtask and return the updated parent.
    pub fn add_subtask(&self, task_id: &str, text: &str) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::missing_field("text").into());
        }

        self.modify_task(task_id, |task| {
            task.subtasks.push(Subtask {
                id: new_subtask_id(),
                text: text.to_string(),
                completed: false,
            });
            Ok(())
        })
    }

    /// Change the supplied fields of the subtask at `index`.
    pub fn update_subtask(&self, task_id: &str, index: usize, patch: SubtaskPatch) -> Result<Task> {
        let text = match patch.text.as_deref().map(str::trim) {
            Some("") => return Err(ApiError::invalid_value("text", "text must not be empty").into()),
            other => other.map(str::to_string),
        };

        self.modify_task(task_id, |task| {
            let subtask = task
                .subtasks
                .get_mut(index)
                .ok_or_else(|| ApiError::subtask_not_found(task_id, &index.to_string()))?;
            if let Some(text) = text {
                subtask.text = text;
            }
            if let Some(completed) = patch.completed {
                subtask.completed = completed;
            }
            Ok(())
        })
    }

    /// Remove the subtask at `index`; later subtasks shift down by one.
    pub fn delete_subtask(&self, task_id: &str, index: usize) -> Result<Task> {
        self.modify_task(task_id, |task| {
            if index >= task.subtasks.len() {
                return Err(ApiError::subtask_not_found(task_id, &index.to_string()).into());
            }
            task.subtasks.remove(index);
            Ok(())
        })
    }
}
