//! Ownerless task collection used by the batch-integration client.

use super::{Database, TaskScope};
use crate::auth::IntegrationAccess;
use crate::types::{NewTask, Pagination, Task, TaskPatch};
use anyhow::Result;

/// Operations over tasks with no owning user.
///
/// Only reachable with an [`IntegrationAccess`] proof, so it never shares
/// an access path with bearer-token users.
pub struct LegacyScope<'a> {
    inner: TaskScope<'a>,
}

impl Database {
    pub fn legacy_tasks<'a>(&'a self, _access: &IntegrationAccess) -> LegacyScope<'a> {
        LegacyScope {
            inner: TaskScope {
                db: self,
                owner: None,
            },
        }
    }
}

impl LegacyScope<'_> {
    pub fn list(&self, page: Option<Pagination>) -> Result<Vec<Task>> {
        self.inner.list(page)
    }

    pub fn create(&self, input: NewTask) -> Result<Task> {
        self.inner.create(input)
    }

    pub fn update(&self, task_id: &str, patch: TaskPatch) -> Result<Task> {
        self.inner.update(task_id, patch)
    }

    pub fn delete(&self, task_id: &str) -> Result<Task> {
        self.inner.delete(task_id)
    }
}
