//! Task repository trait
//!
//! Defines the interface for task storage operations.

use async_trait::async_trait;

use super::input::{NewTask, TaskPatch};
use super::model::Task;
use super::query::{Pagination, TaskFilter, TaskPage, TaskSort};
use crate::user::{ensure_assignable, UserDirectory};
use crate::Result;

/// Repository interface for task operations.
///
/// Only active tasks are visible: a soft-deleted id behaves exactly like an id that
/// never existed for every method here.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a task owned by `created_by` and return it as stored.
    ///
    /// Any `assigned_to` must already have been checked against the user directory.
    async fn create(&self, input: NewTask, created_by: i64) -> Result<Task>;

    /// Get an active task by ID
    async fn find_by_id(&self, id: i64) -> Result<Option<Task>>;

    /// One page of active tasks matching `filter`, plus the unpaginated match count.
    async fn find_all(
        &self,
        filter: TaskFilter,
        sort: TaskSort,
        pagination: Pagination,
    ) -> Result<TaskPage>;

    /// Apply a partial update.
    ///
    /// Fails with `NoOpUpdate` for an empty patch and `TaskNotFound` when no active
    /// task has this id.
    async fn update(&self, id: i64, patch: TaskPatch) -> Result<Task>;

    /// Mark a task inactive. Deleting an already deleted task fails with `TaskNotFound`.
    async fn soft_delete(&self, id: i64) -> Result<()>;

    /// Insert every task or none, returning them in submission order.
    async fn bulk_create(&self, inputs: Vec<NewTask>, created_by: i64) -> Result<Vec<Task>>;
}

/// Bulk insert after checking every assignee. A missing or inactive assignee
/// rejects the whole batch before anything is written.
pub async fn bulk_create_assigned(
    tasks: &dyn TaskRepository,
    users: &dyn UserDirectory,
    inputs: Vec<NewTask>,
    created_by: i64,
) -> Result<Vec<Task>> {
    let assignees: Vec<i64> = inputs.iter().filter_map(|task| task.assigned_to).collect();
    ensure_assignable(users, &assignees).await?;
    tasks.bulk_create(inputs, created_by).await
}
