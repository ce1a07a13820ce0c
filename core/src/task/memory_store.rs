//! In-memory task storage implementation
//!
//! Same visibility and soft-delete rules as the SQLite store, without a database.
//! Used as a substitute repository in tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::input::{NewTask, TaskPatch};
use super::model::Task;
use super::query::{Pagination, TaskFilter, TaskPage, TaskSort};
use super::repository::TaskRepository;
use crate::db::now_utc;
use crate::{Error, Result};

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    tasks: BTreeMap<i64, Task>,
}

impl MemoryState {
    fn insert(&mut self, input: NewTask, created_by: i64) -> Task {
        self.next_id += 1;
        let now = now_utc();
        let task = Task {
            id: self.next_id,
            title: input.title,
            description: input.description,
            status: input.status,
            priority: input.priority,
            due_date: input.due_date,
            tags: input.tags.filter(|tags| !tags.is_empty()),
            assigned_to: input.assigned_to,
            created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            active: true,
        };
        self.tasks.insert(task.id, task.clone());
        task
    }

    fn active_mut(&mut self, id: i64) -> Option<&mut Task> {
        self.tasks.get_mut(&id).filter(|task| task.active)
    }
}

/// Task store holding every row, including soft-deleted ones, in memory
#[derive(Default)]
pub struct MemoryTaskStore {
    state: RwLock<MemoryState>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, soft-deleted ones included.
    pub async fn row_count(&self) -> usize {
        self.state.read().await.tasks.len()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskStore {
    async fn create(&self, input: NewTask, created_by: i64) -> Result<Task> {
        let mut state = self.state.write().await;
        Ok(state.insert(input, created_by))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.get(&id).filter(|task| task.active).cloned())
    }

    async fn find_all(
        &self,
        filter: TaskFilter,
        sort: TaskSort,
        pagination: Pagination,
    ) -> Result<TaskPage> {
        let state = self.state.read().await;
        let mut matching: Vec<&Task> = state
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .collect();
        matching.sort_by(|left, right| sort.compare(left, right));

        let total = matching.len() as u64;
        let offset = usize::try_from(pagination.offset()).unwrap_or(usize::MAX);
        let tasks = matching
            .into_iter()
            .skip(offset)
            .take(pagination.limit as usize)
            .cloned()
            .collect();

        Ok(TaskPage { tasks, total })
    }

    async fn update(&self, id: i64, patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(Error::NoOpUpdate);
        }

        let mut state = self.state.write().await;
        let task = state.active_mut(id).ok_or(Error::TaskNotFound(id))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description.filter(|desc| !desc.is_empty());
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = patch.tags {
            task.tags = tags.filter(|tags| !tags.is_empty());
        }
        if let Some(assigned_to) = patch.assigned_to {
            task.assigned_to = assigned_to;
        }
        task.updated_at = now_utc();

        Ok(task.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        let mut state = self.state.write().await;
        let task = state.active_mut(id).ok_or(Error::TaskNotFound(id))?;
        task.active = false;
        task.deleted_at = Some(now_utc());
        Ok(())
    }

    async fn bulk_create(&self, inputs: Vec<NewTask>, created_by: i64) -> Result<Vec<Task>> {
        let mut state = self.state.write().await;
        Ok(inputs
            .into_iter()
            .map(|input| state.insert(input, created_by))
            .collect())
    }
}
