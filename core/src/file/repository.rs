use async_trait::async_trait;

use super::model::{NewFile, StoredFile};
use crate::Result;

/// Storage for file metadata. Soft-deleted files are invisible to every method.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Record an upload. Fails with `TaskNotFound` unless the task is active.
    async fn create(&self, file: NewFile) -> Result<StoredFile>;

    async fn find_by_id(&self, id: i64) -> Result<Option<StoredFile>>;

    /// Active files of a task, newest first.
    async fn find_by_task(&self, task_id: i64) -> Result<Vec<StoredFile>>;

    async fn soft_delete(&self, id: i64) -> Result<()>;
}
