use async_trait::async_trait;

use super::model::Comment;
use crate::Result;

/// Storage for task comments. Soft-deleted comments are invisible to every method.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, task_id: i64, user_id: i64, content: String) -> Result<Comment>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Active comments of a task, oldest first.
    async fn find_by_task(&self, task_id: i64) -> Result<Vec<Comment>>;

    /// Replace the content. Fails with `CommentNotFound` when no active comment has this id.
    async fn update(&self, id: i64, content: String) -> Result<Comment>;

    async fn soft_delete(&self, id: i64) -> Result<()>;
}
