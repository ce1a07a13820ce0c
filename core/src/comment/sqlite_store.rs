//! SQLite-backed comment storage.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::model::Comment;
use super::repository::CommentRepository;
use crate::db::{from_millis, now_utc, to_millis, Database};
use crate::{Error, Result};

const COMMENT_COLUMNS: &str =
    "id, task_id, user_id, content, created_at, updated_at, deleted_at, active";

fn parse_comment_row(row: &Row) -> rusqlite::Result<Comment> {
    let deleted_at: Option<i64> = row.get("deleted_at")?;
    Ok(Comment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        content: row.get("content")?,
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
        deleted_at: deleted_at.map(from_millis),
        active: row.get("active")?,
    })
}

fn get_comment(conn: &Connection, id: i64, action: &str) -> Result<Comment> {
    let sql = format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS);
    conn.query_row(&sql, params![id], parse_comment_row)
        .optional()?
        .ok_or_else(|| Error::Storage(format!("Failed to retrieve {} comment {}", action, id)))
}

#[derive(Clone)]
pub struct SqliteCommentStore {
    db: Database,
}

impl SqliteCommentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CommentRepository for SqliteCommentStore {
    async fn create(&self, task_id: i64, user_id: i64, content: String) -> Result<Comment> {
        self.db
            .run(move |conn| {
                let now = to_millis(now_utc());
                conn.execute(
                    "INSERT INTO comments (task_id, user_id, content, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![task_id, user_id, content, now],
                )?;
                let comment = get_comment(conn, conn.last_insert_rowid(), "created")?;
                debug!(comment_id = comment.id, task_id, user_id, "Comment created");
                Ok(comment)
            })
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>> {
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM comments WHERE id = ?1 AND active = 1",
                    COMMENT_COLUMNS
                );
                Ok(conn.query_row(&sql, params![id], parse_comment_row).optional()?)
            })
            .await
    }

    async fn find_by_task(&self, task_id: i64) -> Result<Vec<Comment>> {
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM comments WHERE task_id = ?1 AND active = 1 \
                     ORDER BY created_at ASC, id ASC",
                    COMMENT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let comments = stmt
                    .query_map(params![task_id], parse_comment_row)?
                    .collect::<rusqlite::Result<Vec<Comment>>>()?;
                Ok(comments)
            })
            .await
    }

    async fn update(&self, id: i64, content: String) -> Result<Comment> {
        self.db
            .run(move |conn| {
                let affected = conn.execute(
                    "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3 AND active = 1",
                    params![content, to_millis(now_utc()), id],
                )?;
                if affected == 0 {
                    return Err(Error::CommentNotFound(id));
                }
                get_comment(conn, id, "updated")
            })
            .await
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        self.db
            .run(move |conn| {
                let affected = conn.execute(
                    "UPDATE comments SET active = 0, deleted_at = ?1 WHERE id = ?2 AND active = 1",
                    params![to_millis(now_utc()), id],
                )?;
                if affected == 0 {
                    return Err(Error::CommentNotFound(id));
                }
                debug!(comment_id = id, "Comment soft-deleted");
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{NewTask, SqliteTaskStore, TaskRepository};
    use crate::user::{SqliteUserDirectory, UserDirectory};

    async fn setup() -> (SqliteCommentStore, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = SqliteUserDirectory::new(db.clone())
            .create("author@example.com", "hash", "Author")
            .await
            .unwrap();
        let task = SqliteTaskStore::new(db.clone())
            .create(NewTask::new("Discuss"), user.id)
            .await
            .unwrap();
        (SqliteCommentStore::new(db), task.id, user.id)
    }

    #[tokio::test]
    async fn comments_list_oldest_first() {
        let (store, task_id, user_id) = setup().await;
        let first = store.create(task_id, user_id, "first".into()).await.unwrap();
        let second = store.create(task_id, user_id, "second".into()).await.unwrap();

        let listed = store.find_by_task(task_id).await.unwrap();
        assert_eq!(listed, vec![first, second]);
        assert!(store.find_by_task(task_id + 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_comment_disappears() {
        let (store, task_id, user_id) = setup().await;
        let comment = store.create(task_id, user_id, "bye".into()).await.unwrap();

        store.soft_delete(comment.id).await.unwrap();

        assert!(store.find_by_task(task_id).await.unwrap().is_empty());
        assert_eq!(store.find_by_id(comment.id).await.unwrap(), None);
        assert!(matches!(
            store.soft_delete(comment.id).await,
            Err(Error::CommentNotFound(_))
        ));
        assert!(matches!(
            store.update(comment.id, "again".into()).await,
            Err(Error::CommentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_replaces_content() {
        let (store, task_id, user_id) = setup().await;
        let comment = store.create(task_id, user_id, "draft".into()).await.unwrap();

        let updated = store.update(comment.id, "final".into()).await.unwrap();
        assert_eq!(updated.content, "final");
        assert_eq!(updated.created_at, comment.created_at);
        assert_eq!(updated.task_id, task_id);
    }
}
