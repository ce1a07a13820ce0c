//! SQLite-backed file metadata.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::model::{NewFile, StoredFile};
use super::repository::FileRepository;
use crate::db::{from_millis, now_utc, to_millis, Database};
use crate::{Error, Result};

const FILE_COLUMNS: &str = "id, task_id, user_id, file_name, original_name, file_size, \
                            mime_type, storage_key, created_at, deleted_at, active";

fn parse_file_row(row: &Row) -> rusqlite::Result<StoredFile> {
    let deleted_at: Option<i64> = row.get("deleted_at")?;
    Ok(StoredFile {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        file_name: row.get("file_name")?,
        original_name: row.get("original_name")?,
        file_size: row.get("file_size")?,
        mime_type: row.get("mime_type")?,
        storage_key: row.get("storage_key")?,
        created_at: from_millis(row.get("created_at")?),
        deleted_at: deleted_at.map(from_millis),
        active: row.get("active")?,
    })
}

fn get_file(conn: &Connection, id: i64) -> Result<StoredFile> {
    let sql = format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS);
    conn.query_row(&sql, params![id], parse_file_row)
        .optional()?
        .ok_or_else(|| Error::Storage(format!("Failed to retrieve created file {}", id)))
}

#[derive(Clone)]
pub struct SqliteFileStore {
    db: Database,
}

impl SqliteFileStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FileRepository for SqliteFileStore {
    async fn create(&self, file: NewFile) -> Result<StoredFile> {
        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;

                let task_active = tx
                    .query_row(
                        "SELECT 1 FROM tasks WHERE id = ?1 AND active = 1",
                        params![file.task_id],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if !task_active {
                    return Err(Error::TaskNotFound(file.task_id));
                }

                tx.execute(
                    "INSERT INTO files (task_id, user_id, file_name, original_name, file_size, \
                     mime_type, storage_key, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        file.task_id,
                        file.user_id,
                        file.file_name,
                        file.original_name,
                        file.file_size,
                        file.mime_type,
                        file.storage_key,
                        to_millis(now_utc()),
                    ],
                )?;
                let stored = get_file(&tx, tx.last_insert_rowid())?;
                tx.commit()?;

                debug!(file_id = stored.id, task_id = stored.task_id, "File recorded");
                Ok(stored)
            })
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<StoredFile>> {
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM files WHERE id = ?1 AND active = 1",
                    FILE_COLUMNS
                );
                Ok(conn.query_row(&sql, params![id], parse_file_row).optional()?)
            })
            .await
    }

    async fn find_by_task(&self, task_id: i64) -> Result<Vec<StoredFile>> {
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {} FROM files WHERE task_id = ?1 AND active = 1 \
                     ORDER BY created_at DESC, id DESC",
                    FILE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let files = stmt
                    .query_map(params![task_id], parse_file_row)?
                    .collect::<rusqlite::Result<Vec<StoredFile>>>()?;
                Ok(files)
            })
            .await
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        self.db
            .run(move |conn| {
                let affected = conn.execute(
                    "UPDATE files SET active = 0, deleted_at = ?1 WHERE id = ?2 AND active = 1",
                    params![to_millis(now_utc()), id],
                )?;
                if affected == 0 {
                    return Err(Error::FileNotFound(id));
                }
                debug!(file_id = id, "File soft-deleted");
                Ok(())
            })
            .await
    }
}
