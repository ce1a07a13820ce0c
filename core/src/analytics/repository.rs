use async_trait::async_trait;
use rusqlite::{params, Row};

use super::model::{ExportRow, TaskFacts};
use crate::db::{from_millis, Database};
use crate::task::decode_tags;
use crate::Result;

/// Read-only queries feeding the analytics reports. Only active tasks are considered.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    /// Tasks created by the user.
    async fn created_by(&self, user_id: i64) -> Result<Vec<TaskFacts>>;

    /// Tasks created by or assigned to the user, or `None` when the user does not exist.
    async fn involving(&self, user_id: i64) -> Result<Option<Vec<TaskFacts>>>;

    /// Export rows for the user's created tasks, newest first.
    async fn export_rows(&self, user_id: i64) -> Result<Vec<ExportRow>>;
}

fn text_enum<T: std::str::FromStr<Err = String>>(row: &Row, idx: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err: String| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, err.into())
    })
}

fn parse_facts(row: &Row) -> rusqlite::Result<TaskFacts> {
    Ok(TaskFacts {
        id: row.get("id")?,
        created_by: row.get("created_by")?,
        assigned_to: row.get("assigned_to")?,
        status: text_enum(row, "status")?,
        priority: text_enum(row, "priority")?,
    })
}

fn parse_export_row(row: &Row) -> rusqlite::Result<ExportRow> {
    let due_date: Option<i64> = row.get("due_date")?;
    let tags: Option<String> = row.get("tags")?;
    Ok(ExportRow {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: text_enum(row, "status")?,
        priority: text_enum(row, "priority")?,
        due_date: due_date.map(from_millis),
        tags: decode_tags(tags.as_deref()),
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
        created_by_email: row.get("created_by_email")?,
        created_by_name: row.get("created_by_name")?,
        assigned_to_email: row.get("assigned_to_email")?,
        assigned_to_name: row.get("assigned_to_name")?,
    })
}

#[derive(Clone)]
pub struct SqliteAnalytics {
    db: Database,
}

impl SqliteAnalytics {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AnalyticsRepository for SqliteAnalytics {
    async fn created_by(&self, user_id: i64) -> Result<Vec<TaskFacts>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, created_by, assigned_to, status, priority FROM tasks \
                     WHERE active = 1 AND created_by = ?1",
                )?;
                let rows = stmt
                    .query_map(params![user_id], parse_facts)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }

    async fn involving(&self, user_id: i64) -> Result<Option<Vec<TaskFacts>>> {
        self.db
            .run(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                    params![user_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Ok(None);
                }

                let mut stmt = conn.prepare(
                    "SELECT id, created_by, assigned_to, status, priority FROM tasks \
                     WHERE (created_by = ?1 OR assigned_to = ?1) AND active = 1",
                )?;
                let rows = stmt
                    .query_map(params![user_id], parse_facts)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(Some(rows))
            })
            .await
    }

    async fn export_rows(&self, user_id: i64) -> Result<Vec<ExportRow>> {
        self.db
            .run(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.id, t.title, t.description, t.status, t.priority, t.due_date, t.tags, \
                            t.created_at, t.updated_at, \
                            u1.email AS created_by_email, u1.full_name AS created_by_name, \
                            u2.email AS assigned_to_email, u2.full_name AS assigned_to_name \
                     FROM tasks t \
                     LEFT JOIN users u1 ON t.created_by = u1.id \
                     LEFT JOIN users u2 ON t.assigned_to = u2.id \
                     WHERE t.active = 1 AND t.created_by = ?1 \
                     ORDER BY t.created_at DESC, t.id DESC",
                )?;
                let rows = stmt
                    .query_map(params![user_id], parse_export_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
    }
}
