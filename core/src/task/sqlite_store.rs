//! SQLite-backed task storage.

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::debug;

use super::input::{NewTask, TaskPatch};
use super::model::{decode_tags, encode_tags, Task};
use super::query::{Pagination, TaskFilter, TaskPage, TaskSort};
use super::repository::TaskRepository;
use crate::db::{from_millis, like_pattern, now_utc, to_millis, Database};
use crate::{Error, Result};

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, tags, \
     assigned_to, created_by, created_at, updated_at, deleted_at, active";

const INSERT_TASK: &str = "INSERT INTO tasks \
     (title, description, status, priority, due_date, tags, assigned_to, created_by, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)";

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let status: String = row.get("status")?;
    let priority: String = row.get("priority")?;
    let tags: Option<String> = row.get("tags")?;
    let due_date: Option<i64> = row.get("due_date")?;
    let deleted_at: Option<i64> = row.get("deleted_at")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: status.parse().map_err(|err: String| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, err.into())
        })?,
        priority: priority.parse().map_err(|err: String| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, err.into())
        })?,
        due_date: due_date.map(from_millis),
        tags: decode_tags(tags.as_deref()),
        assigned_to: row.get("assigned_to")?,
        created_by: row.get("created_by")?,
        created_at: from_millis(row.get("created_at")?),
        updated_at: from_millis(row.get("updated_at")?),
        deleted_at: deleted_at.map(from_millis),
        active: row.get("active")?,
    })
}

/// Reads any row, active or not. Callers decide what visibility they need.
fn get_task_internal(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
    Ok(conn.query_row(&sql, params![id], parse_task_row).optional()?)
}

fn insert_task(conn: &Connection, input: &NewTask, created_by: i64) -> Result<i64> {
    let now = to_millis(now_utc());
    conn.execute(
        INSERT_TASK,
        params![
            input.title,
            input.description,
            input.status.as_str(),
            input.priority.as_str(),
            input.due_date.map(to_millis),
            encode_tags(input.tags.as_deref())?,
            input.assigned_to,
            created_by,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Re-read a row that was just written. Missing means the write did not stick.
fn reread(conn: &Connection, id: i64, action: &str) -> Result<Task> {
    get_task_internal(conn, id)?
        .ok_or_else(|| Error::Storage(format!("Failed to retrieve {} task {}", action, id)))
}

/// WHERE clause and bound values for a listing filter.
fn build_where(filter: &TaskFilter) -> (String, Vec<Value>) {
    let mut conditions = vec!["active = 1".to_string()];
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        conditions.push("status = ?".to_string());
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(priority) = filter.priority {
        conditions.push("priority = ?".to_string());
        values.push(Value::Text(priority.as_str().to_string()));
    }
    if let Some(assigned_to) = filter.assigned_to {
        conditions.push("assigned_to = ?".to_string());
        values.push(Value::Integer(assigned_to));
    }
    if let Some(search) = filter.search.as_deref() {
        conditions.push(
            "(fold(title) LIKE ? ESCAPE '\\' OR fold(description) LIKE ? ESCAPE '\\')"
                .to_string(),
        );
        let pattern = like_pattern(&search.to_lowercase());
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }

    (format!("WHERE {}", conditions.join(" AND ")), values)
}

/// SET clause and bound values for a patch. `updated_at` is always refreshed.
fn build_set(patch: &TaskPatch) -> Result<(String, Vec<Value>)> {
    let mut updates = Vec::new();
    let mut values = Vec::new();

    if let Some(title) = &patch.title {
        updates.push("title = ?");
        values.push(Value::Text(title.clone()));
    }
    if let Some(description) = &patch.description {
        updates.push("description = ?");
        values.push(
            description
                .clone()
                .filter(|desc| !desc.is_empty())
                .map_or(Value::Null, Value::Text),
        );
    }
    if let Some(status) = patch.status {
        updates.push("status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(priority) = patch.priority {
        updates.push("priority = ?");
        values.push(Value::Text(priority.as_str().to_string()));
    }
    if let Some(due_date) = patch.due_date {
        updates.push("due_date = ?");
        values.push(due_date.map_or(Value::Null, |value| Value::Integer(to_millis(value))));
    }
    if let Some(tags) = &patch.tags {
        updates.push("tags = ?");
        values.push(encode_tags(tags.as_deref())?.map_or(Value::Null, Value::Text));
    }
    if let Some(assigned_to) = patch.assigned_to {
        updates.push("assigned_to = ?");
        values.push(assigned_to.map_or(Value::Null, Value::Integer));
    }

    updates.push("updated_at = ?");
    values.push(Value::Integer(to_millis(now_utc())));

    Ok((updates.join(", "), values))
}

/// Task store on top of the shared SQLite [`Database`].
#[derive(Clone)]
pub struct SqliteTaskStore {
    db: Database,
}

impl SqliteTaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskStore {
    async fn create(&self, input: NewTask, created_by: i64) -> Result<Task> {
        self.db
            .run(move |conn| {
                let id = insert_task(conn, &input, created_by)?;
                let task = reread(conn, id, "created")?;
                debug!(task_id = task.id, created_by, "Task created");
                Ok(task)
            })
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>> {
        self.db
            .run(move |conn| {
                let sql = format!("SELECT {} FROM tasks WHERE id = ?1 AND active = 1", TASK_COLUMNS);
                Ok(conn.query_row(&sql, params![id], parse_task_row).optional()?)
            })
            .await
    }

    async fn find_all(
        &self,
        filter: TaskFilter,
        sort: TaskSort,
        pagination: Pagination,
    ) -> Result<TaskPage> {
        self.db
            .run(move |conn| {
                let (where_clause, values) = build_where(&filter);

                let count_sql = format!("SELECT COUNT(*) FROM tasks {}", where_clause);
                let total: i64 =
                    conn.query_row(&count_sql, params_from_iter(values.iter()), |row| row.get(0))?;

                let page_sql = format!(
                    "SELECT {} FROM tasks {} {} LIMIT ? OFFSET ?",
                    TASK_COLUMNS,
                    where_clause,
                    sort.order_clause()
                );
                let mut page_values = values;
                page_values.push(Value::Integer(i64::from(pagination.limit)));
                page_values.push(Value::Integer(
                    i64::try_from(pagination.offset()).unwrap_or(i64::MAX),
                ));

                let mut stmt = conn.prepare(&page_sql)?;
                let tasks = stmt
                    .query_map(params_from_iter(page_values.iter()), parse_task_row)?
                    .collect::<rusqlite::Result<Vec<Task>>>()?;

                debug!(
                    total,
                    returned = tasks.len(),
                    sort = %sort,
                    page = pagination.page,
                    "Listed tasks"
                );
                Ok(TaskPage {
                    tasks,
                    total: u64::try_from(total).unwrap_or_default(),
                })
            })
            .await
    }

    async fn update(&self, id: i64, patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(Error::NoOpUpdate);
        }

        self.db
            .run(move |conn| {
                let (set_clause, mut values) = build_set(&patch)?;
                values.push(Value::Integer(id));

                let sql = format!("UPDATE tasks SET {} WHERE id = ? AND active = 1", set_clause);
                let affected = conn.execute(&sql, params_from_iter(values.iter()))?;
                if affected == 0 {
                    return Err(Error::TaskNotFound(id));
                }

                reread(conn, id, "updated")
            })
            .await
    }

    async fn soft_delete(&self, id: i64) -> Result<()> {
        self.db
            .run(move |conn| {
                let affected = conn.execute(
                    "UPDATE tasks SET active = 0, deleted_at = ?1 WHERE id = ?2 AND active = 1",
                    params![to_millis(now_utc()), id],
                )?;
                if affected == 0 {
                    return Err(Error::TaskNotFound(id));
                }
                debug!(task_id = id, "Task soft-deleted");
                Ok(())
            })
            .await
    }

    async fn bulk_create(&self, inputs: Vec<NewTask>, created_by: i64) -> Result<Vec<Task>> {
        self.db
            .run(move |conn| {
                let tx = conn.transaction()?;
                let mut ids = Vec::with_capacity(inputs.len());
                for input in &inputs {
                    ids.push(insert_task(&tx, input, created_by)?);
                }
                let tasks = ids
                    .into_iter()
                    .map(|id| reread(&tx, id, "created"))
                    .collect::<Result<Vec<Task>>>()?;
                tx.commit()?;

                debug!(count = tasks.len(), created_by, "Tasks bulk-created");
                Ok(tasks)
            })
            .await
    }
}
