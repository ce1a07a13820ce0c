//! Task API endpoints
//!
//! RESTful API for task CRUD operations. Every route needs a bearer token.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use taskdesk_core::task::{
    bulk_create_assigned, BulkCreateTasksInput, CreateTaskInput, Task, TaskListQuery, TaskPriority, TaskStatus,
    UpdateTaskInput,
};
use taskdesk_core::user::ensure_assignable;
use tracing::info;

use super::{
    core_error, current_user, json_body, not_found, parse_id, query_params, RouteError,
};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<i64>,
    pub created_by: i64,
    pub created_at: String,
    pub updated_at: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResponse {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub pagination: PaginationResponse,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResponse {
    pub message: String,
    pub tasks: Vec<TaskResponse>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date.map(timestamp),
            tags: task.tags,
            assigned_to: task.assigned_to,
            created_by: task.created_by,
            created_at: timestamp(task.created_at),
            updated_at: timestamp(task.updated_at),
            active: task.active,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/tasks - Filtered, sorted page of tasks
async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<TaskListQuery>, QueryRejection>,
) -> Result<Json<TaskListResponse>, RouteError> {
    current_user(&state, &headers)?;
    let params = query_params(query)?.validate().map_err(core_error)?;
    let pagination = params.pagination;

    let page = state
        .tasks()
        .find_all(params.filter, params.sort, pagination)
        .await
        .map_err(core_error)?;
    let total_pages = page.total_pages(pagination.limit);

    Ok(Json(TaskListResponse {
        tasks: page.tasks.into_iter().map(TaskResponse::from).collect(),
        pagination: PaginationResponse {
            page: pagination.page,
            limit: pagination.limit,
            total: page.total,
            total_pages,
        },
    }))
}

/// POST /api/tasks - Create a new task
async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateTaskInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskResponse>), RouteError> {
    let user_id = current_user(&state, &headers)?;
    let input = json_body(body)?.validate().map_err(core_error)?;

    if let Some(assignee) = input.assigned_to {
        ensure_assignable(state.users(), &[assignee])
            .await
            .map_err(core_error)?;
    }

    let task = state
        .tasks()
        .create(input, user_id)
        .await
        .map_err(core_error)?;
    info!("User {} created task {}", user_id, task.id);

    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// POST /api/tasks/bulk - Create up to 100 tasks at once
async fn bulk_create_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<BulkCreateTasksInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BulkCreateResponse>), RouteError> {
    let user_id = current_user(&state, &headers)?;
    let inputs = json_body(body)?.validate().map_err(core_error)?;

    let tasks = bulk_create_assigned(state.tasks(), state.users(), inputs, user_id)
        .await
        .map_err(core_error)?;
    info!("User {} bulk created {} task(s)", user_id, tasks.len());

    Ok((
        StatusCode::CREATED,
        Json(BulkCreateResponse {
            message: format!("Successfully created {} task(s)", tasks.len()),
            tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        }),
    ))
}

/// GET /api/tasks/{id} - Get a single task
async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, RouteError> {
    current_user(&state, &headers)?;
    let id = parse_id(&id, "task")?;

    state
        .tasks()
        .find_by_id(id)
        .await
        .map_err(core_error)?
        .map(|task| Json(TaskResponse::from(task)))
        .ok_or_else(|| not_found("Task not found"))
}

/// PUT /api/tasks/{id} - Partial update
async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<UpdateTaskInput>, JsonRejection>,
) -> Result<Json<TaskResponse>, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let id = parse_id(&id, "task")?;
    let patch = json_body(body)?.validate().map_err(core_error)?;

    if let Some(Some(assignee)) = patch.assigned_to {
        ensure_assignable(state.users(), &[assignee])
            .await
            .map_err(core_error)?;
    }

    let task = state
        .tasks()
        .update(id, patch)
        .await
        .map_err(core_error)?;
    info!("User {} updated task {}", user_id, id);

    Ok(Json(TaskResponse::from(task)))
}

/// DELETE /api/tasks/{id} - Soft delete
async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let id = parse_id(&id, "task")?;

    state.tasks().soft_delete(id).await.map_err(core_error)?;
    info!("User {} deleted task {}", user_id, id);

    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/bulk", post(bulk_create_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::testing::build_app;

    #[tokio::test]
    async fn task_lifecycle_over_http() {
        let app = build_app();
        let (token, user_id) = app.sign_up("ann@example.com", "Ann Bee").await;

        let (status, created) = app
            .send(
                "POST",
                "/api/tasks",
                Some(&token),
                Some(json!({ "title": "Ship release", "priority": "high" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        assert_eq!(created["priority"], "high");
        assert_eq!(created["createdBy"], user_id);
        assert!(created["tags"].is_null());
        assert!(created["assignedTo"].is_null());
        let uri = format!("/api/tasks/{}", created["id"]);

        let (status, updated) = app
            .send(
                "PUT",
                &uri,
                Some(&token),
                Some(json!({ "tags": ["infra", "urgent"] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["tags"], json!(["infra", "urgent"]));
        assert_eq!(updated["title"], "Ship release");

        let (status, deleted) = app.send("DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["message"], "Task deleted successfully");

        let (status, _) = app.send("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.send("DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tasks_require_a_token() {
        let app = build_app();
        let (status, payload) = app.send("GET", "/api/tasks", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload["message"], "Authentication token missing");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_with_field_errors() {
        let app = build_app();
        let (token, _) = app.sign_up("ann@example.com", "Ann Bee").await;

        let (status, payload) = app
            .send(
                "POST",
                "/api/tasks",
                Some(&token),
                Some(json!({ "title": "", "status": "done" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["errors"][0]["field"], "title");
        assert_eq!(payload["errors"][1]["field"], "status");

        let (status, payload) = app
            .send("GET", "/api/tasks/abc", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["message"], "Invalid task ID");

        let (status, _) = app
            .send("GET", "/api/tasks?limit=500", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let app = build_app();
        let (token, _) = app.sign_up("ann@example.com", "Ann Bee").await;
        let (_, created) = app
            .send("POST", "/api/tasks", Some(&token), Some(json!({ "title": "A" })))
            .await;

        let (status, payload) = app
            .send(
                "PUT",
                &format!("/api/tasks/{}", created["id"]),
                Some(&token),
                Some(json!({})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["message"], "No valid updates provided");
    }

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let app = build_app();
        let (token, _) = app.sign_up("ann@example.com", "Ann Bee").await;
        for (title, priority) in [("a", "low"), ("b", "high"), ("c", "high"), ("d", "urgent")] {
            app.send(
                "POST",
                "/api/tasks",
                Some(&token),
                Some(json!({ "title": title, "priority": priority })),
            )
            .await;
        }

        let (status, payload) = app
            .send(
                "GET",
                "/api/tasks?priority=high&limit=1&page=2&sortBy=title&sortOrder=asc",
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["tasks"].as_array().unwrap().len(), 1);
        assert_eq!(payload["tasks"][0]["title"], "c");
        assert_eq!(
            payload["pagination"],
            json!({ "page": 2, "limit": 1, "total": 2, "totalPages": 2 })
        );
    }

    #[tokio::test]
    async fn bulk_with_unknown_assignee_creates_nothing() {
        let app = build_app();
        let (token, user_id) = app.sign_up("ann@example.com", "Ann Bee").await;

        let (status, payload) = app
            .send(
                "POST",
                "/api/tasks/bulk",
                Some(&token),
                Some(json!({ "tasks": [
                    { "title": "one", "assignedTo": user_id },
                    { "title": "two", "assignedTo": 9999 }
                ] })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(payload["message"].as_str().unwrap().contains("9999"));

        let (_, listing) = app.send("GET", "/api/tasks", Some(&token), None).await;
        assert_eq!(listing["pagination"]["total"], 0);

        let (status, payload) = app
            .send(
                "POST",
                "/api/tasks/bulk",
                Some(&token),
                Some(json!({ "tasks": [{ "title": "one" }, { "title": "two" }] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payload["message"], "Successfully created 2 task(s)");
        assert_eq!(payload["tasks"][1]["title"], "two");
    }

    #[tokio::test]
    async fn bulk_with_inactive_assignee_creates_nothing() {
        let app = build_app();
        let (token, _) = app.sign_up("ann@example.com", "Ann Bee").await;
        let (_, dormant) = app.sign_up("bob@example.com", "Bob Cee").await;
        app.state.users().set_active(dormant, false).await.unwrap();

        let (status, payload) = app
            .send(
                "POST",
                "/api/tasks/bulk",
                Some(&token),
                Some(json!({ "tasks": [
                    { "title": "A" },
                    { "title": "B", "assignedTo": dormant },
                    { "title": "C" }
                ] })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            payload["message"],
            format!("Assigned user(s) inactive: {}", dormant)
        );

        let (_, listing) = app.send("GET", "/api/tasks", Some(&token), None).await;
        assert_eq!(listing["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn task_creation_is_throttled() {
        let app = build_app();
        let (token, _) = app.sign_up("ann@example.com", "Ann Bee").await;

        for n in 0..20 {
            let (status, _) = app
                .send(
                    "POST",
                    "/api/tasks",
                    Some(&token),
                    Some(json!({ "title": format!("task {}", n) })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, _) = app
            .send("POST", "/api/tasks", Some(&token), Some(json!({ "title": "one more" })))
            .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let (status, _) = app.send("GET", "/api/tasks", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
