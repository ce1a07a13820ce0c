//! Comment endpoints. Only the author may edit or remove a comment.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use chrono::SecondsFormat;
use serde::Serialize;
use taskdesk_core::comment::{Comment, CommentInput};
use tracing::info;

use super::{
    core_error, current_user, forbidden, json_body, not_found, parse_id, require_task,
    RouteError,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub active: bool,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            task_id: comment.task_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: comment
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: comment
                .updated_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            active: comment.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// The comment, provided `user_id` wrote it.
async fn owned_comment(
    state: &AppState,
    id: i64,
    user_id: i64,
    action: &str,
) -> Result<Comment, RouteError> {
    let comment = state
        .comments()
        .find_by_id(id)
        .await
        .map_err(core_error)?
        .ok_or_else(|| not_found("Comment not found"))?;
    if comment.user_id != user_id {
        return Err(forbidden(format!("You can only {} your own comments", action)));
    }
    Ok(comment)
}

async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<Json<CommentListResponse>, RouteError> {
    current_user(&state, &headers)?;
    let task_id = parse_id(&task_id, "task")?;
    require_task(&state, task_id).await?;

    let comments = state
        .comments()
        .find_by_task(task_id)
        .await
        .map_err(core_error)?;

    Ok(Json(CommentListResponse {
        comments: comments.into_iter().map(CommentResponse::from).collect(),
    }))
}

async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    body: Result<Json<CommentInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentResponse>), RouteError> {
    let user_id = current_user(&state, &headers)?;
    let task_id = parse_id(&task_id, "task")?;
    let content = json_body(body)?.validate().map_err(core_error)?;
    require_task(&state, task_id).await?;

    let comment = state
        .comments()
        .create(task_id, user_id, content)
        .await
        .map_err(core_error)?;
    info!("User {} commented on task {}", user_id, task_id);

    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

async fn update_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<CommentInput>, JsonRejection>,
) -> Result<Json<CommentResponse>, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let id = parse_id(&id, "comment")?;
    let content = json_body(body)?.validate().map_err(core_error)?;
    owned_comment(&state, id, user_id, "update").await?;

    let comment = state
        .comments()
        .update(id, content)
        .await
        .map_err(core_error)?;
    Ok(Json(CommentResponse::from(comment)))
}

async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let id = parse_id(&id, "comment")?;
    owned_comment(&state, id, user_id, "delete").await?;

    state.comments().soft_delete(id).await.map_err(core_error)?;
    info!("User {} deleted comment {}", user_id, id);

    Ok(Json(MessageResponse {
        message: "Comment deleted successfully",
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tasks/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .route(
            "/api/comments/{id}",
            put(update_comment).delete(delete_comment),
        )
}
