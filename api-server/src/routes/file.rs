//! File attachments on tasks. Only the uploader may remove a file.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use taskdesk_core::file::{
    check_file_count, check_file_size, check_mime_type, sanitize_file_name, storage_key,
    NewFile, StoredFile, MAX_FILES_PER_UPLOAD, MAX_FILE_SIZE,
};
use tracing::{error, info, warn};

use super::{
    bad_request, core_error, current_user, forbidden, not_found, parse_id, require_task,
    RouteError,
};
use crate::state::AppState;

/// Multipart field carrying the files.
const UPLOAD_FIELD: &str = "files";

/// Room for a full upload plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_FILES_PER_UPLOAD * MAX_FILE_SIZE + 1024 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub download_url: Option<String>,
    pub created_at: String,
    pub active: bool,
}

impl From<StoredFile> for FileResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            download_url: Some(format!("/api/files/{}/download", file.id)),
            id: file.id,
            task_id: file.task_id,
            user_id: file.user_id,
            file_name: file.file_name,
            original_name: file.original_name,
            file_size: file.file_size,
            mime_type: file.mime_type,
            created_at: file.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            active: file.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileResponse>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub files: Vec<FileResponse>,
    /// Per-file failures, as `"<original name>: <reason>"`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// One file read from the request body.
struct Upload {
    original_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

fn upload_error(err: MultipartError) -> RouteError {
    bad_request(format!("Upload error: {}", err.body_text()))
}

/// Read and check every file part. Plain form fields are skipped.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, RouteError> {
    let mut uploads = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(upload_error)? {
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if field.name() != Some(UPLOAD_FIELD) {
            return Err(bad_request("Upload error: Unexpected field"));
        }
        check_file_count(uploads.len() + 1).map_err(core_error)?;

        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        check_mime_type(&mime_type).map_err(core_error)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(upload_error)? {
            bytes.extend_from_slice(&chunk);
            check_file_size(bytes.len()).map_err(core_error)?;
        }

        uploads.push(Upload {
            original_name,
            mime_type,
            bytes,
        });
    }

    if uploads.is_empty() {
        return Err(bad_request("No files provided"));
    }
    Ok(uploads)
}

/// Write the bytes, then record the metadata. The object is removed again
/// when the row cannot be written.
async fn store_upload(
    state: &AppState,
    task_id: i64,
    user_id: i64,
    upload: Upload,
    uploaded_at: DateTime<Utc>,
    position: usize,
) -> taskdesk_core::Result<StoredFile> {
    let file_name = sanitize_file_name(&upload.original_name);
    let key = storage_key(task_id, user_id, &file_name, uploaded_at, position);
    state.objects().put(&key, &upload.bytes).await?;

    let recorded = state
        .files()
        .create(NewFile {
            task_id,
            user_id,
            file_name,
            original_name: upload.original_name,
            file_size: upload.bytes.len() as i64,
            mime_type: Some(upload.mime_type),
            storage_key: key.clone(),
        })
        .await;
    if recorded.is_err() {
        if let Err(err) = state.objects().delete(&key).await {
            warn!("Failed to remove orphaned object {}: {}", key, err);
        }
    }
    recorded
}

/// POST /api/files/tasks/{taskId} - Upload up to 10 files to a task
async fn upload_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), RouteError> {
    let user_id = current_user(&state, &headers)?;
    let task_id = parse_id(&task_id, "task")?;
    let multipart = multipart.map_err(|rejection| bad_request(rejection.body_text()))?;
    let uploads = read_uploads(multipart).await?;
    require_task(&state, task_id).await?;

    let uploaded_at = Utc::now();
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for (position, upload) in uploads.into_iter().enumerate() {
        let original_name = upload.original_name.clone();
        match store_upload(&state, task_id, user_id, upload, uploaded_at, position).await {
            Ok(file) => files.push(FileResponse::from(file)),
            Err(err) => {
                warn!("Upload of {:?} to task {} failed: {}", original_name, task_id, err);
                errors.push(format!("{}: {}", original_name, err));
            }
        }
    }

    if files.is_empty() {
        error!("No file of the upload to task {} was stored", task_id);
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(UploadResponse {
                message: "Failed to upload files".to_string(),
                files,
                errors,
            }),
        ));
    }

    info!(
        "User {} uploaded {} file(s) to task {}",
        user_id,
        files.len(),
        task_id
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: format!("Successfully uploaded {} file(s)", files.len()),
            files,
            errors,
        }),
    ))
}

/// GET /api/files/tasks/{taskId} - Files of a task, newest first
async fn list_task_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Result<Json<FileListResponse>, RouteError> {
    current_user(&state, &headers)?;
    let task_id = parse_id(&task_id, "task")?;
    require_task(&state, task_id).await?;

    let files = state
        .files()
        .find_by_task(task_id)
        .await
        .map_err(core_error)?;
    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileResponse::from).collect(),
    }))
}

async fn find_file(state: &AppState, id: i64) -> Result<StoredFile, RouteError> {
    state
        .files()
        .find_by_id(id)
        .await
        .map_err(core_error)?
        .ok_or_else(|| not_found("File not found"))
}

/// GET /api/files/{id}
async fn get_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, RouteError> {
    current_user(&state, &headers)?;
    let id = parse_id(&id, "file")?;
    let file = find_file(&state, id).await?;
    Ok(Json(FileResponse::from(file)))
}

/// `attachment` disposition with a header-safe file name.
fn attachment_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .filter(|ch| (ch.is_ascii_graphic() || *ch == ' ') && !matches!(ch, '"' | '\\'))
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// GET /api/files/{id}/download - The stored bytes
async fn download_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, RouteError> {
    current_user(&state, &headers)?;
    let id = parse_id(&id, "file")?;
    let file = find_file(&state, id).await?;
    let bytes = state
        .objects()
        .get(&file.storage_key)
        .await
        .map_err(core_error)?;

    let content_type = file
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok((
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, attachment_disposition(&file.file_name)),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/files/{id}
async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let id = parse_id(&id, "file")?;
    let file = find_file(&state, id).await?;
    if file.user_id != user_id {
        return Err(forbidden("You can only delete your own files"));
    }

    if let Err(err) = state.objects().delete(&file.storage_key).await {
        warn!("Failed to remove stored bytes of file {}: {}", id, err);
    }
    state.files().soft_delete(id).await.map_err(core_error)?;
    info!("User {} deleted file {}", user_id, id);

    Ok(Json(MessageResponse {
        message: "File deleted successfully",
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/files/tasks/{id}",
            get(list_task_files).post(upload_files),
        )
        .route("/api/files/{id}", get(get_file).delete(delete_file))
        .route("/api/files/{id}/download", get(download_file))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}
