//! File model and upload rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest accepted file, in bytes.
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

pub const MAX_FILES_PER_UPLOAD: usize = 10;

/// Accepted on top of every `image/*` and `video/*` type.
const ALLOWED_MIME_TYPES: &[&str] = &[
    "text/csv",
    "application/csv",
    "text/comma-separated-values",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Metadata of an uploaded file. Shares the soft-delete shape of [`crate::task::Task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    /// Sanitized name, used in the storage key and for downloads.
    pub file_name: String,
    /// Name as sent by the client.
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// A file whose bytes are already in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub task_id: i64,
    pub user_id: i64,
    pub file_name: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: Option<String>,
    pub storage_key: String,
}

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
        || mime_type.starts_with("video/")
        || ALLOWED_MIME_TYPES.contains(&mime_type)
}

pub fn check_mime_type(mime_type: &str) -> Result<()> {
    if is_allowed_mime_type(mime_type) {
        return Ok(());
    }
    Err(Error::Upload(format!(
        "File type {} is not allowed. Allowed types: CSV, Images, Word documents, and Videos",
        mime_type
    )))
}

pub fn check_file_size(size: usize) -> Result<()> {
    if size > MAX_FILE_SIZE {
        return Err(Error::Upload("File size exceeds the 10MB limit".to_string()));
    }
    Ok(())
}

pub fn check_file_count(count: usize) -> Result<()> {
    if count > MAX_FILES_PER_UPLOAD {
        return Err(Error::Upload(format!(
            "Too many files. Maximum {} files allowed",
            MAX_FILES_PER_UPLOAD
        )));
    }
    Ok(())
}

/// Object key for the `position`-th file of one upload, e.g.
/// `tasks/4/users/7/1767225600000_0_report.csv`.
pub fn storage_key(
    task_id: i64,
    user_id: i64,
    file_name: &str,
    uploaded_at: DateTime<Utc>,
    position: usize,
) -> String {
    format!(
        "tasks/{}/users/{}/{}_{}_{}",
        task_id,
        user_id,
        uploaded_at.timestamp_millis(),
        position,
        file_name
    )
}
