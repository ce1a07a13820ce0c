//! Task attachments
//!
//! Metadata lives in the `files` table; the bytes live in a [`LocalObjectStore`]
//! under the key recorded with each row.

mod model;
mod repository;
mod sanitize;
mod sqlite_store;
mod storage;

pub use model::*;
pub use repository::FileRepository;
pub use sanitize::{sanitize_file_name, sanitize_file_name_with_limit, MAX_FILE_NAME_LEN};
pub use sqlite_store::SqliteFileStore;
pub use storage::LocalObjectStore;
