//! Task comments

mod model;
mod repository;
mod sqlite_store;

pub use model::*;
pub use repository::CommentRepository;
pub use sqlite_store::SqliteCommentStore;
