//! Users: registration input, the directory trait and its SQLite store.

mod directory;
mod model;
mod sqlite_store;

pub use directory::{ensure_assignable, UserDirectory};
pub use model::*;
pub use sqlite_store::SqliteUserDirectory;
