//! Task module
//!
//! This module contains task-related types, validation and storage.

mod input;
mod memory_store;
mod model;
mod query;
mod repository;
mod sqlite_store;

pub use input::*;
pub use memory_store::MemoryTaskStore;
pub use model::*;
pub use query::*;
pub use repository::{bulk_create_assigned, TaskRepository};
pub use sqlite_store::SqliteTaskStore;
