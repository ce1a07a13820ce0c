//! Core library for Taskdesk
//!
//! This crate contains the core business logic, including:
//! - Task storage, filtering, sorting and pagination
//! - The user directory used for assignment checks
//! - Comments, file attachments and per-user analytics

pub mod analytics;
pub mod comment;
pub mod db;
pub mod error;
pub mod file;
pub mod task;
pub mod user;

pub use db::Database;
pub use error::{Error, FieldError, ValidationErrors};
pub type Result<T> = std::result::Result<T, Error>;
