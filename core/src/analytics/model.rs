//! Analytics rows and report shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::task::{TaskPriority, TaskStatus};

/// The slice of a task that statistics are computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFacts {
    pub id: i64,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
}

/// Counts over the tasks a user created.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatistics {
    pub total: u64,
    pub by_status: BTreeMap<TaskStatus, u64>,
    pub by_priority: BTreeMap<TaskPriority, u64>,
}

/// Metrics over the tasks a user created or is assigned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPerformance {
    pub user_id: i64,
    pub total_tasks: u64,
    pub tasks_created: u64,
    pub tasks_assigned: u64,
    pub tasks_completed: u64,
    /// Percentage of completed tasks, rounded to two decimals.
    pub completion_rate: f64,
    pub tasks_by_status: BTreeMap<TaskStatus, u64>,
    pub tasks_by_priority: BTreeMap<TaskPriority, u64>,
}

/// A task joined with the names and emails of its creator and assignee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_email: Option<String>,
    pub created_by_name: Option<String>,
    pub assigned_to_email: Option<String>,
    pub assigned_to_name: Option<String>,
}
