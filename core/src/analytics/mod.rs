//! Per-user task analytics
//!
//! Queries live behind [`AnalyticsRepository`]; the numbers and the CSV are computed by
//! the pure functions in `report`.

mod model;
mod report;
mod repository;

pub use model::*;
pub use report::{escape_csv, overview, performance, render_csv, CSV_HEADERS};
pub use repository::{AnalyticsRepository, SqliteAnalytics};

use crate::{Error, Result};

pub async fn user_overview(repo: &dyn AnalyticsRepository, user_id: i64) -> Result<TaskStatistics> {
    let rows = repo.created_by(user_id).await?;
    Ok(overview(&rows))
}

/// Fails with `NotFound` when the user does not exist.
pub async fn user_performance(
    repo: &dyn AnalyticsRepository,
    user_id: i64,
) -> Result<UserPerformance> {
    let rows = repo
        .involving(user_id)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
    Ok(performance(user_id, &rows))
}

/// CSV of the user's tasks. Fails with `NotFound` when there is nothing to export.
pub async fn export_csv(repo: &dyn AnalyticsRepository, user_id: i64) -> Result<String> {
    let rows = repo.export_rows(user_id).await?;
    if rows.is_empty() {
        return Err(Error::NotFound("No tasks found to export".to_string()));
    }
    Ok(render_csv(&rows))
}
