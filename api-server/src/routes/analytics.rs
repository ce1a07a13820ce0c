//! Per-user analytics and CSV export.

use axum::{
    extract::{Path, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use taskdesk_core::analytics::{self, TaskStatistics, UserPerformance};

use super::{core_error, current_user, forbidden, parse_id, RouteError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub statistics: TaskStatistics,
}

#[derive(Debug, Serialize)]
pub struct PerformanceResponse {
    pub metrics: UserPerformance,
}

/// GET /api/analytics/overview - Counts over the caller's own tasks
async fn overview(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OverviewResponse>, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let statistics = analytics::user_overview(state.analytics(), user_id)
        .await
        .map_err(core_error)?;
    Ok(Json(OverviewResponse { statistics }))
}

/// GET /api/analytics/users/{userId}/performance
async fn performance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<String>,
) -> Result<Json<PerformanceResponse>, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let target = parse_id(&target, "user")?;
    if target != user_id {
        return Err(forbidden("You can only view your own performance metrics"));
    }

    let metrics = analytics::user_performance(state.analytics(), target)
        .await
        .map_err(core_error)?;
    Ok(Json(PerformanceResponse { metrics }))
}

/// GET /api/analytics/export - CSV download of the caller's tasks
async fn export(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, RouteError> {
    let user_id = current_user(&state, &headers)?;
    let csv = analytics::export_csv(state.analytics(), user_id)
        .await
        .map_err(core_error)?;
    tracing::info!("User {} exported tasks", user_id);

    let disposition = format!(
        "attachment; filename=\"tasks_{}.csv\"",
        Utc::now().timestamp_millis()
    );
    Ok((
        [
            (CONTENT_TYPE, "text/csv".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/overview", get(overview))
        .route("/api/analytics/users/{id}/performance", get(performance))
        .route("/api/analytics/export", get(export))
}
