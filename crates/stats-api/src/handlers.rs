use axum::extract::State;
use axum::Json;
use domain::{count_by_status, StatsSnapshot};
use infrastructure::ListQuery;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}

/// コレクション全体（ユーザーで絞り込まない）のステータス別件数
pub async fn task_stats(State(state): State<AppState>) -> Result<Json<StatsSnapshot>, ApiError> {
    let tasks = state.repo.list_tasks(None, &ListQuery::all()).await?;
    let stats = count_by_status(&tasks);

    tracing::info!(
        todo = stats.todo,
        in_progress = stats.in_progress,
        done = stats.done,
        "Computed task stats"
    );
    Ok(Json(stats))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
