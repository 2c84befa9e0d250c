use axum::{extract::State, routing::get, Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::{require_instructor, CurrentUser};
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::analytics::ExamHistoryEntry;
use crate::services::weak_topics::{exam_history, ExamActivity};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/exams-history", get(exams_history))
}

async fn exams_history(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamHistoryEntry>>, ApiError> {
    require_instructor(&user)?;

    let rows = repositories::exams::activity_for_instructor(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam history"))?;
    let exams = rows.into_iter().map(ExamActivity::from).collect();

    Ok(Json(exam_history(exams).into_iter().map(ExamHistoryEntry::from).collect()))
}
