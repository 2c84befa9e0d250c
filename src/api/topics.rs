use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_instructor, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::topic::{TopicCreate, TopicResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_topics).post(create_topic))
}

async fn list_topics(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TopicResponse>>, ApiError> {
    let topics = repositories::topics::list(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list topics"))?;

    Ok(Json(topics.into_iter().map(TopicResponse::from).collect()))
}

async fn create_topic(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(mut payload): Json<TopicCreate>,
) -> Result<(StatusCode, Json<TopicResponse>), ApiError> {
    require_instructor(&user)?;
    payload.name = payload.name.trim().to_string();
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let topic = repositories::topics::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &payload.name,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create topic"))?
    .ok_or_else(|| ApiError::Conflict(format!("Topic '{}' already exists", payload.name)))?;

    tracing::info!(topic_id = %topic.id, name = %topic.name, created_by = %user.id, "Topic created");
    Ok((StatusCode::CREATED, Json(TopicResponse::from(topic))))
}
