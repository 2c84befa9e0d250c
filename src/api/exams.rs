use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_exam_owner, require_instructor, CurrentUser};
use crate::core::redis::generation_rate_key;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::exams::ExamScope;
use crate::schemas::analytics::{ExamAttemptEntry, ExamAttemptsResponse, ExamStatsResponse};
use crate::schemas::exam::{ExamCreate, ExamResponse, ExamSummaryResponse};
use crate::schemas::question::{GenerateRequest, GenerateResponse, QuestionCreate, QuestionResponse};
use crate::schemas::topic::TopicResponse;
use crate::services::question_contract::QuestionContract;
use crate::services::question_generation::{topic_context, GenerationRequest};
use crate::services::weak_topics::{class_stats, GradedScore};

const TOP_PERFORMERS_LIMIT: i64 = 5;
const GENERATION_WINDOW_SECONDS: u64 = 60;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_exams).post(create_exam))
        .route("/:exam_id", get(get_exam).delete(delete_exam))
        .route("/:exam_id/questions", get(list_questions).post(add_question))
        .route("/:exam_id/generate", post(generate_questions))
        .route("/:exam_id/stats", get(exam_stats))
        .route("/:exam_id/attempts", get(exam_attempts))
        .route("/:exam_id/top-performers", get(top_performers))
}

async fn exam_topics(state: &AppState, exam_id: &str) -> Result<Vec<TopicResponse>, ApiError> {
    let topics = repositories::topics::list_for_exam(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam topics"))?;
    Ok(topics.into_iter().map(TopicResponse::from).collect())
}

/// Instructors see their own exams, admins see all, everyone else sees published ones.
async fn list_exams(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamSummaryResponse>>, ApiError> {
    let scope = match user.role {
        UserRole::Instructor => ExamScope::OwnedBy(&user.id),
        UserRole::Admin => ExamScope::All,
        UserRole::Student => ExamScope::Published,
    };

    let rows = repositories::exams::list(state.db(), scope)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    Ok(Json(rows.into_iter().map(ExamSummaryResponse::from).collect()))
}

async fn create_exam(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(mut payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    require_instructor(&user)?;
    payload.title = payload.title.trim().to_string();
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    payload.topic_ids.sort();
    payload.topic_ids.dedup();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let known = repositories::topics::count_existing(&mut *tx, &payload.topic_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check topics"))?;
    if known != payload.topic_ids.len() as i64 {
        return Err(ApiError::BadRequest("Unknown topic id in topic_ids".to_string()));
    }

    let exam_id = Uuid::new_v4().to_string();
    let exam = repositories::exams::create(
        &mut *tx,
        repositories::exams::CreateExam {
            id: &exam_id,
            title: &payload.title,
            description: payload.description.as_deref(),
            duration_minutes: payload.duration_minutes,
            passing_score: payload.passing_score,
            is_published: payload.is_published,
            instructor_id: &user.id,
            now: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    repositories::exams::link_topics(&mut *tx, &exam.id, &payload.topic_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to link exam topics"))?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(exam_id = %exam.id, instructor_id = %user.id, "Exam created");

    let topics = exam_topics(&state, &exam.id).await?;
    Ok((StatusCode::CREATED, Json(ExamResponse::new(exam, topics))))
}

async fn get_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamResponse>, ApiError> {
    let exam = repositories::exams::find_by_id(state.db(), &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .filter(|exam| {
            exam.is_published || exam.instructor_id == user.id || user.role == UserRole::Admin
        })
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    let topics = exam_topics(&state, &exam.id).await?;
    Ok(Json(ExamResponse::new(exam, topics)))
}

async fn delete_exam(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;

    repositories::exams::delete_by_id(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;

    tracing::info!(exam_id = %exam.id, deleted_by = %user.id, "Exam deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_questions(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuestionResponse>>, ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;

    let questions = repositories::questions::list_by_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list questions"))?;

    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

async fn add_question(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;
    let draft = QuestionContract::authored().admit(payload.into())?;

    let question = repositories::questions::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &exam.id,
        &draft,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    Ok((StatusCode::CREATED, Json(QuestionResponse::from(question))))
}

async fn generate_questions(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if payload.topic.trim().is_empty() {
        return Err(ApiError::BadRequest("topic must not be empty".to_string()));
    }

    let limit = state.settings().generation().rate_limit_per_minute;
    let allowed = match state
        .redis()
        .rate_limit(&generation_rate_key(&user.id), limit, GENERATION_WINDOW_SECONDS)
        .await
    {
        Ok(allowed) => allowed,
        Err(err) => {
            tracing::error!(error = %err, instructor_id = %user.id, "Failed to check generation rate limit");
            true
        }
    };
    if !allowed {
        return Err(ApiError::TooManyRequests("Generation rate limit exceeded, try again in a minute"));
    }

    let request = GenerationRequest {
        topic_context: topic_context(&payload.topic, payload.syllabus.as_deref()),
        count: payload.count,
        difficulty: payload.difficulty,
    };
    let batch = state.generator().generate_questions(&request).await?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    for draft in &batch.questions {
        repositories::questions::create(&mut *tx, &Uuid::new_v4().to_string(), &exam.id, draft, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to store generated question"))?;
    }
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        exam_id = %exam.id,
        model = %batch.model,
        stored = batch.questions.len(),
        dropped = batch.dropped,
        "Generated questions stored"
    );

    Ok(Json(GenerateResponse {
        success: true,
        count: batch.questions.len(),
        dropped: batch.dropped,
        model: batch.model,
    }))
}

async fn exam_stats(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamStatsResponse>, ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;

    let scores = repositories::attempts::graded_scores_for_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam scores"))?
        .into_iter()
        .map(|(score, is_passed)| GradedScore { score, is_passed })
        .collect::<Vec<_>>();
    let topics = exam_topics(&state, &exam.id).await?.into_iter().map(|topic| topic.name).collect();

    let stats = class_stats(&scores, topics, state.settings().exam().weak_topic_threshold);
    Ok(Json(ExamStatsResponse { exam_id: exam.id, stats }))
}

async fn exam_attempts(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ExamAttemptsResponse>, ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;

    let attempts = repositories::attempts::graded_for_exam(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam attempts"))?;
    let topics = exam_topics(&state, &exam.id).await?.into_iter().map(|topic| topic.name).collect();

    Ok(Json(ExamAttemptsResponse {
        exam_id: exam.id,
        topics,
        attempts: attempts.into_iter().map(ExamAttemptEntry::from).collect(),
    }))
}

async fn top_performers(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ExamAttemptEntry>>, ApiError> {
    let exam = require_exam_owner(&state, &user, &exam_id).await?;

    let rows = repositories::attempts::top_for_exam(state.db(), &exam.id, TOP_PERFORMERS_LIMIT)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch top performers"))?;

    Ok(Json(rows.into_iter().map(ExamAttemptEntry::from).collect()))
}
