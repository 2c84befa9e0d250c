use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{require_instructor, CurrentUser};
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::analytics::{StudentResultEntry, StudentResultsResponse, StudentWeakTopicsResponse};
use crate::services::question_generation::{PerformanceRecord, Prediction};
use crate::services::weak_topics::{
    fail_rates, failure_counts, instructor_overview, student_summary, AttemptOutcome, ExamActivity,
    InstructorOverview,
};

const PREDICTION_HISTORY_LIMIT: i64 = 5;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/student", get(student_weak_topics))
        .route("/student/results", get(student_results))
        .route("/student/prediction", post(student_prediction))
        .route("/instructor", get(instructor))
}

async fn graded_outcomes(
    state: &AppState,
    user: &User,
    limit: Option<i64>,
) -> Result<Vec<AttemptOutcome>, ApiError> {
    let rows = repositories::attempts::graded_outcomes_for_user(state.db(), &user.id, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch graded attempts"))?;
    Ok(rows.into_iter().map(AttemptOutcome::from).collect())
}

async fn student_weak_topics(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StudentWeakTopicsResponse>, ApiError> {
    let outcomes = graded_outcomes(&state, &user, None).await?;

    Ok(Json(StudentWeakTopicsResponse {
        summary: student_summary(&outcomes),
        weak_topics: failure_counts(&outcomes, state.settings().exam().weak_topic_limit),
    }))
}

async fn student_results(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StudentResultsResponse>, ApiError> {
    let outcomes = graded_outcomes(&state, &user, None).await?;

    Ok(Json(StudentResultsResponse {
        fail_rates: fail_rates(&outcomes),
        results: outcomes.iter().map(StudentResultEntry::from).collect(),
    }))
}

async fn student_prediction(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Prediction>, ApiError> {
    let outcomes = graded_outcomes(&state, &user, Some(PREDICTION_HISTORY_LIMIT)).await?;
    let history: Vec<PerformanceRecord<'_>> = outcomes
        .iter()
        .map(|outcome| PerformanceRecord {
            exam_title: &outcome.exam_title,
            score: outcome.score,
            is_passed: outcome.is_passed,
        })
        .collect();

    Ok(Json(state.generator().predict_performance(&history).await))
}

async fn instructor(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<InstructorOverview>, ApiError> {
    require_instructor(&user)?;

    let rows = repositories::exams::activity_for_instructor(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch instructor activity"))?;
    let exams = rows.into_iter().map(ExamActivity::from).collect();

    Ok(Json(instructor_overview(exams)))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::core::time::primitive_now_utc;
    use crate::db::types::UserRole;
    use crate::test_support::{
        bearer_token, insert_exam, insert_topic, insert_user, json_request, link_topic, read_json,
        setup_test_context,
    };

    async fn graded_attempt(pool: &sqlx::PgPool, user_id: &str, exam_id: &str, score: f64, passed: bool) {
        let now = primitive_now_utc();
        sqlx::query(
            "INSERT INTO exam_attempts (id, user_id, exam_id, started_at, completed_at, score, is_passed) \
             VALUES ($1,$2,$3,$4,$4,$5,$6)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(exam_id)
        .bind(now)
        .bind(score)
        .bind(passed)
        .execute(pool)
        .await
        .expect("insert graded attempt");
    }

    #[tokio::test]
    async fn student_weak_topics_and_fail_rates() {
        let ctx = setup_test_context().await;
        let db = ctx.state.db();
        let instructor = insert_user(db, "instructor@example.com", UserRole::Instructor).await;
        let student = insert_user(db, "student@example.com", UserRole::Student).await;
        let token = bearer_token(&student.id, ctx.state.settings());
        let a = insert_topic(db, "A").await;
        let b = insert_topic(db, "B").await;

        let exam_a = insert_exam(db, &instructor.id, 30).await;
        link_topic(db, &exam_a.id, &a).await;
        let exam_ab = insert_exam(db, &instructor.id, 30).await;
        link_topic(db, &exam_ab.id, &a).await;
        link_topic(db, &exam_ab.id, &b).await;
        let exam_b = insert_exam(db, &instructor.id, 30).await;
        link_topic(db, &exam_b.id, &b).await;

        graded_attempt(db, &student.id, &exam_a.id, 20.0, false).await;
        graded_attempt(db, &student.id, &exam_ab.id, 30.0, false).await;
        graded_attempt(db, &student.id, &exam_b.id, 90.0, true).await;
        graded_attempt(db, &student.id, &exam_b.id, 95.0, true).await;

        let weak = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/analytics/student", Some(&token), None))
            .await
            .unwrap();
        let weak = read_json(weak).await;
        assert_eq!(weak["totalAttempts"], 4);
        assert_eq!(weak["averageScore"], 58.75);
        assert_eq!(weak["weakTopics"], json!([{"name": "A", "count": 2}, {"name": "B", "count": 1}]));

        let results = ctx
            .app
            .oneshot(json_request(Method::GET, "/api/v1/analytics/student/results", Some(&token), None))
            .await
            .unwrap();
        let results = read_json(results).await;
        assert_eq!(results["failRates"][0]["name"], "A");
        assert_eq!(results["failRates"][0]["failRate"], 100.0);
        assert_eq!(results["failRates"][1]["name"], "B");
        assert_eq!(results["results"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn prediction_without_history_is_canned() {
        let ctx = setup_test_context().await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;
        let token = bearer_token(&student.id, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(json_request(Method::POST, "/api/v1/analytics/student/prediction", Some(&token), None))
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body["predictedScore"], 0.0);
        assert_eq!(body["recommendedFocus"], "General Revision");
    }

    #[tokio::test]
    async fn instructor_overview_counts_graded_attempts() {
        let ctx = setup_test_context().await;
        let db = ctx.state.db();
        let instructor = insert_user(db, "instructor@example.com", UserRole::Instructor).await;
        let student = insert_user(db, "student@example.com", UserRole::Student).await;
        let exam = insert_exam(db, &instructor.id, 30).await;
        insert_exam(db, &instructor.id, 30).await;
        graded_attempt(db, &student.id, &exam.id, 40.0, false).await;
        graded_attempt(db, &student.id, &exam.id, 80.0, true).await;

        let token = bearer_token(&instructor.id, ctx.state.settings());
        let response = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/analytics/instructor", Some(&token), None))
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body["totalExams"], 2);
        assert_eq!(body["totalAttempts"], 2);
        assert_eq!(body["averageScore"], 60.0);

        let student_token = bearer_token(&student.id, ctx.state.settings());
        let forbidden = ctx
            .app
            .oneshot(json_request(Method::GET, "/api/v1/analytics/instructor", Some(&student_token), None))
            .await
            .unwrap();
        assert_eq!(forbidden.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
