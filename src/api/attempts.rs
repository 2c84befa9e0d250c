use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::schemas::attempt::{
    AttemptDetailResponse, AttemptHistoryEntry, AttemptResponse, AttemptStart, AttemptSubmit,
};
use crate::services::attempt_lifecycle::{self, SubmissionResult};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_attempts).post(start_attempt))
        .route("/:attempt_id", get(get_attempt).put(submit_attempt))
}

async fn start_attempt(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AttemptStart>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let attempt = attempt_lifecycle::start(&state, &user, &payload.exam_id).await?;
    Ok((StatusCode::CREATED, Json(AttemptResponse::from(&attempt))))
}

async fn list_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptHistoryEntry>>, ApiError> {
    let rows = attempt_lifecycle::history(&state, &user).await?;
    Ok(Json(rows.into_iter().map(AttemptHistoryEntry::from).collect()))
}

async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptDetailResponse>, ApiError> {
    let view = attempt_lifecycle::fetch(&state, &user, &attempt_id).await?;
    Ok(Json(AttemptDetailResponse::from(view)))
}

async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AttemptSubmit>,
) -> Result<Json<SubmissionResult>, ApiError> {
    let result = attempt_lifecycle::submit(&state, &user, &attempt_id, &payload.answers).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::UserRole;
    use crate::test_support::{
        bearer_token, insert_exam, insert_question, insert_user, json_request, read_json,
        setup_test_context,
    };

    #[tokio::test]
    async fn full_attempt_flow_over_http() {
        let ctx = setup_test_context().await;
        let instructor = insert_user(ctx.state.db(), "instructor@example.com", UserRole::Instructor).await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;
        let token = bearer_token(&student.id, ctx.state.settings());
        let exam = insert_exam(ctx.state.db(), &instructor.id, 30).await;
        let mut questions = Vec::new();
        for _ in 0..4 {
            questions.push(insert_question(ctx.state.db(), &exam.id, "Right", &["Wrong", "Other"]).await);
        }

        let started = ctx
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/attempts", Some(&token), Some(json!({"examId": exam.id}))))
            .await
            .unwrap();
        assert_eq!(started.status(), StatusCode::CREATED);
        let attempt = read_json(started).await;
        assert_eq!(attempt["status"], "IN_PROGRESS");
        let attempt_uri = format!("/api/v1/attempts/{}", attempt["id"].as_str().unwrap());

        let open = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, &attempt_uri, Some(&token), None))
            .await
            .unwrap();
        let open = read_json(open).await;
        assert_eq!(open["questions"].as_array().unwrap().len(), 4);
        assert!(open["questions"][0]["options"][0].get("isCorrect").is_none());

        let answers: Vec<_> = questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                json!({"questionId": question.id, "selectedOption": if index < 3 { "Right" } else { "Wrong" }})
            })
            .collect();
        let submitted = ctx
            .app
            .clone()
            .oneshot(json_request(Method::PUT, &attempt_uri, Some(&token), Some(json!({"answers": answers}))))
            .await
            .unwrap();
        assert_eq!(submitted.status(), StatusCode::OK);
        let result = read_json(submitted).await;
        assert_eq!(result["score"], 75.0);
        assert_eq!(result["isPassed"], true);
        assert_eq!(result["correctCount"], 3);
        assert_eq!(result["totalQuestions"], 4);

        let resubmitted = ctx
            .app
            .clone()
            .oneshot(json_request(Method::PUT, &attempt_uri, Some(&token), Some(json!({"answers": []}))))
            .await
            .unwrap();
        assert_eq!(resubmitted.status(), StatusCode::CONFLICT);

        let history = ctx
            .app
            .oneshot(json_request(Method::GET, "/api/v1/attempts", Some(&token), None))
            .await
            .unwrap();
        let history = read_json(history).await;
        assert_eq!(history[0]["status"], "COMPLETED");
        assert_eq!(history[0]["examTitle"], "Ownership basics");
    }

    #[tokio::test]
    async fn zero_question_exam_scores_zero() {
        let ctx = setup_test_context().await;
        let instructor = insert_user(ctx.state.db(), "instructor@example.com", UserRole::Instructor).await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;
        let token = bearer_token(&student.id, ctx.state.settings());
        let exam = insert_exam(ctx.state.db(), &instructor.id, 30).await;

        let started = ctx
            .app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/attempts", Some(&token), Some(json!({"exam_id": exam.id}))))
            .await
            .unwrap();
        let attempt = read_json(started).await;

        let submitted = ctx
            .app
            .oneshot(json_request(
                Method::PUT,
                &format!("/api/v1/attempts/{}", attempt["id"].as_str().unwrap()),
                Some(&token),
                Some(json!({"answers": []})),
            ))
            .await
            .unwrap();
        assert_eq!(submitted.status(), StatusCode::OK);
        let result = read_json(submitted).await;
        assert_eq!(result["score"], 0.0);
        assert_eq!(result["isPassed"], false);
        assert_eq!(result["totalQuestions"], 0);
    }

    #[tokio::test]
    async fn unknown_attempt_is_404_and_missing_token_is_401() {
        let ctx = setup_test_context().await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;
        let token = bearer_token(&student.id, ctx.state.settings());

        let missing = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/attempts/does-not-exist", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let anonymous = ctx
            .app
            .oneshot(json_request(Method::GET, "/api/v1/attempts", None, None))
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }
}
