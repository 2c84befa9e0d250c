use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::attempt_lifecycle::AttemptError;
use crate::services::question_contract::{ContractError, ContractViolation};
use crate::services::question_generation::GenerationError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<ContractViolation>,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    InvalidQuestion(ContractError),
    NotFound(String),
    Conflict(String),
    TooManyRequests(&'static str),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::ExamNotFound => Self::NotFound("Exam not found".to_string()),
            AttemptError::NotFound => Self::NotFound("Attempt not found".to_string()),
            AttemptError::Forbidden => Self::Forbidden("Attempt belongs to another student"),
            AttemptError::AlreadySubmitted => {
                Self::Conflict("Attempt was already submitted".to_string())
            }
            err @ AttemptError::DeadlinePassed { .. } => Self::BadRequest(err.to_string()),
            AttemptError::Database(err) => Self::internal(err, "Failed to process attempt"),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let GenerationError::Unavailable { attempts } = &err;
        for attempt in attempts {
            tracing::warn!(model = %attempt.model, reason = %attempt.reason, "Generation attempt failed");
        }
        Self::ServiceUnavailable(
            "AI question generation is currently unavailable. Please add questions manually or try again later."
                .to_string(),
        )
    }
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        Self::InvalidQuestion(err)
    }
}

fn render(status: StatusCode, detail: String, violations: Vec<ContractViolation>) -> Response {
    (status, Json(ErrorResponse { status: status.as_u16(), detail, violations })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                let mut response =
                    render(StatusCode::UNAUTHORIZED, message.to_string(), Vec::new());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Forbidden(message) => {
                render(StatusCode::FORBIDDEN, message.to_string(), Vec::new())
            }
            ApiError::BadRequest(message) => render(StatusCode::BAD_REQUEST, message, Vec::new()),
            ApiError::InvalidQuestion(err) => {
                render(StatusCode::BAD_REQUEST, err.to_string(), err.violations)
            }
            ApiError::NotFound(message) => render(StatusCode::NOT_FOUND, message, Vec::new()),
            ApiError::Conflict(message) => render(StatusCode::CONFLICT, message, Vec::new()),
            ApiError::TooManyRequests(message) => {
                render(StatusCode::TOO_MANY_REQUESTS, message.to_string(), Vec::new())
            }
            ApiError::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                render(StatusCode::SERVICE_UNAVAILABLE, message, Vec::new())
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                render(StatusCode::INTERNAL_SERVER_ERROR, message, Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    use crate::services::question_generation::ModelAttempt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn already_submitted_maps_to_conflict() {
        let response = ApiError::from(AttemptError::AlreadySubmitted).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn contract_error_lists_every_violation() {
        let err = ContractError {
            violations: vec![
                ContractViolation::NoCorrectOption,
                ContractViolation::TextTooShort { min: 5, actual: 2 },
            ],
        };

        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["violations"].as_array().unwrap().len(), 2);
        assert_eq!(body["violations"][0]["rule"], "no_correct_option");
        assert_eq!(body["violations"][1]["min"], 5);
    }

    #[tokio::test]
    async fn generation_unavailable_suggests_manual_entry() {
        let err = GenerationError::Unavailable {
            attempts: vec![ModelAttempt { model: "a".to_string(), reason: "timeout".to_string() }],
        };

        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("manually"));
        assert!(body.get("violations").is_none());
    }

    #[tokio::test]
    async fn unauthorized_sets_bearer_challenge() {
        let response = ApiError::Unauthorized("Invalid authentication credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
