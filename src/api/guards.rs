use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::models::{Exam, User};
use crate::db::types::UserRole;
use crate::repositories;

/// Principal resolved from the bearer token.
pub(crate) struct CurrentUser(pub(crate) User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings().security())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = repositories::users::find_by_id(app_state.db(), &claims.sub)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load user"))?;

        user.map(CurrentUser).ok_or(ApiError::Unauthorized("User not found"))
    }
}

pub(crate) fn require_role(user: &User, allowed: &[UserRole]) -> Result<(), ApiError> {
    if user.role == UserRole::Admin || allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not enough permissions"))
    }
}

pub(crate) fn require_instructor(user: &User) -> Result<(), ApiError> {
    require_role(user, &[UserRole::Instructor])
}

/// Loads an exam the caller owns. Admins may act on any exam.
pub(crate) async fn require_exam_owner(
    state: &AppState,
    user: &User,
    exam_id: &str,
) -> Result<Exam, ApiError> {
    require_instructor(user)?;

    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    if exam.instructor_id != user.id && user.role != UserRole::Admin {
        return Err(ApiError::Forbidden("Only the exam's instructor can do this"));
    }

    Ok(exam)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;

    fn user(role: UserRole) -> User {
        User {
            id: "u1".to_string(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role,
            created_at: primitive_now_utc(),
        }
    }

    #[test]
    fn role_checks() {
        assert!(require_instructor(&user(UserRole::Instructor)).is_ok());
        assert!(require_instructor(&user(UserRole::Admin)).is_ok());
        assert!(matches!(require_instructor(&user(UserRole::Student)), Err(ApiError::Forbidden(_))));
        assert!(require_role(&user(UserRole::Student), &[UserRole::Student]).is_ok());
    }
}
