//! Attempt lifecycle: start, continue, submit exactly once.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{Answer, AttemptState, Exam, ExamAttempt, Question, User};
use crate::db::types::UserRole;
use crate::repositories;
use crate::repositories::attempts::AttemptHistoryRow;
use crate::services::attempt_timing::{accepts_submission, submission_cutoff};
use crate::services::grading::{grade, SubmittedAnswer};

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("Exam not found")]
    ExamNotFound,
    #[error("Attempt not found")]
    NotFound,
    #[error("Attempt belongs to another student")]
    Forbidden,
    #[error("Attempt was already submitted")]
    AlreadySubmitted,
    #[error("Submission window closed at {cutoff}")]
    DeadlinePassed { cutoff: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Everything needed to render or continue an attempt.
#[derive(Debug)]
pub(crate) struct AttemptView {
    pub(crate) attempt: ExamAttempt,
    pub(crate) exam: Exam,
    pub(crate) questions: Vec<Question>,
    pub(crate) answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionResult {
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
    pub(crate) correct_count: usize,
    pub(crate) total_questions: usize,
}

pub(crate) async fn start(
    state: &AppState,
    student: &User,
    exam_id: &str,
) -> Result<ExamAttempt, AttemptError> {
    let exam = repositories::exams::find_by_id(state.db(), exam_id)
        .await?
        .ok_or(AttemptError::ExamNotFound)?;

    let attempt = repositories::attempts::create(
        state.db(),
        &Uuid::new_v4().to_string(),
        &student.id,
        &exam.id,
        primitive_now_utc(),
    )
    .await?;

    tracing::info!(
        attempt_id = %attempt.id,
        exam_id = %exam.id,
        student_id = %student.id,
        "Attempt started"
    );
    Ok(attempt)
}

/// Loads an attempt for its student, the exam's instructor or an admin.
/// Anyone else gets `NotFound` so attempt ids do not leak.
pub(crate) async fn fetch(
    state: &AppState,
    viewer: &User,
    attempt_id: &str,
) -> Result<AttemptView, AttemptError> {
    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await?
        .ok_or(AttemptError::NotFound)?;
    let exam = repositories::exams::find_by_id(state.db(), &attempt.exam_id)
        .await?
        .ok_or(AttemptError::NotFound)?;

    let visible = attempt.user_id == viewer.id
        || exam.instructor_id == viewer.id
        || viewer.role == UserRole::Admin;
    if !visible {
        return Err(AttemptError::NotFound);
    }

    let questions = repositories::questions::list_by_exam(state.db(), &exam.id).await?;
    let answers = repositories::answers::list_by_attempt(state.db(), &attempt.id).await?;

    Ok(AttemptView { attempt, exam, questions, answers })
}

/// Grades and closes an attempt. The attempt row stays locked from the state check
/// until commit, so concurrent submissions of the same attempt grade it once.
pub(crate) async fn submit(
    state: &AppState,
    student: &User,
    attempt_id: &str,
    submitted: &[SubmittedAnswer],
) -> Result<SubmissionResult, AttemptError> {
    let mut tx = state.db().begin().await?;

    let attempt = repositories::attempts::find_for_update(&mut *tx, attempt_id)
        .await?
        .ok_or(AttemptError::NotFound)?;
    if attempt.user_id != student.id {
        return Err(AttemptError::Forbidden);
    }
    if let AttemptState::Graded { .. } = attempt.state() {
        metrics::record_submission("already_submitted");
        return Err(AttemptError::AlreadySubmitted);
    }

    let exam = repositories::exams::find_by_id(&mut *tx, &attempt.exam_id)
        .await?
        .ok_or(AttemptError::NotFound)?;

    let now = primitive_now_utc();
    let grace_seconds = state.settings().exam().submit_grace_seconds;
    if !accepts_submission(attempt.started_at, exam.duration_minutes, grace_seconds, now) {
        metrics::record_submission("deadline_passed");
        let cutoff = submission_cutoff(attempt.started_at, exam.duration_minutes, grace_seconds);
        tracing::warn!(attempt_id = %attempt.id, cutoff = %format_primitive(cutoff), "Late submission rejected");
        return Err(AttemptError::DeadlinePassed { cutoff: format_primitive(cutoff) });
    }

    let questions = repositories::questions::list_by_exam(&mut *tx, &exam.id).await?;
    let outcome = grade(&questions, submitted, exam.passing_score);

    repositories::answers::insert_graded(&mut *tx, &attempt.id, &outcome.answers).await?;
    let stored =
        repositories::attempts::complete(&mut *tx, &attempt.id, outcome.score, outcome.is_passed, now)
            .await?;
    if !stored {
        metrics::record_submission("already_submitted");
        return Err(AttemptError::AlreadySubmitted);
    }

    tx.commit().await?;
    metrics::record_submission("graded");

    tracing::info!(
        attempt_id = %attempt.id,
        exam_id = %exam.id,
        student_id = %student.id,
        score = outcome.score,
        is_passed = outcome.is_passed,
        correct = outcome.correct_count,
        total = outcome.total_questions,
        "Attempt graded"
    );

    Ok(SubmissionResult {
        score: outcome.score,
        is_passed: outcome.is_passed,
        correct_count: outcome.correct_count,
        total_questions: outcome.total_questions,
    })
}

pub(crate) async fn history(
    state: &AppState,
    student: &User,
) -> Result<Vec<AttemptHistoryRow>, AttemptError> {
    Ok(repositories::attempts::history_for_user(state.db(), &student.id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_exam, insert_question, insert_user, setup_test_context};

    fn answer(question_id: &str, selected: &str) -> SubmittedAnswer {
        SubmittedAnswer { question_id: question_id.to_string(), selected_option: selected.to_string() }
    }

    #[tokio::test]
    async fn submit_grades_once_and_stores_answers() {
        let ctx = setup_test_context().await;
        let instructor = insert_user(ctx.state.db(), "instructor@example.com", UserRole::Instructor).await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;
        let exam = insert_exam(ctx.state.db(), &instructor.id, 60).await;
        let q1 = insert_question(ctx.state.db(), &exam.id, "A", &["B", "C", "D"]).await;
        let q2 = insert_question(ctx.state.db(), &exam.id, "A", &["B", "C", "D"]).await;

        let attempt = start(&ctx.state, &student, &exam.id).await.expect("start");
        assert_eq!(attempt.state(), AttemptState::Open);

        let result = submit(&ctx.state, &student, &attempt.id, &[answer(&q1.id, "A"), answer(&q2.id, "C")])
            .await
            .expect("submit");
        // Fixture passing score is 50, so hitting it exactly passes.
        assert_eq!(result.score, 50.0);
        assert!(result.is_passed);
        assert_eq!((result.correct_count, result.total_questions), (1, 2));

        let again = submit(&ctx.state, &student, &attempt.id, &[answer(&q2.id, "A")]).await;
        assert!(matches!(again, Err(AttemptError::AlreadySubmitted)));

        let view = fetch(&ctx.state, &instructor, &attempt.id).await.expect("instructor can view");
        assert_eq!(view.answers.len(), 2);
        assert!(matches!(view.attempt.state(), AttemptState::Graded { score, .. } if score == 50.0));
    }

    #[tokio::test]
    async fn concurrent_submissions_grade_exactly_once() {
        let ctx = setup_test_context().await;
        let instructor = insert_user(ctx.state.db(), "instructor@example.com", UserRole::Instructor).await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;
        let exam = insert_exam(ctx.state.db(), &instructor.id, 60).await;
        let question = insert_question(ctx.state.db(), &exam.id, "A", &["B", "C", "D"]).await;
        let attempt = start(&ctx.state, &student, &exam.id).await.expect("start");

        let right = [answer(&question.id, "A")];
        let wrong = [answer(&question.id, "B")];
        let (first, second) = tokio::join!(
            submit(&ctx.state, &student, &attempt.id, &right),
            submit(&ctx.state, &student, &attempt.id, &wrong),
        );

        let results = [first, second];
        let graded: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok()).collect();
        assert_eq!(graded.len(), 1);
        assert_eq!(
            results.iter().filter(|result| matches!(result, Err(AttemptError::AlreadySubmitted))).count(),
            1
        );

        let stored = repositories::attempts::find_by_id(ctx.state.db(), &attempt.id)
            .await
            .expect("query")
            .expect("attempt");
        assert_eq!(stored.score, Some(graded[0].score));
        let answers = repositories::answers::list_by_attempt(ctx.state.db(), &attempt.id).await.expect("answers");
        assert_eq!(answers.len(), 1);
    }

    #[tokio::test]
    async fn other_students_cannot_see_or_submit() {
        let ctx = setup_test_context().await;
        let instructor = insert_user(ctx.state.db(), "instructor@example.com", UserRole::Instructor).await;
        let owner = insert_user(ctx.state.db(), "owner@example.com", UserRole::Student).await;
        let stranger = insert_user(ctx.state.db(), "stranger@example.com", UserRole::Student).await;
        let exam = insert_exam(ctx.state.db(), &instructor.id, 60).await;
        let attempt = start(&ctx.state, &owner, &exam.id).await.expect("start");

        assert!(matches!(fetch(&ctx.state, &stranger, &attempt.id).await, Err(AttemptError::NotFound)));
        assert!(matches!(
            submit(&ctx.state, &stranger, &attempt.id, &[]).await,
            Err(AttemptError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn late_submission_is_rejected() {
        let ctx = setup_test_context().await;
        let instructor = insert_user(ctx.state.db(), "instructor@example.com", UserRole::Instructor).await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;
        let exam = insert_exam(ctx.state.db(), &instructor.id, 5).await;
        let attempt = start(&ctx.state, &student, &exam.id).await.expect("start");

        sqlx::query("UPDATE exam_attempts SET started_at = started_at - INTERVAL '2 hours' WHERE id = $1")
            .bind(&attempt.id)
            .execute(ctx.state.db())
            .await
            .expect("backdate attempt");

        let result = submit(&ctx.state, &student, &attempt.id, &[]).await;
        assert!(matches!(result, Err(AttemptError::DeadlinePassed { .. })));

        let stored = repositories::attempts::find_by_id(ctx.state.db(), &attempt.id)
            .await
            .expect("query")
            .expect("attempt");
        assert_eq!(stored.state(), AttemptState::Open);
    }

    #[tokio::test]
    async fn starting_unknown_exam_fails() {
        let ctx = setup_test_context().await;
        let student = insert_user(ctx.state.db(), "student@example.com", UserRole::Student).await;

        assert!(matches!(start(&ctx.state, &student, "missing").await, Err(AttemptError::ExamNotFound)));
    }
}
