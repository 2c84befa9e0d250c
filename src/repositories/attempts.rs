use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamAttempt;

pub(crate) const COLUMNS: &str = "id, user_id, exam_id, started_at, completed_at, score, is_passed";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AttemptHistoryRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) passing_score: i32,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) score: Option<f64>,
    pub(crate) is_passed: Option<bool>,
}

/// A graded attempt with the topic names of its exam.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GradedOutcomeRow {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
    pub(crate) completed_at: PrimitiveDateTime,
    pub(crate) topics: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StudentAttemptRow {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
    pub(crate) completed_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!("SELECT {COLUMNS} FROM exam_attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Locks the attempt row until the surrounding transaction ends.
pub(crate) async fn find_for_update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamAttempt>, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    exam_id: &str,
    started_at: PrimitiveDateTime,
) -> Result<ExamAttempt, sqlx::Error> {
    sqlx::query_as::<_, ExamAttempt>(&format!(
        "INSERT INTO exam_attempts (id, user_id, exam_id, started_at) VALUES ($1,$2,$3,$4) \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(exam_id)
    .bind(started_at)
    .fetch_one(pool)
    .await
}

/// Stores the grade. Returns `false` when the attempt was already graded.
pub(crate) async fn complete(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    score: f64,
    is_passed: bool,
    completed_at: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts SET score = $1, is_passed = $2, completed_at = $3 \
         WHERE id = $4 AND completed_at IS NULL",
    )
    .bind(score)
    .bind(is_passed)
    .bind(completed_at)
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn history_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<AttemptHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptHistoryRow>(
        "SELECT a.id, a.exam_id, e.title AS exam_title, e.passing_score, \
                a.started_at, a.completed_at, a.score, a.is_passed \
         FROM exam_attempts a JOIN exams e ON e.id = a.exam_id \
         WHERE a.user_id = $1 \
         ORDER BY a.started_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Graded attempts of one user, newest first.
pub(crate) async fn graded_outcomes_for_user(
    pool: &PgPool,
    user_id: &str,
    limit: Option<i64>,
) -> Result<Vec<GradedOutcomeRow>, sqlx::Error> {
    sqlx::query_as::<_, GradedOutcomeRow>(
        "SELECT a.id, a.exam_id, e.title AS exam_title, a.score, a.is_passed, a.completed_at, \
                COALESCE(ARRAY_AGG(t.name ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL), \
                         ARRAY[]::text[]) AS topics \
         FROM exam_attempts a \
         JOIN exams e ON e.id = a.exam_id \
         LEFT JOIN exam_topics et ON et.exam_id = e.id \
         LEFT JOIN topics t ON t.id = et.topic_id \
         WHERE a.user_id = $1 AND a.completed_at IS NOT NULL \
         GROUP BY a.id, e.title \
         ORDER BY a.completed_at DESC \
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub(crate) async fn graded_scores_for_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<(f64, bool)>, sqlx::Error> {
    sqlx::query_as::<_, (f64, bool)>(
        "SELECT score, is_passed FROM exam_attempts \
         WHERE exam_id = $1 AND completed_at IS NOT NULL",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

/// Graded attempts on an exam, lowest score first.
pub(crate) async fn graded_for_exam(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<StudentAttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentAttemptRow>(
        "SELECT a.id, a.user_id, u.name AS student_name, u.email AS student_email, \
                a.score, a.is_passed, a.completed_at \
         FROM exam_attempts a JOIN users u ON u.id = a.user_id \
         WHERE a.exam_id = $1 AND a.completed_at IS NOT NULL \
         ORDER BY a.score ASC, a.completed_at ASC",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn top_for_exam(
    pool: &PgPool,
    exam_id: &str,
    limit: i64,
) -> Result<Vec<StudentAttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentAttemptRow>(
        "SELECT a.id, a.user_id, u.name AS student_name, u.email AS student_email, \
                a.score, a.is_passed, a.completed_at \
         FROM exam_attempts a JOIN users u ON u.id = a.user_id \
         WHERE a.exam_id = $1 AND a.completed_at IS NOT NULL \
         ORDER BY a.score DESC, a.completed_at ASC \
         LIMIT $2",
    )
    .bind(exam_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
