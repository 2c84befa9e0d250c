use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Exam;

pub(crate) const COLUMNS: &str = "\
    id, title, description, duration_minutes, passing_score, is_published, \
    instructor_id, created_at, updated_at";

pub(crate) struct CreateExam<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) is_published: bool,
    pub(crate) instructor_id: &'a str,
    pub(crate) now: PrimitiveDateTime,
}

/// Which exams a caller may browse.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ExamScope<'a> {
    OwnedBy(&'a str),
    Published,
    All,
}

/// Exam listing row with its topic names and question count.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExamListRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) is_published: bool,
    pub(crate) instructor_id: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) topics: Vec<String>,
    pub(crate) question_count: i64,
}

/// Per-exam totals over graded attempts, for the instructor overview.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExamActivityRow {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) graded_attempts: i64,
    pub(crate) score_sum: f64,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list(pool: &PgPool, scope: ExamScope<'_>) -> Result<Vec<ExamListRow>, sqlx::Error> {
    let (instructor_id, published_only) = match scope {
        ExamScope::OwnedBy(instructor_id) => (Some(instructor_id), false),
        ExamScope::Published => (None, true),
        ExamScope::All => (None, false),
    };

    sqlx::query_as::<_, ExamListRow>(
        "SELECT e.id, e.title, e.description, e.duration_minutes, e.passing_score, \
                e.is_published, e.instructor_id, e.created_at, \
                COALESCE( \
                    (SELECT ARRAY_AGG(t.name ORDER BY t.name) \
                     FROM exam_topics et JOIN topics t ON t.id = et.topic_id \
                     WHERE et.exam_id = e.id), \
                    ARRAY[]::text[] \
                ) AS topics, \
                (SELECT COUNT(*) FROM questions q WHERE q.exam_id = e.id) AS question_count \
         FROM exams e \
         WHERE ($1::text IS NULL OR e.instructor_id = $1) \
           AND (NOT $2 OR e.is_published) \
         ORDER BY e.created_at DESC, e.id",
    )
    .bind(instructor_id)
    .bind(published_only)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    exam: CreateExam<'_>,
) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, description, duration_minutes, passing_score, is_published,
            instructor_id, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING {COLUMNS}"
    ))
    .bind(exam.id)
    .bind(exam.title)
    .bind(exam.description)
    .bind(exam.duration_minutes)
    .bind(exam.passing_score)
    .bind(exam.is_published)
    .bind(exam.instructor_id)
    .bind(exam.now)
    .bind(exam.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn link_topics(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
    topic_ids: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO exam_topics (exam_id, topic_id) \
         SELECT $1, topic_id FROM UNNEST($2::text[]) AS topic_id \
         ON CONFLICT DO NOTHING",
    )
    .bind(exam_id)
    .bind(topic_ids)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exams WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub(crate) async fn activity_for_instructor(
    pool: &PgPool,
    instructor_id: &str,
) -> Result<Vec<ExamActivityRow>, sqlx::Error> {
    sqlx::query_as::<_, ExamActivityRow>(
        "SELECT e.id, e.title, e.created_at, \
                COUNT(a.id) AS graded_attempts, \
                COALESCE(SUM(a.score), 0)::float8 AS score_sum \
         FROM exams e \
         LEFT JOIN exam_attempts a ON a.exam_id = e.id AND a.completed_at IS NOT NULL \
         WHERE e.instructor_id = $1 \
         GROUP BY e.id, e.title, e.created_at \
         ORDER BY e.created_at DESC",
    )
    .bind(instructor_id)
    .fetch_all(pool)
    .await
}
