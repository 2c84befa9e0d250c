use sqlx::PgPool;

use crate::db::models::Topic;

const COLUMNS: &str = "id, name, created_at";

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!("SELECT {COLUMNS} FROM topics ORDER BY name ASC"))
        .fetch_all(pool)
        .await
}

/// Inserts a topic; returns `None` when the name is already taken.
pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    name: &str,
    now: time::PrimitiveDateTime,
) -> Result<Option<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(&format!(
        "INSERT INTO topics (id, name, created_at) VALUES ($1, $2, $3) \
         ON CONFLICT (name) DO NOTHING RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn count_existing(
    executor: impl sqlx::PgExecutor<'_>,
    ids: &[String],
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM topics WHERE id = ANY($1)")
        .bind(ids)
        .fetch_one(executor)
        .await
}

pub(crate) async fn list_for_exam(pool: &PgPool, exam_id: &str) -> Result<Vec<Topic>, sqlx::Error> {
    sqlx::query_as::<_, Topic>(
        "SELECT t.id, t.name, t.created_at FROM topics t \
         JOIN exam_topics et ON et.topic_id = t.id \
         WHERE et.exam_id = $1 ORDER BY t.name ASC",
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}
