use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::Question;
use crate::services::question_contract::QuestionDraft;

const COLUMNS: &str = "\
    id, exam_id, text, question_type, difficulty, explanation, options, created_at";

pub(crate) async fn list_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY created_at ASC, id ASC"
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    exam_id: &str,
    draft: &QuestionDraft,
    now: PrimitiveDateTime,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, exam_id, text, question_type, difficulty, explanation, options, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(exam_id)
    .bind(&draft.text)
    .bind(draft.question_type)
    .bind(draft.difficulty)
    .bind(draft.explanation.as_deref())
    .bind(Json(&draft.options))
    .bind(now)
    .fetch_one(executor)
    .await
}
