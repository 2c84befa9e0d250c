use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::models::Answer;
use crate::services::grading::GradedAnswer;

const COLUMNS: &str = "id, attempt_id, question_id, selected_option, is_correct";

pub(crate) async fn insert_graded(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    answers: &[GradedAnswer],
) -> Result<(), sqlx::Error> {
    if answers.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO answers (id, attempt_id, question_id, selected_option, is_correct) ",
    );
    builder.push_values(answers, |mut row, answer| {
        row.push_bind(Uuid::new_v4().to_string())
            .push_bind(attempt_id)
            .push_bind(&answer.question_id)
            .push_bind(&answer.selected_option)
            .push_bind(answer.is_correct);
    });

    builder.build().execute(executor).await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(pool: &PgPool, attempt_id: &str) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!("SELECT {COLUMNS} FROM answers WHERE attempt_id = $1"))
        .bind(attempt_id)
        .fetch_all(pool)
        .await
}
