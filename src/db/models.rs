use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{DifficultyLevel, QuestionType, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: UserRole,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Topic {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) created_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
    pub(crate) is_published: bool,
    pub(crate) instructor_id: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Embedded option; stored inside the question's JSONB `options` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionOption {
    pub(crate) text: String,
    #[serde(default, alias = "is_correct")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) explanation: Option<String>,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) created_at: PrimitiveDateTime,
}

impl Question {
    /// The accepted answer key. Authoring rejects multiple correct flags, so for
    /// well-formed rows this is the only flagged option.
    pub(crate) fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.0.iter().find(|option| option.is_correct)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamAttempt {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) exam_id: String,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) score: Option<f64>,
    pub(crate) is_passed: Option<bool>,
}

/// Lifecycle state of an attempt. `Graded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AttemptState {
    Open,
    Graded { completed_at: PrimitiveDateTime, score: f64, is_passed: bool },
}

impl ExamAttempt {
    pub(crate) fn state(&self) -> AttemptState {
        match self.completed_at {
            None => AttemptState::Open,
            Some(completed_at) => AttemptState::Graded {
                completed_at,
                score: self.score.unwrap_or(0.0),
                is_passed: self.is_passed.unwrap_or(false),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_option: String,
    pub(crate) is_correct: bool,
}
