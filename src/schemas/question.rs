use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, QuestionOption};
use crate::db::types::{DifficultyLevel, QuestionType};
use crate::services::question_contract::QuestionDraft;

/// Manually authored question. Content rules live in the question contract.
#[derive(Debug, Deserialize)]
pub(crate) struct QuestionCreate {
    pub(crate) text: String,
    #[serde(default, rename = "type", alias = "question_type")]
    pub(crate) question_type: QuestionType,
    #[serde(default)]
    pub(crate) difficulty: DifficultyLevel,
    #[serde(default)]
    pub(crate) explanation: Option<String>,
    #[serde(default)]
    pub(crate) options: Vec<QuestionOption>,
}

impl From<QuestionCreate> for QuestionDraft {
    fn from(payload: QuestionCreate) -> Self {
        Self {
            text: payload.text,
            question_type: payload.question_type,
            difficulty: payload.difficulty,
            explanation: payload.explanation,
            options: payload.options,
        }
    }
}

fn default_count() -> usize {
    5
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GenerateRequest {
    #[validate(length(min = 1, message = "topic must not be empty"))]
    pub(crate) topic: String,
    #[serde(default)]
    pub(crate) syllabus: Option<String>,
    #[serde(default = "default_count")]
    #[validate(range(min = 1, max = 20, message = "count must be between 1 and 20"))]
    pub(crate) count: usize,
    #[serde(default)]
    pub(crate) difficulty: DifficultyLevel,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateResponse {
    pub(crate) success: bool,
    pub(crate) count: usize,
    pub(crate) dropped: usize,
    pub(crate) model: String,
}

/// Full question including the answer key; only shown to the exam's instructor.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) text: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) explanation: Option<String>,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) created_at: String,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            exam_id: question.exam_id,
            text: question.text,
            question_type: question.question_type,
            difficulty: question.difficulty,
            explanation: question.explanation,
            options: question.options.0,
            created_at: format_primitive(question.created_at),
        }
    }
}
