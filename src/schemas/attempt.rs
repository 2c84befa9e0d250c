use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{AttemptState, ExamAttempt};
use crate::db::types::{DifficultyLevel, QuestionType};
use crate::repositories::attempts::AttemptHistoryRow;
use crate::services::attempt_lifecycle::AttemptView;
use crate::services::attempt_timing::remaining_seconds;
use crate::services::grading::SubmittedAnswer;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AttemptStart {
    #[serde(alias = "examId")]
    #[validate(length(min = 1, message = "exam_id must not be empty"))]
    pub(crate) exam_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptSubmit {
    #[serde(default)]
    pub(crate) answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum AttemptStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) user_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) completed_at: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) is_passed: Option<bool>,
}

impl From<&ExamAttempt> for AttemptResponse {
    fn from(attempt: &ExamAttempt) -> Self {
        let (status, completed_at, score, is_passed) = match attempt.state() {
            AttemptState::Open => (AttemptStatus::InProgress, None, None, None),
            AttemptState::Graded { completed_at, score, is_passed } => (
                AttemptStatus::Completed,
                Some(format_primitive(completed_at)),
                Some(score),
                Some(is_passed),
            ),
        };

        Self {
            id: attempt.id.clone(),
            exam_id: attempt.exam_id.clone(),
            user_id: attempt.user_id.clone(),
            status,
            started_at: format_primitive(attempt.started_at),
            completed_at,
            score,
            is_passed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptExamSummary {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) passing_score: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptOption {
    pub(crate) text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptQuestion {
    pub(crate) id: String,
    pub(crate) text: String,
    #[serde(rename = "type")]
    pub(crate) question_type: QuestionType,
    pub(crate) difficulty: DifficultyLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) explanation: Option<String>,
    pub(crate) options: Vec<AttemptOption>,
    pub(crate) selected_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

/// Attempt payload for continuation or review. While the attempt is open the
/// answer key, explanations and per-answer correctness are withheld.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptDetailResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) exam: AttemptExamSummary,
    pub(crate) remaining_seconds: Option<i64>,
    pub(crate) questions: Vec<AttemptQuestion>,
}

impl From<AttemptView> for AttemptDetailResponse {
    fn from(view: AttemptView) -> Self {
        let open = matches!(view.attempt.state(), AttemptState::Open);
        let remaining = open.then(|| {
            remaining_seconds(view.attempt.started_at, view.exam.duration_minutes, primitive_now_utc())
        });

        let mut answers: HashMap<String, (String, bool)> = view
            .answers
            .into_iter()
            .map(|answer| (answer.question_id, (answer.selected_option, answer.is_correct)))
            .collect();

        let questions = view
            .questions
            .into_iter()
            .map(|question| {
                let answer = answers.remove(&question.id);
                AttemptQuestion {
                    id: question.id,
                    text: question.text,
                    question_type: question.question_type,
                    difficulty: question.difficulty,
                    explanation: if open { None } else { question.explanation },
                    options: question
                        .options
                        .0
                        .into_iter()
                        .map(|option| AttemptOption {
                            text: option.text,
                            is_correct: (!open).then_some(option.is_correct),
                        })
                        .collect(),
                    is_correct: if open { None } else { Some(answer.as_ref().is_some_and(|(_, ok)| *ok)) },
                    selected_option: answer.map(|(selected, _)| selected),
                }
            })
            .collect();

        Self {
            attempt: AttemptResponse::from(&view.attempt),
            exam: AttemptExamSummary {
                id: view.exam.id,
                title: view.exam.title,
                duration_minutes: view.exam.duration_minutes,
                passing_score: view.exam.passing_score,
            },
            remaining_seconds: remaining,
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptHistoryEntry {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) passing_score: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) completed_at: Option<String>,
    pub(crate) score: Option<f64>,
    pub(crate) is_passed: Option<bool>,
}

impl From<AttemptHistoryRow> for AttemptHistoryEntry {
    fn from(row: AttemptHistoryRow) -> Self {
        Self {
            status: if row.completed_at.is_some() {
                AttemptStatus::Completed
            } else {
                AttemptStatus::InProgress
            },
            id: row.id,
            exam_id: row.exam_id,
            exam_title: row.exam_title,
            passing_score: row.passing_score,
            started_at: format_primitive(row.started_at),
            completed_at: row.completed_at.map(format_primitive),
            score: row.score,
            is_passed: row.is_passed,
        }
    }
}
