use serde::Serialize;

use crate::core::time::format_primitive;
use crate::repositories::attempts::{GradedOutcomeRow, StudentAttemptRow};
use crate::repositories::exams::ExamActivityRow;
use crate::services::weak_topics::{
    AttemptOutcome, ClassStats, ExamActivity, ExamHistory, StudentSummary, TopicFailRate,
    TopicFailureCount,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentWeakTopicsResponse {
    #[serde(flatten)]
    pub(crate) summary: StudentSummary,
    pub(crate) weak_topics: Vec<TopicFailureCount>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentResultEntry {
    pub(crate) attempt_id: String,
    pub(crate) exam_id: String,
    pub(crate) exam_title: String,
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
    pub(crate) completed_at: String,
    pub(crate) topics: Vec<String>,
}

impl From<&AttemptOutcome> for StudentResultEntry {
    fn from(outcome: &AttemptOutcome) -> Self {
        Self {
            attempt_id: outcome.attempt_id.clone(),
            exam_id: outcome.exam_id.clone(),
            exam_title: outcome.exam_title.clone(),
            score: outcome.score.round(),
            is_passed: outcome.is_passed,
            completed_at: format_primitive(outcome.completed_at),
            topics: outcome.topics.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentResultsResponse {
    pub(crate) fail_rates: Vec<TopicFailRate>,
    pub(crate) results: Vec<StudentResultEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamStatsResponse {
    pub(crate) exam_id: String,
    #[serde(flatten)]
    pub(crate) stats: ClassStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamAttemptEntry {
    pub(crate) attempt_id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) student_email: String,
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
    pub(crate) completed_at: String,
}

impl From<StudentAttemptRow> for ExamAttemptEntry {
    fn from(row: StudentAttemptRow) -> Self {
        Self {
            attempt_id: row.id,
            student_id: row.user_id,
            student_name: row.student_name,
            student_email: row.student_email,
            score: row.score,
            is_passed: row.is_passed,
            completed_at: format_primitive(row.completed_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamAttemptsResponse {
    pub(crate) exam_id: String,
    pub(crate) topics: Vec<String>,
    pub(crate) attempts: Vec<ExamAttemptEntry>,
}

impl From<GradedOutcomeRow> for AttemptOutcome {
    fn from(row: GradedOutcomeRow) -> Self {
        Self {
            attempt_id: row.id,
            exam_id: row.exam_id,
            exam_title: row.exam_title,
            score: row.score,
            is_passed: row.is_passed,
            completed_at: row.completed_at,
            topics: row.topics,
        }
    }
}

impl From<ExamActivityRow> for ExamActivity {
    fn from(row: ExamActivityRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            graded_attempts: usize::try_from(row.graded_attempts).unwrap_or_default(),
            score_sum: row.score_sum,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamHistoryEntry {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) created_at: String,
    pub(crate) total_students: usize,
    pub(crate) average_score: f64,
}

impl From<ExamHistory> for ExamHistoryEntry {
    fn from(history: ExamHistory) -> Self {
        Self {
            id: history.id,
            title: history.title,
            created_at: format_primitive(history.created_at),
            total_students: history.graded_attempts,
            average_score: history.average_score,
        }
    }
}
